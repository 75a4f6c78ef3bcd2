use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every way a webhook invocation can terminate early.
///
/// Variants carry the text returned to the caller; upstream rejections keep the raw
/// upstream body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    ConfigurationMissing(&'static str),

    #[error("Invalid payload")]
    InvalidPayload,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    CompletionRejected(String),

    #[error("{0}")]
    DeliveryRejected(String),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidPayload | AppError::NotFound(_) => StatusCode::BAD_REQUEST,
            AppError::DeliveryRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationMissing(_)
            | AppError::CompletionRejected(_)
            | AppError::Storage(_)
            | AppError::Migrate(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_failures_split_by_collaborator() {
        assert_eq!(
            AppError::CompletionRejected("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::DeliveryRejected("boom".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn caller_errors_are_bad_request() {
        assert_eq!(AppError::InvalidPayload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::NotFound("Contact not found").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_body_is_passed_through_verbatim() {
        let err = AppError::DeliveryRejected(r#"{"error":{"code":131030}}"#.into());
        assert_eq!(err.to_string(), r#"{"error":{"code":131030}}"#);
    }
}
