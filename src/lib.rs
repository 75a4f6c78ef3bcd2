pub mod app;
pub mod completion;
pub mod config;
pub mod delivery;
pub mod error;
pub mod history;
pub mod knowledge;
pub mod pipeline;
pub mod prompting;
pub mod state;
pub mod store;
pub mod types;
pub mod webhook;
