use minijinja::{context, Environment};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.j2");

pub struct SystemPromptContext<'a> {
    pub base_prompt: &'a str,
    pub knowledge: &'a str,
}

/// Tenant prompt plus the knowledge block; an empty knowledge string adds no section.
pub fn render_system_prompt(ctx: &SystemPromptContext<'_>) -> String {
    let mut env = Environment::new();
    if env
        .add_template("system_prompt", SYSTEM_PROMPT_TEMPLATE)
        .is_err()
    {
        return fallback_system_prompt(ctx);
    }

    let Ok(template) = env.get_template("system_prompt") else {
        return fallback_system_prompt(ctx);
    };

    template
        .render(context! {
            base_prompt => ctx.base_prompt,
            knowledge => ctx.knowledge,
        })
        .unwrap_or_else(|_| fallback_system_prompt(ctx))
}

fn fallback_system_prompt(ctx: &SystemPromptContext<'_>) -> String {
    if ctx.knowledge.is_empty() {
        return ctx.base_prompt.to_string();
    }
    format!("{}\n\nKnowledge base:\n{}", ctx.base_prompt, ctx.knowledge)
}
