//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use prosearch_core::{AppError, AppResult};
use serde_json::{Map, Value};

/// Build a prompt from a definition and template variables.
///
/// `variables` must be a JSON object. `current_date` is injected when the
/// caller does not supply it. Rendering is strict: a template that names a
/// variable absent from `variables` fails with `AppError::Prompt`.
///
/// # Example
/// ```no_run
/// use prosearch_prompt::{build_prompt, PromptDefinition};
/// use serde_json::json;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let built = build_prompt(&def, json!({"research_topic": "What is Rust?"}))?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, variables: Value) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut variables = match variables {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(AppError::Prompt(format!(
                "Prompt variables for {} must be an object, got {}",
                definition.id, other
            )))
        }
    };

    variables
        .entry("current_date")
        .or_insert_with(|| Value::String(current_date()));

    let context = Value::Object(variables);
    let user = render_template(&definition.template, &context)?;
    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &context))
        .transpose()?;

    let resolved_variables = match context {
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            json_output: definition.expects_json(),
            resolved_variables,
        },
    })
}

/// Human-readable date, e.g. "October 08, 2026".
fn current_date() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Prompts are plain text
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
