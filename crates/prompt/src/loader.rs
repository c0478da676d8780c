//! Prompt loader for YAML prompt definitions.
//!
//! Lookup order for an id: `.prosearch/prompts/<id>.yml` in the workspace,
//! then the built-in set.

use crate::builder::build_prompt;
use crate::builtin::{builtin_ids, builtin_prompt};
use crate::types::{BuiltPrompt, PromptDefinition};
use prosearch_core::{AppError, AppResult};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Load a prompt definition by ID.
///
/// # Example
/// ```no_run
/// use prosearch_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "research.query_writer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".prosearch/prompts")
        .join(format!("{}.yml", prompt_id));

    let definition = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to parse prompt YAML {:?}: {}",
                prompt_file, e
            ))
        })?
    } else {
        builtin_prompt(prompt_id).ok_or_else(|| {
            AppError::Prompt(format!("Prompt not found: {}", prompt_id))
        })??
    };

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file for {} declares id {}",
            prompt_id, definition.id
        )));
    }

    Ok(definition)
}

/// List all available prompt IDs: built-ins plus workspace overrides.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: BTreeSet<String> = builtin_ids().map(str::to_string).collect();
    let prompts_dir = workspace_path.join(".prosearch/prompts");

    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.insert(stem.to_string());
                }
            }
        }
    }

    Ok(prompt_ids.into_iter().collect())
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

/// The research prompts resolved once for a session.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    definitions: HashMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Built-in prompts only.
    pub fn builtin() -> AppResult<Self> {
        let mut definitions = HashMap::new();
        for id in builtin_ids() {
            if let Some(def) = builtin_prompt(id) {
                definitions.insert(id.to_string(), def?);
            }
        }
        Ok(Self { definitions })
    }

    /// Built-in prompts with any workspace overrides applied.
    pub fn for_workspace(workspace_path: &Path) -> AppResult<Self> {
        let mut definitions = HashMap::new();
        for id in builtin_ids() {
            definitions.insert(id.to_string(), load_prompt(workspace_path, id)?);
        }
        Ok(Self { definitions })
    }

    /// Look up a definition.
    pub fn get(&self, id: &str) -> AppResult<&PromptDefinition> {
        self.definitions
            .get(id)
            .ok_or_else(|| AppError::Prompt(format!("Prompt not found: {}", id)))
    }

    /// Render the prompt `id` with `variables`.
    pub fn render(&self, id: &str, variables: serde_json::Value) -> AppResult<BuiltPrompt> {
        build_prompt(self.get(id)?, variables)
    }
}
