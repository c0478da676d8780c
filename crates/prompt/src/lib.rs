//! Prompt system for prosearch.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Built-in research prompts compiled into the binary
//! - Workspace overrides in `.prosearch/prompts/<id>.yml`
//! - Strict Handlebars rendering (a missing variable is an error)

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{ANSWER, QUERY_WRITER, REFLECTION, RELEVANCE};
pub use loader::{list_prompts, load_prompt, PromptLibrary};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
