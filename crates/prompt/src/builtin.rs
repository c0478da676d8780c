//! Prompts compiled into the binary.

use crate::types::PromptDefinition;
use prosearch_core::{AppError, AppResult};

/// Query generation prompt id.
pub const QUERY_WRITER: &str = "research.query_writer";
/// Reflection prompt id.
pub const REFLECTION: &str = "research.reflection";
/// Answer synthesis prompt id.
pub const ANSWER: &str = "research.answer";
/// Model-based relevance scoring prompt id.
pub const RELEVANCE: &str = "research.relevance";

const SOURCES: &[(&str, &str)] = &[
    (
        QUERY_WRITER,
        include_str!("../prompts/research.query_writer.yml"),
    ),
    (REFLECTION, include_str!("../prompts/research.reflection.yml")),
    (ANSWER, include_str!("../prompts/research.answer.yml")),
    (RELEVANCE, include_str!("../prompts/research.relevance.yml")),
];

/// Ids of every built-in prompt.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    SOURCES.iter().map(|(id, _)| *id)
}

/// Parse the built-in definition for `id`, if there is one.
pub fn builtin_prompt(id: &str) -> Option<AppResult<PromptDefinition>> {
    SOURCES.iter().find(|(key, _)| *key == id).map(|(_, yaml)| {
        serde_yaml::from_str(yaml)
            .map_err(|e| AppError::Prompt(format!("Built-in prompt {} is invalid: {}", id, e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_parse() {
        for id in builtin_ids() {
            let def = builtin_prompt(id).unwrap().unwrap();
            assert_eq!(def.id, id);
            assert!(def.template.contains("{{"));
        }
    }

    #[test]
    fn test_output_formats() {
        assert!(builtin_prompt(QUERY_WRITER).unwrap().unwrap().expects_json());
        assert!(builtin_prompt(REFLECTION).unwrap().unwrap().expects_json());
        assert!(builtin_prompt(RELEVANCE).unwrap().unwrap().expects_json());
        assert!(!builtin_prompt(ANSWER).unwrap().unwrap().expects_json());
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_prompt("agent.ask.default").is_none());
    }
}
