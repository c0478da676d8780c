//! Research topic derived from the conversation.

use crate::state::{Message, Role};

/// Text the LLM steps research.
///
/// A lone user message is used as-is; longer conversations are flattened
/// into a `User:` / `Assistant:` transcript so follow-up questions keep
/// their context.
pub fn research_topic(conversation: &[Message]) -> String {
    if let [only] = conversation {
        return only.content.trim().to_string();
    }

    conversation
        .iter()
        .map(|message| {
            let speaker = match message.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", speaker, message.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
