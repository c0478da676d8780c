//! History command handler.

use clap::Args;
use prosearch_core::{config::AppConfig, AppError, AppResult};
use prosearch_research::{ConversationRecord, JsonlConversationStore, Role};

/// Show a stored conversation
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Conversation id used with `ask --conversation`
    pub id: String,

    /// Output as JSON (includes the evidence trail)
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing history command for conversation '{}'", self.id);

        let records = JsonlConversationStore::new(&config.workspace).records(&self.id)?;
        if records.is_empty() {
            return Err(AppError::Research(format!(
                "Conversation '{}' not found",
                self.id
            )));
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            print!("{}", render(&records));
        }

        Ok(())
    }
}

fn render(records: &[ConversationRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let speaker = match record.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        out.push_str(&format!(
            "[{}] {}:\n{}\n",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            speaker,
            record.content
        ));
        for citation in &record.citations {
            out.push_str(&format!(
                "  {} {} ({})\n",
                citation.citation_ref, citation.source_label, citation.source_id
            ));
        }
        out.push('\n');
    }
    out
}
