//! Conversation history across research turns.
//!
//! Each conversation is an append-only JSONL file under
//! `.prosearch/conversations/<id>.jsonl` with one record per message.
//! Assistant records also carry the citations and evidence behind them.

use crate::controller::ResearchOutcome;
use crate::state::{EvidenceItem, Message, Role};
use crate::synthesis::Citation;
use chrono::{DateTime, Utc};
use prosearch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceItem>,
}

impl ConversationRecord {
    pub fn message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Supplies prior turns to the agent and stores finished ones.
pub trait ConversationStore: Send + Sync {
    /// Messages of a conversation in order; empty when it does not exist.
    fn load(&self, id: &str) -> AppResult<Vec<Message>>;

    /// Persist a user question and the answer produced for it.
    fn append_turn(&self, id: &str, question: &str, outcome: &ResearchOutcome) -> AppResult<()>;
}

/// File-backed [`ConversationStore`].
pub struct JsonlConversationStore {
    root: PathBuf,
}

impl JsonlConversationStore {
    pub fn new(workspace: &Path) -> Self {
        Self {
            root: workspace.join(".prosearch").join("conversations"),
        }
    }

    fn path_for(&self, id: &str) -> AppResult<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::Research(format!(
                "Invalid conversation id '{}': use letters, digits, '-' or '_'",
                id
            )));
        }
        Ok(self.root.join(format!("{}.jsonl", id)))
    }

    /// Full records, including the evidence trail of assistant turns.
    pub fn records(&self, id: &str) -> AppResult<Vec<ConversationRecord>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path).map_err(|e| {
            AppError::Research(format!("Failed to open conversation '{}': {}", id, e))
        })?;

        let mut records = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ConversationRecord = serde_json::from_str(&line).map_err(|e| {
                AppError::Research(format!(
                    "Failed to parse line {} of conversation '{}': {}",
                    line_num + 1,
                    id,
                    e
                ))
            })?;
            records.push(record);
        }

        Ok(records)
    }

    fn append(&self, id: &str, records: &[ConversationRecord]) -> AppResult<()> {
        let path = self.path_for(id)?;
        std::fs::create_dir_all(&self.root)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                AppError::Research(format!("Failed to open conversation '{}': {}", id, e))
            })?;

        for record in records {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{}", line).map_err(|e| {
                AppError::Research(format!("Failed to write conversation '{}': {}", id, e))
            })?;
        }
        Ok(())
    }
}

impl ConversationStore for JsonlConversationStore {
    fn load(&self, id: &str) -> AppResult<Vec<Message>> {
        Ok(self.records(id)?.iter().map(ConversationRecord::message).collect())
    }

    fn append_turn(&self, id: &str, question: &str, outcome: &ResearchOutcome) -> AppResult<()> {
        let now = Utc::now();
        let records = [
            ConversationRecord {
                role: Role::User,
                content: question.to_string(),
                timestamp: now,
                citations: Vec::new(),
                evidence: Vec::new(),
            },
            ConversationRecord {
                role: Role::Assistant,
                content: outcome.answer.clone(),
                timestamp: now,
                citations: outcome.citations.clone(),
                evidence: outcome.evidence.clone(),
            },
        ];

        self.append(id, &records)?;
        tracing::debug!(conversation = id, "Stored research turn");
        Ok(())
    }
}
