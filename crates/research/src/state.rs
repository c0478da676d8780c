//! Research state threaded through one session.
//!
//! A single [`ResearchState`] is owned by the controller and mutated only
//! between suspension points. The evidence pool is append-only and holds at
//! most one item per source identity.

use crate::config::ResearchConfig;
use prosearch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Web,
    Document,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Document => "document",
        }
    }
}

/// A retrieved snippet or chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source_type: SourceType,

    /// URL for web results, chunk id for documents
    pub id: String,

    pub text: String,

    /// Similarity (documents) or rank-derived score (web)
    pub raw_score: f32,

    /// Set by the reranker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,

    /// Human-readable label: page title or filename
    pub source_label: String,

    /// `[k]` marker, assigned when the item enters the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_ref: Option<String>,
}

impl EvidenceItem {
    /// Source identity used for de-duplication.
    pub fn identity(&self) -> (SourceType, &str) {
        (self.source_type, self.id.as_str())
    }
}

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Generating,
    Retrieving,
    Reflecting,
    Finalizing,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Retrieving => "retrieving",
            Self::Reflecting => "reflecting",
            Self::Finalizing => "finalizing",
        }
    }

    fn can_move_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Generating, Retrieving)
                | (Retrieving, Reflecting)
                | (Reflecting, Retrieving)
                // Insufficient without usable follow-ups: regenerate from the gap
                | (Reflecting, Generating)
                | (Generating | Retrieving | Reflecting, Finalizing)
        )
    }
}

/// Case-insensitive, trimmed comparison key for queries.
pub fn query_key(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Mutable record of one research session.
#[derive(Debug, Clone)]
pub struct ResearchState {
    pub conversation: Vec<Message>,
    pub active_queries: Vec<String>,
    /// Every query dispatched this session, in order
    pub issued_queries: Vec<String>,
    pub loop_count: u32,
    pub max_loops: u32,
    pub initial_query_count: usize,
    pub evidence_pool: Vec<EvidenceItem>,
    pub knowledge_gap: Option<String>,
    pub is_sufficient: bool,
    pub phase: Phase,
    issued_keys: HashSet<String>,
}

impl ResearchState {
    /// Start a session. The last message must be a non-empty user question.
    pub fn new(conversation: Vec<Message>, config: &ResearchConfig) -> AppResult<Self> {
        match conversation.last() {
            Some(last) if last.role == Role::User && !last.content.trim().is_empty() => {}
            _ => {
                return Err(AppError::Research(
                    "Conversation must end with a non-empty user question".to_string(),
                ))
            }
        }

        Ok(Self {
            conversation,
            active_queries: Vec::new(),
            issued_queries: Vec::new(),
            loop_count: 0,
            max_loops: config.max_loops,
            initial_query_count: config.initial_query_count,
            evidence_pool: Vec::new(),
            knowledge_gap: None,
            is_sufficient: false,
            phase: Phase::Generating,
            issued_keys: HashSet::new(),
        })
    }

    /// The active user question.
    pub fn question(&self) -> &str {
        self.conversation
            .last()
            .map(|m| m.content.trim())
            .unwrap_or_default()
    }

    pub fn transition(&mut self, next: Phase) -> AppResult<()> {
        if !self.phase.can_move_to(next) {
            return Err(AppError::Research(format!(
                "Illegal transition {} -> {}",
                self.phase.as_str(),
                next.as_str()
            )));
        }
        tracing::debug!(from = self.phase.as_str(), to = next.as_str(), "Phase transition");
        self.phase = next;
        Ok(())
    }

    pub fn was_issued(&self, query: &str) -> bool {
        self.issued_keys.contains(&query_key(query))
    }

    /// Replace the active query set and record it in the session history.
    pub fn dispatch(&mut self, queries: Vec<String>) {
        for query in &queries {
            if self.issued_keys.insert(query_key(query)) {
                self.issued_queries.push(query.clone());
            }
        }
        self.active_queries = queries;
    }

    /// Whether an item with this identity is already pooled.
    pub fn contains(&self, source_type: SourceType, id: &str) -> bool {
        self.evidence_pool
            .iter()
            .any(|item| item.identity() == (source_type, id))
    }

    /// Append items not already pooled, numbering them in pool order.
    /// Returns how many were added.
    pub fn admit(&mut self, items: Vec<EvidenceItem>) -> usize {
        let mut added = 0;
        for mut item in items {
            if self.contains(item.source_type, &item.id) {
                continue;
            }
            item.citation_ref = Some(format!("[{}]", self.evidence_pool.len() + 1));
            self.evidence_pool.push(item);
            added += 1;
        }
        added
    }

    /// The next completed iteration would reach the loop budget.
    pub fn budget_exhausted(&self) -> bool {
        self.loop_count + 1 >= self.max_loops
    }

    pub fn complete_iteration(&mut self) {
        self.loop_count = (self.loop_count + 1).min(self.max_loops);
    }

    pub fn record_reflection(&mut self, is_sufficient: bool, knowledge_gap: Option<String>) {
        self.is_sufficient = is_sufficient;
        self.knowledge_gap = if is_sufficient { None } else { knowledge_gap };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web(url: &str) -> EvidenceItem {
        EvidenceItem {
            source_type: SourceType::Web,
            id: url.to_string(),
            text: format!("snippet from {}", url),
            raw_score: 1.0,
            rerank_score: None,
            source_label: url.to_string(),
            citation_ref: None,
        }
    }

    fn state() -> ResearchState {
        ResearchState::new(vec![Message::user("What is new?")], &ResearchConfig::default()).unwrap()
    }

    #[test]
    fn test_requires_user_question() {
        let config = ResearchConfig::default();
        assert!(ResearchState::new(vec![], &config).is_err());
        assert!(ResearchState::new(vec![Message::user("  ")], &config).is_err());
        assert!(ResearchState::new(
            vec![Message::user("q"), Message::assistant("a")],
            &config
        )
        .is_err());
    }

    #[test]
    fn test_admit_deduplicates_and_numbers() {
        let mut state = state();
        assert_eq!(state.admit(vec![web("https://a"), web("https://b"), web("https://a")]), 2);
        assert_eq!(state.admit(vec![web("https://b"), web("https://c")]), 1);

        let refs: Vec<_> = state
            .evidence_pool
            .iter()
            .map(|i| i.citation_ref.clone().unwrap())
            .collect();
        assert_eq!(refs, vec!["[1]", "[2]", "[3]"]);
    }

    #[test]
    fn test_same_id_different_source_type_kept() {
        let mut state = state();
        let mut doc = web("abc");
        doc.source_type = SourceType::Document;
        assert_eq!(state.admit(vec![web("abc"), doc]), 2);
    }

    #[test]
    fn test_dispatch_tracks_history_case_insensitively() {
        let mut state = state();
        state.dispatch(vec!["Solar 2024".to_string()]);
        state.dispatch(vec!["  solar 2024 ".to_string(), "wind".to_string()]);

        assert!(state.was_issued("SOLAR 2024"));
        assert_eq!(state.issued_queries, vec!["Solar 2024", "wind"]);
        assert_eq!(state.active_queries.len(), 2);
    }

    #[test]
    fn test_transitions() {
        let mut state = state();
        assert!(state.transition(Phase::Reflecting).is_err());
        state.transition(Phase::Retrieving).unwrap();
        state.transition(Phase::Reflecting).unwrap();
        state.transition(Phase::Retrieving).unwrap();
        state.transition(Phase::Finalizing).unwrap();
        assert!(state.transition(Phase::Retrieving).is_err());
    }

    #[test]
    fn test_loop_budget() {
        let config = ResearchConfig {
            max_loops: 2,
            ..ResearchConfig::default()
        };
        let mut state = ResearchState::new(vec![Message::user("q")], &config).unwrap();
        assert!(!state.budget_exhausted());
        state.complete_iteration();
        assert!(state.budget_exhausted());
        state.complete_iteration();
        state.complete_iteration();
        assert_eq!(state.loop_count, 2);
    }

    #[test]
    fn test_sufficiency_clears_gap() {
        let mut state = state();
        state.record_reflection(false, Some("missing data".to_string()));
        assert_eq!(state.knowledge_gap.as_deref(), Some("missing data"));
        state.record_reflection(true, Some("ignored".to_string()));
        assert!(state.knowledge_gap.is_none());
    }
}
