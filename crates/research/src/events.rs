//! Processing events emitted by a research session.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a session stopped researching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Reflection judged the evidence sufficient
    Sufficient,
    /// The loop budget ran out
    BudgetExhausted,
    /// Stopped by the caller
    Cancelled,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sufficient => "sufficient",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Timeline of a research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResearchEvent {
    QueriesGenerated {
        loop_index: u32,
        queries: Vec<String>,
    },
    RetrievalCompleted {
        loop_index: u32,
        new_items: usize,
        failures: usize,
    },
    Reflected {
        loop_index: u32,
        sufficient: bool,
        gap: Option<String>,
    },
    Finalizing {
        termination: Termination,
        evidence: usize,
    },
}

impl ResearchEvent {
    /// One-line rendering for terminal progress output.
    pub fn describe(&self) -> String {
        match self {
            Self::QueriesGenerated { loop_index, queries } => {
                format!("[loop {}] searching: {}", loop_index + 1, queries.join(" | "))
            }
            Self::RetrievalCompleted {
                loop_index,
                new_items,
                failures,
            } => {
                let mut line = format!("[loop {}] {} new evidence items", loop_index + 1, new_items);
                if *failures > 0 {
                    line.push_str(&format!(" ({} retrieval calls failed)", failures));
                }
                line
            }
            Self::Reflected {
                loop_index,
                sufficient: true,
                ..
            } => format!("[loop {}] evidence is sufficient", loop_index + 1),
            Self::Reflected {
                loop_index, gap, ..
            } => format!(
                "[loop {}] still missing: {}",
                loop_index + 1,
                gap.as_deref().unwrap_or("unspecified")
            ),
            Self::Finalizing {
                termination,
                evidence,
            } => format!(
                "writing answer from {} sources ({})",
                evidence,
                termination.as_str()
            ),
        }
    }
}

/// Callback for research events.
pub type EventCallback = Arc<dyn Fn(&ResearchEvent) + Send + Sync>;

/// Delivers events to an optional callback.
#[derive(Clone, Default)]
pub struct EventSink {
    callback: Option<EventCallback>,
}

impl EventSink {
    pub fn new(callback: EventCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn noop() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ResearchEvent) {
        tracing::debug!(?event, "Research event");
        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }
}
