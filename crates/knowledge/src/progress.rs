//! Progress reporting for ingestion.

use std::sync::Arc;
use std::time::Instant;

/// Ingestion phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnPhase {
    Scan,
    Read,
    Embed,
    Index,
}

impl LearnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Read => "read",
            Self::Embed => "embed",
            Self::Index => "index",
        }
    }
}

/// Progress event emitted while learning.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: LearnPhase,

    /// Files processed so far in this phase
    pub current: u64,

    /// Total files, when known
    pub total: Option<u64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    /// Format as a single user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) if total > 0 => format!(
                "{}/{} ({:.0}%)",
                self.current,
                total,
                self.current as f64 / total as f64 * 100.0
            ),
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        format!("[{}] {} - {}", self.phase.as_str(), progress, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(
        &self,
        phase: LearnPhase,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) {
        let Some(callback) = &self.callback else {
            return;
        };

        let event = ProgressEvent {
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
        };

        tracing::debug!(
            phase = event.phase.as_str(),
            current = event.current,
            total = ?event.total,
            message = %event.message,
            "Progress event"
        );

        callback(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_format_with_total() {
        let event = ProgressEvent {
            phase: LearnPhase::Read,
            current: 5,
            total: Some(10),
            message: "notes.md".to_string(),
            elapsed_secs: 0.0,
        };
        assert_eq!(event.format_simple(), "[read] 5/10 (50%) - notes.md");
    }

    #[test]
    fn test_reporter_delivers_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.emit(LearnPhase::Scan, 3, None, "docs/");

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].phase, LearnPhase::Scan);
        assert_eq!(captured[0].current, 3);
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().emit(LearnPhase::Index, 1, Some(1), "done");
    }
}
