//! Source tracking for knowledge bases.
//!
//! Each learned file is appended as one JSON line to `sources.jsonl`.

use crate::types::KnowledgeSource;
use chrono::{DateTime, Utc};
use prosearch_core::{AppError, AppResult};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only log of the sources learned into one base.
pub struct SourceTracker {
    sources_path: PathBuf,
}

impl SourceTracker {
    pub fn new(workspace: &Path, base_name: &str) -> Self {
        Self {
            sources_path: crate::config::get_sources_path(workspace, base_name),
        }
    }

    /// Append a source record.
    pub fn track(&self, source: &KnowledgeSource) -> AppResult<()> {
        if let Some(parent) = self.sources_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.sources_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open sources.jsonl: {}", e)))?;

        let line = serde_json::to_string(source)?;
        writeln!(file, "{}", line).map_err(|e| {
            AppError::Knowledge(format!("Failed to write to sources.jsonl: {}", e))
        })?;

        tracing::debug!("Tracked source: {}", source.path);
        Ok(())
    }

    /// All tracked sources in the order they were learned.
    pub fn list(&self) -> AppResult<Vec<KnowledgeSource>> {
        if !self.sources_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.sources_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open sources.jsonl: {}", e)))?;

        let mut sources = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let source: KnowledgeSource = serde_json::from_str(&line).map_err(|e| {
                AppError::Knowledge(format!(
                    "Failed to parse line {} in sources.jsonl: {}",
                    line_num + 1,
                    e
                ))
            })?;
            sources.push(source);
        }

        Ok(sources)
    }

    /// Timestamp of the most recent learn, if any.
    pub fn last_indexed_at(&self) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.list()?.iter().map(|s| s.indexed_at).max())
    }

    /// Forget every tracked source.
    pub fn clear(&self) -> AppResult<()> {
        if self.sources_path.exists() {
            std::fs::remove_file(&self.sources_path).map_err(|e| {
                AppError::Knowledge(format!("Failed to delete sources.jsonl: {}", e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn source(path: &str, indexed_at: DateTime<Utc>) -> KnowledgeSource {
        KnowledgeSource {
            source_id: format!("id-{}", path),
            path: path.to_string(),
            source_type: "file".to_string(),
            indexed_at,
            chunk_count: 3,
            byte_count: 2048,
        }
    }

    #[test]
    fn test_track_appends_in_order() {
        let temp = TempDir::new().unwrap();
        let tracker = SourceTracker::new(temp.path(), "docs");

        tracker.track(&source("a.md", Utc::now())).unwrap();
        tracker.track(&source("b.md", Utc::now())).unwrap();

        let sources = tracker.list().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].path, "a.md");
        assert_eq!(sources[1].path, "b.md");
    }

    #[test]
    fn test_last_indexed_at() {
        let temp = TempDir::new().unwrap();
        let tracker = SourceTracker::new(temp.path(), "docs");
        assert!(tracker.last_indexed_at().unwrap().is_none());

        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        tracker.track(&source("b.md", late)).unwrap();
        tracker.track(&source("a.md", early)).unwrap();

        assert_eq!(tracker.last_indexed_at().unwrap(), Some(late));
    }

    #[test]
    fn test_clear_removes_file() {
        let temp = TempDir::new().unwrap();
        let tracker = SourceTracker::new(temp.path(), "docs");
        tracker.track(&source("a.md", Utc::now())).unwrap();

        tracker.clear().unwrap();
        assert!(tracker.list().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_line_reports_position() {
        let temp = TempDir::new().unwrap();
        let tracker = SourceTracker::new(temp.path(), "docs");
        tracker.track(&source("a.md", Utc::now())).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(&tracker.sources_path)
            .unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = tracker.list().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
