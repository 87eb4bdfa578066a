//! The results file written after a successful submission.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use proctor_core::model::SubmitResult;

/// When and under which session the results were produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub timestamp: String,
    pub session_id: String,
    /// Local calendar date of the export.
    pub interview_date: String,
    /// Local wall-clock time of the export.
    pub interview_time: String,
}

/// The server's submit response plus [`SessionInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsExport {
    #[serde(flatten)]
    pub result: SubmitResult,
    pub session_info: SessionInfo,
}

impl ResultsExport {
    /// Wrap `result` with session info stamped at `at`.
    pub fn build(result: SubmitResult, session_id: &str, at: DateTime<Utc>) -> Self {
        let local = at.with_timezone(&Local);
        Self {
            result,
            session_info: SessionInfo {
                timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
                session_id: session_id.to_string(),
                interview_date: local.format("%Y-%m-%d").to_string(),
                interview_time: local.format("%H:%M:%S").to_string(),
            },
        }
    }

    /// `interview_results_<name>_<YYYY-MM-DD>.json`.
    ///
    /// The name comes from the server response when present, otherwise
    /// `fallback_name`. The date is the UTC date of the timestamp.
    pub fn file_name(&self, fallback_name: &str) -> String {
        let name = self
            .result
            .candidate_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(fallback_name);
        let date = self
            .session_info
            .timestamp
            .split('T')
            .next()
            .unwrap_or_default();
        format!("interview_results_{}_{}.json", sanitize_name(name), date)
    }

    /// Write to `dir` under [`file_name`](Self::file_name). Returns the path.
    pub fn save(&self, dir: &Path, fallback_name: &str) -> Result<PathBuf> {
        let path = dir.join(self.file_name(fallback_name));
        self.save_json(&path)?;
        Ok(path)
    }

    /// Save to an explicit path, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize results")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        Ok(())
    }

    /// Load a previously exported results file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read results from {}", path.display()))?;
        let export: ResultsExport =
            serde_json::from_str(&content).context("failed to parse results JSON")?;
        Ok(export)
    }
}

/// Collapse whitespace runs to `_` and drop path separators.
fn sanitize_name(name: &str) -> String {
    let joined = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "_");
    if joined.is_empty() {
        "candidate".to_string()
    } else {
        joined
    }
}
