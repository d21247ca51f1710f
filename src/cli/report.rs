//! Persisted run reports
//!
//! The library returns results in memory; only the CLI writes them out.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ResponseMode, RunResult, TraceEntry};

/// One run, as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub mode: ResponseMode,
    /// SHA-256 of the layer registry source that produced the run
    pub registry_fingerprint: String,
    pub input: String,
    pub output: String,
    pub trace: Vec<TraceEntry>,
}

impl RunReport {
    pub fn new(
        model: &str,
        mode: ResponseMode,
        registry_fingerprint: &str,
        input: &str,
        result: RunResult,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            model: model.to_string(),
            mode,
            registry_fingerprint: registry_fingerprint.to_string(),
            input: input.to_string(),
            output: result.output,
            trace: result.trace,
        }
    }

    /// Write pretty JSON, creating parent directories as needed
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing report {}", path.display()))?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading report {}", path.display()))?;
        let report = serde_json::from_str(&content)
            .with_context(|| format!("parsing report {}", path.display()))?;
        Ok(report)
    }
}
