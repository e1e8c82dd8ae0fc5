//! Gate report
//!
//! Everything the pipeline needs to know about one finished gate evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{RunMetrics, RunStatus, TestRun, Verdict};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub run_id: String,
    pub target_url: String,
    pub status: RunStatus,
    pub metrics: Option<RunMetrics>,
    pub verdict: Verdict,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
}

impl GateReport {
    pub fn new(
        run: &TestRun,
        target_url: impl Into<String>,
        verdict: Verdict,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            run_id: run.id.clone(),
            target_url: target_url.into(),
            status: run.status,
            metrics: run.metrics,
            verdict,
            elapsed_secs,
            finished_at: Utc::now(),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict.passed
    }

    /// Write the report as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        use anyhow::Context;

        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }
}
