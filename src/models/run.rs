//! Remote load-test run models
//!
//! Defines run status, aggregate metrics and the polled run snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-reported run status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl RunStatus {
    /// Parse a status string as reported by the backend
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "queued" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "complete" => Some(RunStatus::Complete),
            "failed" | "cancelled" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    /// No further transition happens from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Complete => write!(f, "complete"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate metrics of a completed run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub avg_response_time_ms: f64,
    pub failure_count: u64,
}

impl RunMetrics {
    pub fn new(avg_response_time_ms: f64, failure_count: u64) -> Self {
        Self {
            avg_response_time_ms,
            failure_count,
        }
    }
}

/// Snapshot of a remote run as observed by one status fetch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub status: RunStatus,
    pub metrics: Option<RunMetrics>,
}

impl TestRun {
    #[cfg(test)]
    pub fn pending(id: impl Into<String>) -> Self {
        Self::without_metrics(id, RunStatus::Pending)
    }

    #[cfg(test)]
    pub fn running(id: impl Into<String>) -> Self {
        Self::without_metrics(id, RunStatus::Running)
    }

    /// A run that carries no metrics: still in progress, or failed
    pub fn without_metrics(id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            id: id.into(),
            status,
            metrics: None,
        }
    }

    pub fn complete(id: impl Into<String>, metrics: RunMetrics) -> Self {
        Self {
            id: id.into(),
            status: RunStatus::Complete,
            metrics: Some(metrics),
        }
    }

    #[cfg(test)]
    pub fn failed(id: impl Into<String>) -> Self {
        Self::without_metrics(id, RunStatus::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl fmt::Display for TestRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} [{}]", self.id, self.status)?;
        if let Some(m) = &self.metrics {
            write!(
                f,
                " avg_rt={} fail={}",
                m.avg_response_time_ms, m.failure_count
            )?;
        }
        Ok(())
    }
}
