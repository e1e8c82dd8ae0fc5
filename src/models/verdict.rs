//! Gate verdict models
//!
//! A verdict is the pass/fail decision plus one reason per threshold check.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason recorded when the backend reports the run as failed
pub const RUN_FAILED_REASON: &str = "run failed to complete";

/// Reason recorded when a completed run carries no metrics
pub const MISSING_METRICS_REASON: &str = "run completed without metrics";

/// Metric covered by a threshold check, in evaluation order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AvgResponseTime,
    FailureCount,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::AvgResponseTime => "average response time",
            Metric::FailureCount => "failure count",
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Metric::AvgResponseTime => " ms",
            Metric::FailureCount => "",
        }
    }
}

/// Outcome of a single threshold check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed,
    NotChecked,
}

impl CheckOutcome {
    /// Unconfigured checks never fail the gate
    pub fn is_ok(&self) -> bool {
        !matches!(self, CheckOutcome::Failed)
    }
}

/// One metric compared against its (optional) threshold
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub metric: Metric,
    pub observed: f64,
    pub threshold: Option<f64>,
    pub outcome: CheckOutcome,
}

impl ThresholdCheck {
    /// Strict less-than-is-pass comparison; an absent threshold is not checked
    pub fn compare(metric: Metric, observed: f64, threshold: Option<f64>) -> Self {
        let outcome = match threshold {
            None => CheckOutcome::NotChecked,
            Some(limit) if observed < limit => CheckOutcome::Passed,
            Some(_) => CheckOutcome::Failed,
        };

        Self {
            metric,
            observed,
            threshold,
            outcome,
        }
    }

    /// Human-readable reason line
    pub fn reason(&self) -> String {
        let unit = self.metric.unit();
        let label = self.metric.label();
        match (self.outcome, self.threshold) {
            (CheckOutcome::Passed, Some(limit)) => format!(
                "{label} {}{unit} is below threshold {limit}{unit}: passed",
                self.observed
            ),
            (CheckOutcome::Failed, Some(limit)) => format!(
                "{label} {}{unit} is not below threshold {limit}{unit}: failed",
                self.observed
            ),
            _ => format!(
                "{label} {}{unit}: not checked (no threshold configured)",
                self.observed
            ),
        }
    }
}

/// Result of evaluating a run against the configured thresholds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub reasons: Vec<String>,
    pub checks: Vec<ThresholdCheck>,
}

impl Verdict {
    /// Build a verdict from checks already in evaluation order
    pub fn from_checks(checks: Vec<ThresholdCheck>) -> Self {
        let passed = checks.iter().all(|c| c.outcome.is_ok());
        let reasons = checks.iter().map(ThresholdCheck::reason).collect();
        Self {
            passed,
            reasons,
            checks,
        }
    }

    pub fn run_failed() -> Self {
        Self::failure(RUN_FAILED_REASON)
    }

    pub fn missing_metrics() -> Self {
        Self::failure(MISSING_METRICS_REASON)
    }

    /// Failing verdict with a single reason and no threshold checks
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reasons: vec![reason.into()],
            checks: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn failed_checks(&self) -> impl Iterator<Item = &ThresholdCheck> {
        self.checks
            .iter()
            .filter(|c| c.outcome == CheckOutcome::Failed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Verdict: {}", if self.passed { "PASS" } else { "FAIL" })?;
        for reason in &self.reasons {
            writeln!(f, "  - {reason}")?;
        }
        Ok(())
    }
}
