//! Threshold evaluation
//!
//! Pure function from a finished run and the configured limits to a verdict.

use tracing::debug;

use crate::config::ThresholdConfig;
use crate::models::{Metric, RunStatus, TestRun, ThresholdCheck, Verdict};

/// Evaluate a run against the configured thresholds
///
/// Checks run in a fixed order (average response time, then failure count)
/// and each produces one reason line. A metric with no threshold is reported
/// as not checked and never affects the outcome.
pub fn evaluate(run: &TestRun, thresholds: &ThresholdConfig) -> Verdict {
    match (run.status, run.metrics) {
        (RunStatus::Failed, _) => Verdict::run_failed(),
        (RunStatus::Complete, Some(metrics)) => {
            let checks = vec![
                ThresholdCheck::compare(
                    Metric::AvgResponseTime,
                    metrics.avg_response_time_ms,
                    thresholds.avg_response_time_ms(),
                ),
                ThresholdCheck::compare(
                    Metric::FailureCount,
                    metrics.failure_count as f64,
                    thresholds.failure_count().map(|c| c as f64),
                ),
            ];

            for check in &checks {
                debug!("{}", check.reason());
            }
            Verdict::from_checks(checks)
        }
        (RunStatus::Complete, None) => Verdict::missing_metrics(),
        (status, _) => Verdict::failure(format!("run has not completed (status {status})")),
    }
}
