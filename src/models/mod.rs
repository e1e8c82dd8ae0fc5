//! Data models for the load-test gate
//!
//! Run snapshots, metrics, verdicts and the final gate report.

mod report;
mod run;
mod verdict;

pub use report::GateReport;
pub use run::{RunMetrics, RunStatus, TestRun};
pub use verdict::{
    CheckOutcome, Metric, ThresholdCheck, Verdict, MISSING_METRICS_REASON, RUN_FAILED_REASON,
};
