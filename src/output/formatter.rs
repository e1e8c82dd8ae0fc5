//! Gate outcome formatters
//!
//! Renders the final report (or the error that prevented one) as text or JSON.

use serde::Serialize;

use crate::error::GateError;
use crate::gate::GateOutcome;
use crate::models::{CheckOutcome, GateReport, ThresholdCheck};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    JsonPretty,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            _ => None,
        }
    }
}

/// Machine-readable view of an outcome
#[derive(Serialize)]
struct OutcomeJson<'a> {
    result: &'static str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a GateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson<'a>>,
}

#[derive(Serialize)]
struct ErrorJson<'a> {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a str>,
}

/// Gate outcome formatter
pub struct ReportFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ReportFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a gate outcome
    pub fn format_outcome(&self, outcome: &GateOutcome) -> String {
        match self.format {
            OutputFormat::Text => match outcome {
                GateOutcome::Passed(report) | GateOutcome::Failed(report) => {
                    self.format_report_text(report)
                }
                GateOutcome::Errored(e) => self.format_error_text(e),
            },
            OutputFormat::Json => {
                serde_json::to_string(&self.outcome_json(outcome)).unwrap_or_default()
            }
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(&self.outcome_json(outcome)).unwrap_or_default()
            }
        }
    }

    fn outcome_json<'a>(&self, outcome: &'a GateOutcome) -> OutcomeJson<'a> {
        let (result, error) = match outcome {
            GateOutcome::Passed(_) => ("passed", None),
            GateOutcome::Failed(_) => ("failed", None),
            GateOutcome::Errored(e) => (
                "error",
                Some(ErrorJson {
                    kind: e.kind(),
                    message: e.to_string(),
                    payload: match e {
                        GateError::MalformedResponse { payload, .. } => Some(payload.as_str()),
                        _ => None,
                    },
                }),
            ),
        };

        OutcomeJson {
            result,
            exit_code: outcome.exit_code(),
            report: outcome.report(),
            error,
        }
    }

    fn format_report_text(&self, report: &GateReport) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(" Load Test Gate: {}\n", self.verdict_label(report.passed())));
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(" Target:   {}\n", report.target_url));
        output.push_str(&format!(" Run:      {} ({})\n", report.run_id, report.status));

        if let Some(m) = &report.metrics {
            output.push_str(&format!(
                " Metrics:  avg_rt={} fail={}\n",
                m.avg_response_time_ms, m.failure_count
            ));
        }
        output.push_str(&format!(" Elapsed:  {:.1}s\n", report.elapsed_secs));
        output.push_str(" ───────────────────────────────────────────────────────────\n");

        if report.verdict.checks.is_empty() {
            for reason in &report.verdict.reasons {
                output.push_str(&format!(" {} {}\n", self.symbol(CheckOutcome::Failed), reason));
            }
        } else {
            for check in &report.verdict.checks {
                output.push_str(&self.format_check(check));
            }
        }

        output.push_str(" ───────────────────────────────────────────────────────────\n");
        output
    }

    fn format_check(&self, check: &ThresholdCheck) -> String {
        format!(" {} {}\n", self.symbol(check.outcome), check.reason())
    }

    fn format_error_text(&self, error: &GateError) -> String {
        let label = if self.colorize {
            "\x1b[31m! ERROR\x1b[0m"
        } else {
            "! ERROR"
        };

        let mut output = format!("{} [{}] {}\n", label, error.kind(), error);
        if let GateError::MalformedResponse { payload, .. } = error {
            output.push_str(&format!("  payload: {}\n", payload));
        }
        output.push_str(&format!("  exit code: {}\n", error.exit_code()));
        output
    }

    fn verdict_label(&self, passed: bool) -> &'static str {
        match (passed, self.colorize) {
            (true, true) => "\x1b[32m✓ PASS\x1b[0m",
            (false, true) => "\x1b[31m✗ FAIL\x1b[0m",
            (true, false) => "✓ PASS",
            (false, false) => "✗ FAIL",
        }
    }

    fn symbol(&self, outcome: CheckOutcome) -> &'static str {
        match (outcome, self.colorize) {
            (CheckOutcome::Passed, true) => "\x1b[32m✓\x1b[0m",
            (CheckOutcome::Failed, true) => "\x1b[31m✗\x1b[0m",
            (CheckOutcome::NotChecked, true) => "\x1b[33m○\x1b[0m",
            (CheckOutcome::Passed, false) => "✓",
            (CheckOutcome::Failed, false) => "✗",
            (CheckOutcome::NotChecked, false) => "○",
        }
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Text)
    }
}
