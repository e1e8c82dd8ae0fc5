//! Gate controller
//!
//! Drives one gate evaluation through an explicit state machine:
//! `Idle -> Starting -> Polling -> Evaluating -> {Passed, Failed}`.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::evaluator::evaluate;
use super::poller::{guarded, CompletionPoller};
use crate::config::{ThresholdConfig, ThresholdSettings};
use crate::error::{GateError, EXIT_FAILED, EXIT_PASSED};
use crate::loadtest::RunBackend;
use crate::models::{GateReport, RunStatus, TestRun, Verdict};
use crate::utils::Timer;

/// Gate state; `Passed` and `Failed` are terminal
#[derive(Debug)]
pub enum GateState {
    Idle,
    Starting {
        config: ThresholdConfig,
    },
    Polling {
        config: ThresholdConfig,
        run_id: String,
    },
    Evaluating {
        config: ThresholdConfig,
        run: TestRun,
    },
    Passed(GateReport),
    Failed(GateFailure),
}

impl GateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GateState::Passed(_) | GateState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::Starting { .. } => "starting",
            GateState::Polling { .. } => "polling",
            GateState::Evaluating { .. } => "evaluating",
            GateState::Passed(_) => "passed",
            GateState::Failed(_) => "failed",
        }
    }
}

/// Why a gate ended in `Failed`
#[derive(Debug)]
pub enum GateFailure {
    /// The run finished but did not meet the thresholds, or the backend
    /// reported it as failed
    Verdict(GateReport),
    /// The gate could not produce a verdict
    Error(GateError),
}

/// Final result of a gate, mapped onto the process exit code
#[derive(Debug)]
pub enum GateOutcome {
    Passed(GateReport),
    Failed(GateReport),
    Errored(GateError),
}

impl GateOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            GateOutcome::Passed(_) => EXIT_PASSED,
            GateOutcome::Failed(_) => EXIT_FAILED,
            GateOutcome::Errored(e) => e.exit_code(),
        }
    }

    pub fn report(&self) -> Option<&GateReport> {
        match self {
            GateOutcome::Passed(r) | GateOutcome::Failed(r) => Some(r),
            GateOutcome::Errored(_) => None,
        }
    }

    #[cfg(test)]
    pub fn is_passed(&self) -> bool {
        matches!(self, GateOutcome::Passed(_))
    }
}

impl From<GateState> for GateOutcome {
    fn from(state: GateState) -> Self {
        match state {
            GateState::Passed(report) => GateOutcome::Passed(report),
            GateState::Failed(GateFailure::Verdict(report)) => GateOutcome::Failed(report),
            GateState::Failed(GateFailure::Error(e)) => GateOutcome::Errored(e),
            other => GateOutcome::Errored(GateError::config(format!(
                "gate stopped in non-terminal state {}",
                other.name()
            ))),
        }
    }
}

/// Runs a gate against a backend
pub struct GateController<B: RunBackend> {
    settings: ThresholdSettings,
    backend: B,
    poller: CompletionPoller,
    preflight: bool,
}

impl<B: RunBackend> GateController<B> {
    pub fn new(settings: ThresholdSettings, backend: B, poller: CompletionPoller) -> Self {
        Self {
            settings,
            backend,
            poller,
            preflight: false,
        }
    }

    /// Probe the target endpoint before starting the run
    pub fn preflight(mut self, enabled: bool) -> Self {
        self.preflight = enabled;
        self
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Drive the state machine from `Idle` to a terminal state
    pub async fn run(&self, cancel: &CancellationToken) -> GateOutcome {
        let timer = Timer::start("gate");
        let mut state = GateState::Idle;

        while !state.is_terminal() {
            let from = state.name();
            state = self.step(state, &timer, cancel).await;
            info!("Gate: {} -> {}", from, state.name());
        }

        timer.lap("finished");
        state.into()
    }

    /// Perform a single transition
    ///
    /// Terminal states are returned unchanged.
    pub async fn step(
        &self,
        state: GateState,
        timer: &Timer,
        cancel: &CancellationToken,
    ) -> GateState {
        match state {
            GateState::Idle => match self.settings.validate() {
                Ok(config) => GateState::Starting { config },
                Err(e) => fail(e),
            },

            GateState::Starting { config } => {
                if self.preflight {
                    info!("Probing target {}", config.target_url());
                    let probe = self.backend.probe_target(config.target_url());
                    if let Err(e) = guarded(probe, None, cancel).await {
                        return fail(e);
                    }
                }

                info!("Starting load test against {}", config.target_url());
                let start = self.backend.start_run(config.target_url());
                match guarded(start, None, cancel).await {
                    Ok(run_id) => {
                        info!("Started run {}", run_id);
                        GateState::Polling { config, run_id }
                    }
                    Err(e) => fail(e),
                }
            }

            GateState::Polling { config, run_id } => {
                match self
                    .poller
                    .wait_for_completion(&self.backend, &run_id, cancel)
                    .await
                {
                    Ok(run) if run.status == RunStatus::Failed => {
                        warn!("Run {} was reported as failed", run.id);
                        let report = GateReport::new(
                            &run,
                            config.target_url().as_str(),
                            Verdict::run_failed(),
                            timer.elapsed_secs(),
                        );
                        GateState::Failed(GateFailure::Verdict(report))
                    }
                    Ok(run) => GateState::Evaluating { config, run },
                    Err(e) => fail(e),
                }
            }

            GateState::Evaluating { config, run } => {
                let verdict = evaluate(&run, &config);
                let report = GateReport::new(
                    &run,
                    config.target_url().as_str(),
                    verdict,
                    timer.elapsed_secs(),
                );

                if report.passed() {
                    GateState::Passed(report)
                } else {
                    GateState::Failed(GateFailure::Verdict(report))
                }
            }

            terminal => terminal,
        }
    }
}

fn fail(e: GateError) -> GateState {
    error!("Gate error ({}): {}", e.kind(), e);
    if let GateError::MalformedResponse { payload, .. } = &e {
        error!("Response payload: {}", payload);
    }
    GateState::Failed(GateFailure::Error(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testing::{ScriptedBackend, RUN_ID};
    use crate::models::{RunMetrics, RUN_FAILED_REASON};
    use std::time::Duration;

    const TARGET: &str = "https://abc123.execute-api.us-east-1.amazonaws.com/v1/app";

    fn controller(settings: ThresholdSettings, backend: ScriptedBackend) -> GateController<ScriptedBackend> {
        GateController::new(
            settings,
            backend,
            CompletionPoller::new(Duration::from_secs(10)).deadline(Some(Duration::from_secs(600))),
        )
    }

    fn completed(avg: f64, fail: u64) -> ScriptedBackend {
        ScriptedBackend::new()
            .status(TestRun::pending(RUN_ID))
            .status(TestRun::running(RUN_ID))
            .status(TestRun::complete(RUN_ID, RunMetrics::new(avg, fail)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_under_thresholds() {
        let settings = ThresholdSettings::new(TARGET)
            .avg_response_time(150.0)
            .failure_count(5);
        let gate = controller(settings, completed(120.0, 2));

        let outcome = gate.run(&CancellationToken::new()).await;
        assert!(outcome.is_passed());
        assert_eq!(outcome.exit_code(), EXIT_PASSED);

        let report = outcome.report().unwrap();
        assert_eq!(report.run_id, RUN_ID);
        assert_eq!(report.target_url, TARGET);
        assert!(report.verdict.reasons.iter().all(|r| r.ends_with("passed")));
        assert_eq!(gate.backend().start_calls(), 1);
        assert_eq!(gate.backend().fetch_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_over_response_time_threshold() {
        let settings = ThresholdSettings::new(TARGET)
            .avg_response_time(100.0)
            .failure_count(5);
        let gate = controller(settings, completed(120.0, 2));

        let outcome = gate.run(&CancellationToken::new()).await;
        assert_eq!(outcome.exit_code(), EXIT_FAILED);

        let report = outcome.report().unwrap();
        let failing: Vec<_> = report
            .verdict
            .reasons
            .iter()
            .filter(|r| r.ends_with("failed"))
            .collect();
        assert_eq!(failing.len(), 1);
        assert!(failing[0].contains("response time"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_target_never_touches_backend() {
        let settings = ThresholdSettings::default().failure_count(5);
        let gate = controller(settings, completed(1.0, 0));

        let outcome = gate.run(&CancellationToken::new()).await;
        assert!(matches!(outcome, GateOutcome::Errored(GateError::ConfigInvalid(_))));
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(gate.backend().total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_skips_evaluation() {
        let backend = ScriptedBackend::new()
            .status(TestRun::running(RUN_ID))
            .status(TestRun::failed(RUN_ID));
        let gate = controller(ThresholdSettings::new(TARGET).allow_unchecked(), backend);

        let outcome = gate.run(&CancellationToken::new()).await;
        assert_eq!(outcome.exit_code(), EXIT_FAILED);

        let report = outcome.report().unwrap();
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.verdict.reasons, vec![RUN_FAILED_REASON.to_string()]);
        assert!(report.verdict.checks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_error_stops_the_gate() {
        let backend = ScriptedBackend::new()
            .start_error(GateError::BackendUnavailable("HTTP 403".into()));
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), backend);

        let outcome = gate.run(&CancellationToken::new()).await;
        assert!(matches!(outcome, GateOutcome::Errored(GateError::BackendUnavailable(_))));
        assert_eq!(outcome.exit_code(), 3);
        assert_eq!(gate.backend().fetch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_on_first_fetch() {
        let backend = ScriptedBackend::new()
            .status_error(GateError::BackendUnavailable("connection refused".into()));
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), backend);

        let outcome = gate.run(&CancellationToken::new()).await;
        assert!(matches!(outcome, GateOutcome::Errored(GateError::BackendUnavailable(_))));
        assert_eq!(gate.backend().fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_maps_to_timeout() {
        let gate = GateController::new(
            ThresholdSettings::new(TARGET).failure_count(5),
            ScriptedBackend::new(),
            CompletionPoller::new(Duration::from_secs(10)).deadline(Some(Duration::from_secs(35))),
        );

        let outcome = gate.run(&CancellationToken::new()).await;
        assert!(matches!(outcome, GateOutcome::Errored(GateError::Timeout(_))));
        assert_eq!(outcome.exit_code(), 5);
        assert_eq!(gate.backend().fetch_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), completed(1.0, 0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = gate.run(&cancel).await;
        assert!(matches!(outcome, GateOutcome::Errored(GateError::Cancelled)));
        assert_eq!(outcome.exit_code(), 6);
        assert_eq!(gate.backend().total_calls(), 0);
    }

    fn cancel_after(delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
        cancel
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_start() {
        let backend = completed(1.0, 0).start_delay(Duration::from_secs(90));
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), backend);
        let cancel = cancel_after(Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        let outcome = gate.run(&cancel).await;

        assert!(matches!(outcome, GateOutcome::Errored(GateError::Cancelled)));
        assert_eq!(outcome.exit_code(), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(gate.backend().start_calls(), 1);
        assert_eq!(gate.backend().fetch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_preflight() {
        let backend = completed(1.0, 0).probe_delay(Duration::from_secs(90));
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), backend).preflight(true);
        let cancel = cancel_after(Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        let outcome = gate.run(&cancel).await;

        assert_eq!(outcome.exit_code(), 6);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(gate.backend().probe_calls(), 1);
        assert_eq!(gate.backend().start_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preflight_failure() {
        let backend = completed(1.0, 0)
            .probe_error(GateError::TargetUnreachable("connection refused".into()));
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), backend).preflight(true);

        let outcome = gate.run(&CancellationToken::new()).await;
        assert_eq!(outcome.exit_code(), 7);
        assert_eq!(gate.backend().probe_calls(), 1);
        assert_eq!(gate.backend().start_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preflight_skipped_by_default() {
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), completed(1.0, 0));

        let outcome = gate.run(&CancellationToken::new()).await;
        assert!(outcome.is_passed());
        assert_eq!(gate.backend().probe_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_transitions() {
        let gate = controller(ThresholdSettings::new(TARGET).failure_count(5), completed(1.0, 0));
        let cancel = CancellationToken::new();
        let timer = Timer::start("test");

        let state = gate.step(GateState::Idle, &timer, &cancel).await;
        assert!(matches!(state, GateState::Starting { .. }));

        let state = gate.step(state, &timer, &cancel).await;
        assert!(matches!(&state, GateState::Polling { run_id, .. } if run_id == RUN_ID));

        let state = gate.step(state, &timer, &cancel).await;
        assert!(matches!(&state, GateState::Evaluating { run, .. } if run.status == RunStatus::Complete));

        let state = gate.step(state, &timer, &cancel).await;
        assert!(matches!(state, GateState::Passed(_)));

        let state = gate.step(state, &timer, &cancel).await;
        assert!(state.is_terminal());
    }
}
