//! Completion poller
//!
//! Turns an asynchronous remote run into one awaited result: fetch status,
//! suspend for the poll interval, repeat until the run is terminal, the
//! deadline passes or the caller cancels.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::GateError;
use crate::loadtest::RunBackend;
use crate::models::{RunStatus, TestRun};

/// Polls a run until it reaches a terminal state
#[derive(Clone, Debug)]
pub struct CompletionPoller {
    interval: Duration,
    deadline: Option<Duration>,
}

impl CompletionPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Give up with `Timeout` once this much time has passed; `None` waits
    /// until cancelled.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Wait for `run_id` to complete or fail
    ///
    /// A run the backend reports as failed is returned as `Ok`; fetch errors
    /// are returned on first occurrence.
    pub async fn wait_for_completion(
        &self,
        backend: &dyn RunBackend,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TestRun, GateError> {
        // A deadline past the clock's range can never fire.
        let limit = self
            .deadline
            .and_then(|d| Instant::now().checked_add(d).map(|at| (d, at)));
        let mut last_status: Option<RunStatus> = None;
        let mut polls = 0u32;

        info!(
            "Waiting for run {} (poll interval {}s, deadline {})",
            run_id,
            self.interval.as_secs(),
            self.deadline
                .map(|d| format!("{}s", d.as_secs()))
                .unwrap_or_else(|| "none".to_string())
        );

        loop {
            polls += 1;
            let run = guarded(backend.fetch_status(run_id), limit, cancel).await?;

            match last_status {
                Some(prev) if prev == run.status => {
                    debug!("Run {} still {} (poll {})", run_id, run.status, polls)
                }
                Some(prev) => info!("Run {} status: {} -> {}", run_id, prev, run.status),
                None => info!("Run {} status: {}", run_id, run.status),
            }
            last_status = Some(run.status);

            if run.is_terminal() {
                info!("Run {} finished as {} after {} polls", run_id, run.status, polls);
                return Ok(run);
            }

            debug!("Sleeping for {}ms", self.interval.as_millis());
            guarded(
                async {
                    sleep(self.interval).await;
                    Ok(())
                },
                limit,
                cancel,
            )
            .await?;
        }
    }
}

/// Race `op` against cancellation and the optional deadline
///
/// Cancellation wins ties, then the deadline, so nothing new starts once
/// either has fired.
pub(super) async fn guarded<T>(
    op: impl Future<Output = Result<T, GateError>>,
    limit: Option<(Duration, Instant)>,
    cancel: &CancellationToken,
) -> Result<T, GateError> {
    let expiry = async {
        match limit {
            Some((_, at)) => sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("Wait cancelled");
            Err(GateError::Cancelled)
        }
        _ = expiry => {
            let limit = limit.map(|(d, _)| d).unwrap_or_default();
            warn!("Deadline of {}s reached", limit.as_secs());
            Err(GateError::Timeout(limit))
        }
        result = op => result,
    }
}
