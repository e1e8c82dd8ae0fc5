//! Scripted backend for poller and controller tests

use async_trait::async_trait;
use reqwest::Url;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::GateError;
use crate::loadtest::RunBackend;
use crate::models::TestRun;

pub const RUN_ID: &str = "run-42";

/// Replays scripted status results in order; once the script is exhausted
/// every fetch reports the run as still running.
#[derive(Default)]
pub struct ScriptedBackend {
    start: Mutex<Option<Result<String, GateError>>>,
    statuses: Mutex<VecDeque<Result<TestRun, GateError>>>,
    probe: Mutex<Option<GateError>>,
    start_delay: Duration,
    probe_delay: Duration,
    start_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_error(self, error: GateError) -> Self {
        *self.start.lock().unwrap() = Some(Err(error));
        self
    }

    pub fn status(self, run: TestRun) -> Self {
        self.statuses.lock().unwrap().push_back(Ok(run));
        self
    }

    pub fn status_error(self, error: GateError) -> Self {
        self.statuses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Make `start_run` take this long before answering
    pub fn start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Make `probe_target` take this long before answering
    pub fn probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn probe_error(self, error: GateError) -> Self {
        *self.probe.lock().unwrap() = Some(error);
        self
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.start_calls() + self.fetch_calls() + self.probe_calls()
    }
}

#[async_trait]
impl RunBackend for ScriptedBackend {
    async fn start_run(&self, _target_url: &Url) -> Result<String, GateError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.start_delay).await;
        self.start
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(RUN_ID.to_string()))
    }

    async fn fetch_status(&self, run_id: &str) -> Result<TestRun, GateError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TestRun::running(run_id)))
    }

    async fn probe_target(&self, _target_url: &Url) -> Result<(), GateError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.probe_delay).await;
        match self.probe.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
