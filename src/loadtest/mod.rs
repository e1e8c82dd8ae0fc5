//! Load-test backend access
//!
//! The `RunBackend` trait is the seam between the gate and the backend; the
//! scenarios API client implements it, tests substitute scripted fakes.

mod client;
mod template;
mod wire;

pub use client::LoadTestClient;
pub use wire::parse_saved_run;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::GateError;
use crate::models::TestRun;

/// Operations the gate needs from a load-test backend
#[async_trait]
pub trait RunBackend: Send + Sync {
    /// Start a run against `target_url` and return its identifier
    async fn start_run(&self, target_url: &Url) -> Result<String, GateError>;

    /// Fetch the current state of a run
    async fn fetch_status(&self, run_id: &str) -> Result<TestRun, GateError>;

    /// Check that the target endpoint answers at all
    async fn probe_target(&self, _target_url: &Url) -> Result<(), GateError> {
        Ok(())
    }
}
