//! Load-test gate
//!
//! Polling, threshold evaluation and the state machine tying them together.

mod controller;
mod evaluator;
mod poller;

#[cfg(test)]
mod testing;

pub use controller::{GateController, GateFailure, GateOutcome, GateState};
pub use evaluator::evaluate;
pub use poller::CompletionPoller;
