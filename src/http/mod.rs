//! HTTP client module
//!
//! Signed, timeout-bounded HTTP access to the load-test backend.

mod client;
mod sigv4;

pub use client::{HttpClient, HttpError, HttpRequest, HttpResponse};
pub use sigv4::{default_credentials, RequestSigner};
