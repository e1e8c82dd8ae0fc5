//! Output formatting module
//!
//! Renders gate outcomes for humans and for pipelines.

mod formatter;

pub use formatter::{OutputFormat, ReportFormatter};
