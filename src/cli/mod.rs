//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::SettingsOverrides;

/// Deployment pipeline gate backed by a remote load test
#[derive(Parser, Debug)]
#[command(name = "loadtest-gate")]
#[command(version)]
#[command(about = "Run a remote load test and gate deployment on its results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a load test, wait for it and evaluate the thresholds
    Run(RunArgs),

    /// Evaluate a saved backend status document offline
    Evaluate(EvaluateArgs),

    /// Show environment variable reference
    Env,
}

/// Threshold flags shared by `run` and `evaluate`
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ThresholdArgs {
    /// Endpoint under test
    #[arg(long)]
    pub target: Option<String>,

    /// Average response time must stay below this (ms)
    #[arg(long)]
    pub avg_rt_threshold: Option<f64>,

    /// Failed request count must stay below this
    #[arg(long)]
    pub failure_threshold: Option<u64>,

    /// Allow a gate with no thresholds (passes whenever the run completes)
    #[arg(long)]
    pub allow_unchecked: bool,

    /// Config file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format (text, json, json-pretty)
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub thresholds: ThresholdArgs,

    /// Load-test backend base URL
    #[arg(long)]
    pub api: Option<String>,

    /// Seconds between status checks
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Give up after this many seconds of waiting
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Retries on transport errors
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// JSON run template file
    #[arg(long)]
    pub template: Option<String>,

    /// Signing region
    #[arg(long)]
    pub region: Option<String>,

    /// Send unsigned requests
    #[arg(long)]
    pub no_sign: bool,

    /// Check that the target answers before starting the run
    #[arg(long)]
    pub preflight: bool,
}

/// Arguments for evaluate command
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Saved status document (the JSON returned for a run)
    #[arg(short, long)]
    pub results: String,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,
}

impl From<&ThresholdArgs> for SettingsOverrides {
    fn from(args: &ThresholdArgs) -> Self {
        Self {
            target_url: args.target.clone(),
            avg_response_time_ms: args.avg_rt_threshold,
            failure_count: args.failure_threshold,
            allow_unchecked: args.allow_unchecked,
            ..Default::default()
        }
    }
}

impl From<&RunArgs> for SettingsOverrides {
    fn from(args: &RunArgs) -> Self {
        Self {
            api_url: args.api.clone(),
            poll_interval_secs: args.poll_interval,
            deadline_secs: args.deadline,
            request_timeout_secs: args.request_timeout,
            max_retries: args.max_retries,
            template_path: args.template.clone(),
            region: args.region.clone(),
            no_sign: args.no_sign,
            preflight: args.preflight,
            ..SettingsOverrides::from(&args.thresholds)
        }
    }
}
