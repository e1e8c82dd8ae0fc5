//! loadtest-gate - deployment pipeline gate backed by a remote load test
//!
//! Starts a load-test run against the endpoint under test, waits for it to
//! finish, compares the aggregate metrics with the configured thresholds and
//! reports the result through the process exit code.
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | run completed and every configured threshold passed |
//! | 1 | threshold breached, or the backend reported the run as failed |
//! | 2 | invalid configuration |
//! | 3 | load-test backend unavailable |
//! | 4 | malformed backend response |
//! | 5 | deadline reached before the run finished |
//! | 6 | cancelled (SIGINT/SIGTERM) |
//! | 7 | target endpoint unreachable (preflight) |
//!
//! ## Usage
//!
//! ```bash
//! # Gate on both thresholds, give up after 30 minutes
//! loadtest-gate run --target https://abc.execute-api.us-east-1.amazonaws.com/v1/app \
//!     --api https://xyz.execute-api.us-east-1.amazonaws.com/prod/ \
//!     --avg-rt-threshold 600 --failure-threshold 5 --deadline 1800
//!
//! # Same inputs from the environment
//! APP_END_POINT=... LOAD_TEST_API_ENDPOINT=... FAILURE_THRESHOLD=5 loadtest-gate run
//!
//! # Re-evaluate a saved status document
//! loadtest-gate evaluate --results status.json --target https://... --failure-threshold 5
//!
//! # Environment variable reference
//! loadtest-gate env
//! ```

use clap::Parser;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cli;
mod config;
mod error;
mod gate;
mod http;
mod loadtest;
mod models;
mod output;
mod utils;

use cli::{Args, Command, EvaluateArgs, RunArgs, ThresholdArgs};
use config::{expand_path, print_env_help, ConfigFile, EnvConfig, GateSettings, SettingsOverrides};
use error::{GateError, EXIT_PASSED};
use gate::{evaluate, CompletionPoller, GateController, GateOutcome};
use http::default_credentials;
use loadtest::{parse_saved_run, LoadTestClient};
use models::GateReport;
use output::{OutputFormat, ReportFormatter};
use utils::{init_logger, LogLevel, Timer};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::from_str(&args.log_level).unwrap_or(LogLevel::Info)
    };
    init_logger(level);

    let code = match args.command {
        Command::Run(run_args) => run_gate(&run_args).await,
        Command::Evaluate(eval_args) => evaluate_saved(&eval_args),
        Command::Env => {
            print_env_help();
            let env = EnvConfig::load();
            if env.has_any() {
                println!();
                env.print_summary();
            }
            EXIT_PASSED
        }
    };

    let _ = std::io::stdout().flush();
    std::process::exit(code);
}

async fn run_gate(args: &RunArgs) -> i32 {
    let formatter = match formatter_for(&args.thresholds) {
        Ok(f) => f,
        Err(e) => return finish(&ReportFormatter::default(), None, GateOutcome::Errored(e)),
    };

    info!("loadtest-gate v{}", env!("CARGO_PKG_VERSION"));

    let gate = match build_gate(args).await {
        Ok(gate) => gate,
        Err(e) => {
            error!("{}", e);
            return finish(&formatter, None, GateOutcome::Errored(e));
        }
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let outcome = gate.run(&cancel).await;
    finish(&formatter, args.thresholds.output.as_deref(), outcome)
}

async fn build_gate(args: &RunArgs) -> Result<GateController<LoadTestClient>, GateError> {
    let env = EnvConfig::load();
    let settings = load_settings(
        args.thresholds.config.as_deref(),
        &env,
        SettingsOverrides::from(args),
    )?;

    // Report threshold problems before backend ones; neither touches the network.
    let thresholds = settings.thresholds.validate()?;
    info!(
        "Target: {} (avg_rt < {}, fail < {})",
        thresholds.target_url(),
        describe_limit(thresholds.avg_response_time_ms()),
        describe_limit(thresholds.failure_count())
    );
    if thresholds.is_unchecked() {
        warn!("No thresholds configured; the gate passes whenever the run completes");
    }

    // Reject a bad backend URL before the credential chain reaches for the network.
    settings.backend.api_base()?;
    let credentials = if settings.backend.sign {
        let provider = default_credentials(&settings.backend.region)
            .await
            .map_err(|e| GateError::config(e.to_string()))?;
        Some(provider)
    } else {
        None
    };

    let client = LoadTestClient::from_settings(&settings.backend, credentials)?;
    let poller = CompletionPoller::new(settings.polling.interval())
        .deadline(settings.polling.deadline());

    Ok(GateController::new(settings.thresholds, client, poller).preflight(settings.backend.preflight))
}

fn evaluate_saved(args: &EvaluateArgs) -> i32 {
    let formatter = match formatter_for(&args.thresholds) {
        Ok(f) => f,
        Err(e) => return finish(&ReportFormatter::default(), None, GateOutcome::Errored(e)),
    };

    let outcome = match evaluate_file(args) {
        Ok(outcome) => outcome,
        Err(e) => GateOutcome::Errored(e),
    };
    finish(&formatter, args.thresholds.output.as_deref(), outcome)
}

fn evaluate_file(args: &EvaluateArgs) -> Result<GateOutcome, GateError> {
    let timer = Timer::start("evaluate");
    let env = EnvConfig::load();
    let settings = load_settings(
        args.thresholds.config.as_deref(),
        &env,
        SettingsOverrides::from(&args.thresholds),
    )?;
    let thresholds = settings.thresholds.validate()?;

    let path = expand_path(&args.results);
    let body = std::fs::read_to_string(&path)
        .map_err(|e| GateError::config(format!("cannot read {}: {e}", path.display())))?;
    let run = parse_saved_run(&body)?;
    info!("Evaluating saved {}", run);

    let verdict = evaluate(&run, &thresholds);
    let report = GateReport::new(
        &run,
        thresholds.target_url().as_str(),
        verdict,
        timer.elapsed_secs(),
    );

    Ok(if report.passed() {
        GateOutcome::Passed(report)
    } else {
        GateOutcome::Failed(report)
    })
}

fn load_settings(
    config_path: Option<&str>,
    env: &EnvConfig,
    overrides: SettingsOverrides,
) -> Result<GateSettings, GateError> {
    let path = config_path.or(env.config_file.as_deref());
    let file = ConfigFile::load_or_find(path).map_err(|e| GateError::config(format!("{e:#}")))?;
    GateSettings::resolve(file, env, overrides)
}

fn formatter_for(args: &ThresholdArgs) -> Result<ReportFormatter, GateError> {
    let format = OutputFormat::from_str(&args.format).ok_or_else(|| {
        GateError::config(format!(
            "unknown output format {:?} (expected text, json or json-pretty)",
            args.format
        ))
    })?;

    let formatter = ReportFormatter::new(format);
    Ok(if args.no_color {
        formatter.no_color()
    } else {
        formatter
    })
}

/// Print the outcome, write the report file if requested and return the exit code
fn finish(formatter: &ReportFormatter, output: Option<&str>, outcome: GateOutcome) -> i32 {
    println!("{}", formatter.format_outcome(&outcome));

    if let (Some(path), Some(report)) = (output, outcome.report()) {
        match report.save(expand_path(path)) {
            Ok(()) => info!("Report written to {}", path),
            Err(e) => error!("Failed to write report: {:#}", e),
        }
    }

    let code = outcome.exit_code();
    info!("Exiting with code {}", code);
    code
}

fn describe_limit<T: std::fmt::Display>(limit: Option<T>) -> String {
    limit
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unchecked".to_string())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received SIGINT, cancelling the gate");
        },
        _ = terminate => {
            warn!("Received SIGTERM, cancelling the gate");
        },
    }
}
