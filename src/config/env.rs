//! Environment variable configuration
//!
//! Reads the gate's inputs from the process environment. This is done once,
//! at the binary edge; everything downstream receives explicit settings.

use std::env;

/// Environment variable prefix for gate-specific settings
const ENV_PREFIX: &str = "LOADTEST_GATE";

/// Load-test backend base URL
pub const API_ENDPOINT_VAR: &str = "LOAD_TEST_API_ENDPOINT";
/// Endpoint under test
pub const APP_ENDPOINT_VAR: &str = "APP_END_POINT";
/// Failure count threshold
pub const FAILURE_THRESHOLD_VAR: &str = "FAILURE_THRESHOLD";
/// Average response time threshold
pub const AVG_RT_THRESHOLD_VAR: &str = "AVG_RT_THRESHOLD";

/// Environment configuration from environment variables
///
/// Numeric values are kept as raw strings so that a non-numeric threshold is
/// reported as invalid configuration instead of being silently dropped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Backend base URL from LOAD_TEST_API_ENDPOINT
    pub api_endpoint: Option<String>,
    /// Target URL from APP_END_POINT
    pub app_endpoint: Option<String>,
    /// Failure threshold from FAILURE_THRESHOLD
    pub failure_threshold: Option<String>,
    /// Average response time threshold from AVG_RT_THRESHOLD
    pub avg_rt_threshold: Option<String>,
    /// Poll interval seconds from LOADTEST_GATE_POLL_INTERVAL
    pub poll_interval: Option<String>,
    /// Deadline seconds from LOADTEST_GATE_DEADLINE
    pub deadline: Option<String>,
    /// Per-request timeout seconds from LOADTEST_GATE_REQUEST_TIMEOUT
    pub request_timeout: Option<String>,
    /// Run template path from LOADTEST_GATE_TEMPLATE
    pub template: Option<String>,
    /// Config file from LOADTEST_GATE_CONFIG
    pub config_file: Option<String>,
    /// Signing region from AWS_REGION or AWS_DEFAULT_REGION
    pub region: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            api_endpoint: get_var(API_ENDPOINT_VAR),
            app_endpoint: get_var(APP_ENDPOINT_VAR),
            failure_threshold: get_var(FAILURE_THRESHOLD_VAR),
            avg_rt_threshold: get_var(AVG_RT_THRESHOLD_VAR),
            poll_interval: get_env("POLL_INTERVAL"),
            deadline: get_env("DEADLINE"),
            request_timeout: get_env("REQUEST_TIMEOUT"),
            template: get_env("TEMPLATE"),
            config_file: get_env("CONFIG"),
            region: get_var("AWS_REGION").or_else(|| get_var("AWS_DEFAULT_REGION")),
        }
    }

    /// Check if any gate input is set
    pub fn has_any(&self) -> bool {
        self.api_endpoint.is_some()
            || self.app_endpoint.is_some()
            || self.failure_threshold.is_some()
            || self.avg_rt_threshold.is_some()
            || self.poll_interval.is_some()
            || self.deadline.is_some()
            || self.request_timeout.is_some()
            || self.template.is_some()
            || self.config_file.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {API_ENDPOINT_VAR}:        {:?}", self.api_endpoint);
        println!("  {APP_ENDPOINT_VAR}:                {:?}", self.app_endpoint);
        println!("  {FAILURE_THRESHOLD_VAR}:            {:?}", self.failure_threshold);
        println!("  {AVG_RT_THRESHOLD_VAR}:             {:?}", self.avg_rt_threshold);
        println!("  {ENV_PREFIX}_POLL_INTERVAL:   {:?}", self.poll_interval);
        println!("  {ENV_PREFIX}_DEADLINE:        {:?}", self.deadline);
        println!("  {ENV_PREFIX}_REQUEST_TIMEOUT: {:?}", self.request_timeout);
        println!("  {ENV_PREFIX}_TEMPLATE:        {:?}", self.template);
        println!("  {ENV_PREFIX}_CONFIG:          {:?}", self.config_file);
        println!("  AWS_REGION:                   {:?}", self.region);
    }
}

/// Get a gate-specific environment variable
fn get_env(name: &str) -> Option<String> {
    get_var(&format!("{ENV_PREFIX}_{name}"))
}

/// Get an environment variable, treating empty values as unset
fn get_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Serializes tests that modify the process environment
#[cfg(test)]
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Builder for setting environment variables in tests
#[cfg(test)]
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary variable
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((key.into(), Some(value.into())));
        self
    }

    /// Remove a variable for the lifetime of the guard
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.vars.push((key.into(), None));
        self
    }

    pub fn api_endpoint(self, url: impl Into<String>) -> Self {
        self.var(API_ENDPOINT_VAR, url)
    }

    pub fn app_endpoint(self, url: impl Into<String>) -> Self {
        self.var(APP_ENDPOINT_VAR, url)
    }

    pub fn failure_threshold(self, value: impl Into<String>) -> Self {
        self.var(FAILURE_THRESHOLD_VAR, value)
    }

    pub fn avg_rt_threshold(self, value: impl Into<String>) -> Self {
        self.var(AVG_RT_THRESHOLD_VAR, value)
    }

    pub fn poll_interval(self, secs: u64) -> Self {
        self.var(format!("{ENV_PREFIX}_POLL_INTERVAL"), secs.to_string())
    }

    /// Apply the variables and return a guard that restores them on drop
    ///
    /// The guard also holds a process-wide lock, so environment-dependent
    /// tests run one at a time.
    pub fn apply_scoped(self) -> EnvGuard {
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let previous = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        EnvGuard {
            previous,
            _lock: lock,
        }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print the environment variables the gate reads
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {APP_ENDPOINT_VAR}                  Endpoint under test (absolute URL)");
    println!("  {API_ENDPOINT_VAR}          Load-test backend base URL");
    println!("  {AVG_RT_THRESHOLD_VAR}               Average response time threshold (ms)");
    println!("  {FAILURE_THRESHOLD_VAR}              Failed request count threshold");
    println!("  {ENV_PREFIX}_POLL_INTERVAL     Seconds between status checks (default 10)");
    println!("  {ENV_PREFIX}_DEADLINE          Seconds to wait for the run (default: no limit)");
    println!("  {ENV_PREFIX}_REQUEST_TIMEOUT   Per-request timeout in seconds (default 30)");
    println!("  {ENV_PREFIX}_TEMPLATE          Path to a JSON run template");
    println!("  {ENV_PREFIX}_CONFIG            Path to configuration file");
    println!("  AWS_REGION                     Signing region (default us-east-1)");
    println!();
    println!("Signing credentials come from the default AWS provider chain: AWS_ACCESS_KEY_ID/");
    println!("AWS_SECRET_ACCESS_KEY/AWS_SESSION_TOKEN, AWS_PROFILE and the shared config files,");
    println!("web identity, the ECS/CodeBuild container endpoint, then EC2 instance metadata.");
    println!();
    println!("Example:");
    println!("  export {APP_ENDPOINT_VAR}=https://abc123.execute-api.us-east-1.amazonaws.com/v1/app");
    println!("  export {API_ENDPOINT_VAR}=https://xyz789.execute-api.us-east-1.amazonaws.com/prod/");
    println!("  export {AVG_RT_THRESHOLD_VAR}=600");
    println!("  export {FAILURE_THRESHOLD_VAR}=5");
    println!("  loadtest-gate run --deadline 1800");
}
