//! Configuration module
//!
//! Gate settings are merged from a config file, the environment and command
//! line flags (later sources win), then validated into immutable values.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
#[cfg(test)]
pub use env::EnvBuilder;
pub use file::{expand_path, ConfigFile};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::GateError;

/// Raw threshold settings as supplied by the caller
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    /// Endpoint under test
    pub target_url: Option<String>,

    /// Average response time must stay strictly below this (ms)
    pub avg_response_time_ms: Option<f64>,

    /// Failed request count must stay strictly below this
    pub failure_count: Option<u64>,

    /// Accept a gate with no thresholds (passes whenever the run completes)
    pub allow_unchecked: bool,
}

impl ThresholdSettings {
    #[cfg(test)]
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: Some(target_url.into()),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn avg_response_time(mut self, ms: f64) -> Self {
        self.avg_response_time_ms = Some(ms);
        self
    }

    #[cfg(test)]
    pub fn failure_count(mut self, count: u64) -> Self {
        self.failure_count = Some(count);
        self
    }

    #[cfg(test)]
    pub fn allow_unchecked(mut self) -> Self {
        self.allow_unchecked = true;
        self
    }

    /// Validate into an immutable threshold configuration
    pub fn validate(&self) -> Result<ThresholdConfig, GateError> {
        let raw = self
            .target_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GateError::config("target URL is required"))?;
        let target_url = parse_http_url("target URL", raw)?;

        if let Some(ms) = self.avg_response_time_ms {
            if !ms.is_finite() || ms < 0.0 {
                return Err(GateError::config(format!(
                    "average response time threshold must be a non-negative number, got {ms}"
                )));
            }
        }

        if self.avg_response_time_ms.is_none()
            && self.failure_count.is_none()
            && !self.allow_unchecked
        {
            return Err(GateError::config(
                "no thresholds configured; set one or explicitly allow an unchecked gate",
            ));
        }

        Ok(ThresholdConfig {
            target_url,
            avg_response_time_ms: self.avg_response_time_ms,
            failure_count: self.failure_count,
        })
    }
}

/// Validated pass/fail limits and the endpoint under test
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdConfig {
    target_url: Url,
    avg_response_time_ms: Option<f64>,
    failure_count: Option<u64>,
}

impl ThresholdConfig {
    pub fn target_url(&self) -> &Url {
        &self.target_url
    }

    pub fn avg_response_time_ms(&self) -> Option<f64> {
        self.avg_response_time_ms
    }

    pub fn failure_count(&self) -> Option<u64> {
        self.failure_count
    }

    /// True when no threshold is configured
    pub fn is_unchecked(&self) -> bool {
        self.avg_response_time_ms.is_none() && self.failure_count.is_none()
    }
}

/// Load-test backend connection settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Backend base URL, e.g. `https://abc.execute-api.us-east-1.amazonaws.com/prod/`
    pub api_url: Option<String>,

    /// Signing region
    pub region: String,

    /// Signing service name
    pub service: String,

    /// Sign requests with AWS Signature V4
    pub sign: bool,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries on transport errors (not on HTTP error statuses)
    pub max_retries: u32,

    /// Base backoff between transport retries in milliseconds
    pub retry_backoff_ms: u64,

    /// JSON run template; the built-in template is used when unset
    pub template_path: Option<String>,

    /// Probe the target endpoint before starting the run
    pub preflight: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            region: "us-east-1".to_string(),
            service: "execute-api".to_string(),
            sign: true,
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            template_path: None,
            preflight: false,
        }
    }
}

impl BackendSettings {
    /// Backend base URL with a trailing slash, ready for joining resource paths
    pub fn api_base(&self) -> Result<Url, GateError> {
        let raw = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GateError::config("load-test backend URL is required"))?;

        let mut url = parse_http_url("backend URL", raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Completion polling settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Seconds between status checks
    pub interval_secs: u64,

    /// Overall wait limit in seconds; unset waits until cancelled
    pub deadline_secs: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            deadline_secs: None,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Command line values that override file and environment settings
#[derive(Clone, Debug, Default)]
pub struct SettingsOverrides {
    pub target_url: Option<String>,
    pub api_url: Option<String>,
    pub avg_response_time_ms: Option<f64>,
    pub failure_count: Option<u64>,
    pub allow_unchecked: bool,
    pub poll_interval_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub template_path: Option<String>,
    pub region: Option<String>,
    pub no_sign: bool,
    pub preflight: bool,
}

/// Complete gate settings
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GateSettings {
    pub thresholds: ThresholdSettings,
    pub backend: BackendSettings,
    pub polling: PollSettings,
}

impl From<ConfigFile> for GateSettings {
    fn from(file: ConfigFile) -> Self {
        Self {
            thresholds: file.thresholds,
            backend: file.backend,
            polling: file.polling,
        }
    }
}

impl GateSettings {
    /// Merge file, environment and command line sources, in that order
    pub fn resolve(
        file: ConfigFile,
        env: &EnvConfig,
        overrides: SettingsOverrides,
    ) -> Result<Self, GateError> {
        let settings = Self::from(file).apply_env(env)?.apply_overrides(overrides);
        settings.validate_polling()?;
        Ok(settings)
    }

    /// Apply environment values on top of the current settings
    pub fn apply_env(mut self, env: &EnvConfig) -> Result<Self, GateError> {
        if let Some(url) = &env.app_endpoint {
            self.thresholds.target_url = Some(url.clone());
        }
        if let Some(raw) = &env.avg_rt_threshold {
            self.thresholds.avg_response_time_ms = Some(parse_number("AVG_RT_THRESHOLD", raw)?);
        }
        if let Some(raw) = &env.failure_threshold {
            self.thresholds.failure_count = Some(parse_number("FAILURE_THRESHOLD", raw)?);
        }
        if let Some(url) = &env.api_endpoint {
            self.backend.api_url = Some(url.clone());
        }
        if let Some(region) = &env.region {
            self.backend.region = region.clone();
        }
        if let Some(raw) = &env.request_timeout {
            self.backend.request_timeout_secs = parse_number("request timeout", raw)?;
        }
        if let Some(path) = &env.template {
            self.backend.template_path = Some(path.clone());
        }
        if let Some(raw) = &env.poll_interval {
            self.polling.interval_secs = parse_number("poll interval", raw)?;
        }
        if let Some(raw) = &env.deadline {
            self.polling.deadline_secs = Some(parse_number("deadline", raw)?);
        }
        Ok(self)
    }

    /// Apply command line values on top of the current settings
    pub fn apply_overrides(mut self, o: SettingsOverrides) -> Self {
        if o.target_url.is_some() {
            self.thresholds.target_url = o.target_url;
        }
        if o.avg_response_time_ms.is_some() {
            self.thresholds.avg_response_time_ms = o.avg_response_time_ms;
        }
        if o.failure_count.is_some() {
            self.thresholds.failure_count = o.failure_count;
        }
        self.thresholds.allow_unchecked |= o.allow_unchecked;

        if o.api_url.is_some() {
            self.backend.api_url = o.api_url;
        }
        if let Some(region) = o.region {
            self.backend.region = region;
        }
        if let Some(secs) = o.request_timeout_secs {
            self.backend.request_timeout_secs = secs;
        }
        if let Some(retries) = o.max_retries {
            self.backend.max_retries = retries;
        }
        if o.template_path.is_some() {
            self.backend.template_path = o.template_path;
        }
        if o.no_sign {
            self.backend.sign = false;
        }
        self.backend.preflight |= o.preflight;

        if let Some(secs) = o.poll_interval_secs {
            self.polling.interval_secs = secs;
        }
        if o.deadline_secs.is_some() {
            self.polling.deadline_secs = o.deadline_secs;
        }
        self
    }

    fn validate_polling(&self) -> Result<(), GateError> {
        if self.polling.interval_secs == 0 {
            return Err(GateError::config("poll interval must be at least 1 second"));
        }
        if self.polling.deadline_secs == Some(0) {
            return Err(GateError::config("deadline must be at least 1 second"));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(GateError::config("request timeout must be at least 1 second"));
        }
        Ok(())
    }
}

/// Parse a numeric setting, rejecting anything that is not a plain number
fn parse_number<T: FromStr>(name: &str, raw: &str) -> Result<T, GateError> {
    raw.trim()
        .parse()
        .map_err(|_| GateError::config(format!("{name} must be numeric, got {raw:?}")))
}

fn parse_http_url(name: &str, raw: &str) -> Result<Url, GateError> {
    let url =
        Url::parse(raw).map_err(|e| GateError::config(format!("{name} {raw:?} is invalid: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(GateError::config(format!(
            "{name} {raw:?} must be an absolute http(s) URL"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "https://abc123.execute-api.us-east-1.amazonaws.com/v1/blog-test-app";

    #[test]
    fn test_validate_requires_target() {
        let err = ThresholdSettings::default()
            .failure_count(5)
            .validate()
            .unwrap_err();
        assert!(matches!(err, GateError::ConfigInvalid(_)));

        let blank = ThresholdSettings::new("   ").failure_count(5);
        assert!(matches!(blank.validate(), Err(GateError::ConfigInvalid(_))));
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let settings = ThresholdSettings::new("/v1/app").failure_count(5);
        assert!(matches!(settings.validate(), Err(GateError::ConfigInvalid(_))));

        let settings = ThresholdSettings::new("ftp://example.com/app").failure_count(5);
        assert!(matches!(settings.validate(), Err(GateError::ConfigInvalid(_))));
    }

    #[test]
    fn test_validate_unchecked_must_be_explicit() {
        let settings = ThresholdSettings::new(TARGET);
        assert!(matches!(settings.validate(), Err(GateError::ConfigInvalid(_))));

        let config = settings.allow_unchecked().validate().unwrap();
        assert!(config.is_unchecked());
    }

    #[test]
    fn test_validate_rejects_bad_avg_threshold() {
        let negative = ThresholdSettings::new(TARGET).avg_response_time(-1.0);
        assert!(negative.validate().is_err());

        let nan = ThresholdSettings::new(TARGET).avg_response_time(f64::NAN);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_validate_keeps_zero_threshold() {
        let config = ThresholdSettings::new(TARGET)
            .failure_count(0)
            .validate()
            .unwrap();
        assert_eq!(config.failure_count(), Some(0));
        assert_eq!(config.avg_response_time_ms(), None);
        assert_eq!(config.target_url().as_str(), TARGET);
    }

    #[test]
    fn test_api_base_adds_trailing_slash() {
        let backend = BackendSettings {
            api_url: Some("https://xyz.execute-api.us-east-1.amazonaws.com/prod".to_string()),
            ..Default::default()
        };
        assert_eq!(
            backend.api_base().unwrap().as_str(),
            "https://xyz.execute-api.us-east-1.amazonaws.com/prod/"
        );

        assert!(BackendSettings::default().api_base().is_err());
    }

    #[test]
    fn test_env_thresholds_are_numeric() {
        let env = EnvConfig {
            app_endpoint: Some(TARGET.to_string()),
            avg_rt_threshold: Some("150".to_string()),
            failure_threshold: Some("5".to_string()),
            ..Default::default()
        };
        let settings = GateSettings::default().apply_env(&env).unwrap();
        assert_eq!(settings.thresholds.avg_response_time_ms, Some(150.0));
        assert_eq!(settings.thresholds.failure_count, Some(5));

        let env = EnvConfig {
            failure_threshold: Some("five".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            GateSettings::default().apply_env(&env),
            Err(GateError::ConfigInvalid(_))
        ));

        let env = EnvConfig {
            failure_threshold: Some("2.5".to_string()),
            ..Default::default()
        };
        assert!(GateSettings::default().apply_env(&env).is_err());
    }

    #[test]
    fn test_resolve_precedence() {
        let mut file = ConfigFile::default();
        file.thresholds.failure_count = Some(10);
        file.polling.interval_secs = 30;
        file.backend.api_url = Some("https://file.example.com/".to_string());

        let env = EnvConfig {
            failure_threshold: Some("7".to_string()),
            poll_interval: Some("20".to_string()),
            ..Default::default()
        };

        let overrides = SettingsOverrides {
            failure_count: Some(3),
            no_sign: true,
            ..Default::default()
        };

        let settings = GateSettings::resolve(file, &env, overrides).unwrap();
        assert_eq!(settings.thresholds.failure_count, Some(3));
        assert_eq!(settings.polling.interval_secs, 20);
        assert_eq!(
            settings.backend.api_url.as_deref(),
            Some("https://file.example.com/")
        );
        assert!(!settings.backend.sign);
    }

    #[test]
    fn test_resolve_rejects_zero_interval() {
        let overrides = SettingsOverrides {
            poll_interval_secs: Some(0),
            ..Default::default()
        };
        let result = GateSettings::resolve(ConfigFile::default(), &EnvConfig::default(), overrides);
        assert!(matches!(result, Err(GateError::ConfigInvalid(_))));
    }

    #[test]
    fn test_poll_settings() {
        let polling = PollSettings {
            interval_secs: 5,
            deadline_secs: Some(60),
        };
        assert_eq!(polling.interval(), Duration::from_secs(5));
        assert_eq!(polling.deadline(), Some(Duration::from_secs(60)));
        assert_eq!(PollSettings::default().deadline(), None);
    }
}
