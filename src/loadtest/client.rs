//! Scenarios API client
//!
//! Starts runs with `POST {api}scenarios/` and reads them back with
//! `GET {api}scenarios/{id}`.

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use reqwest::Url;
use tracing::{debug, info};

use super::template::RunTemplate;
use super::wire::{parse_start_response, parse_status_response};
use super::RunBackend;
use crate::config::{expand_path, BackendSettings};
use crate::error::GateError;
use crate::http::{HttpClient, HttpError, HttpResponse, RequestSigner};
use crate::models::TestRun;

/// Longest response excerpt carried in a `BackendUnavailable` message
const ERROR_BODY_EXCERPT: usize = 200;

/// Client for the load-test scenarios API
pub struct LoadTestClient {
    http: HttpClient,
    probe: HttpClient,
    api_base: Url,
    template: RunTemplate,
}

impl LoadTestClient {
    pub fn new(http: HttpClient, api_base: Url, template: RunTemplate) -> Self {
        Self {
            probe: http.clone(),
            http,
            api_base,
            template,
        }
    }

    /// Use a separate client for probing the target endpoint
    pub fn with_probe_client(mut self, probe: HttpClient) -> Self {
        self.probe = probe;
        self
    }

    /// Build a client from backend settings
    ///
    /// Signing is enabled unless the settings turn it off, in which case the
    /// credential provider is ignored.
    pub fn from_settings(
        settings: &BackendSettings,
        credentials: Option<SharedCredentialsProvider>,
    ) -> Result<Self, GateError> {
        let api_base = settings.api_base()?;

        let template = match &settings.template_path {
            Some(path) => RunTemplate::from_file(expand_path(path))?,
            None => RunTemplate::default(),
        };

        let http_error = |e: HttpError| GateError::config(e.to_string());

        let mut http = HttpClient::with_timeout(settings.request_timeout())
            .map_err(http_error)?
            .retries(settings.max_retries, settings.retry_backoff());

        if settings.sign {
            let credentials = credentials.ok_or_else(|| {
                GateError::config("request signing is enabled but no AWS credentials were resolved")
            })?;
            http = http.signer(RequestSigner::new(
                credentials,
                settings.region.clone(),
                settings.service.clone(),
            ));
        }

        let probe = HttpClient::with_timeout(settings.request_timeout()).map_err(http_error)?;

        Ok(Self::new(http, api_base, template).with_probe_client(probe))
    }

    fn scenarios_url(&self) -> Result<Url, GateError> {
        self.api_base
            .join("scenarios/")
            .map_err(|e| GateError::config(format!("invalid backend URL: {e}")))
    }

    fn run_url(&self, run_id: &str) -> Result<Url, GateError> {
        let mut url = self.scenarios_url()?;
        url.path_segments_mut()
            .map_err(|_| GateError::config("backend URL cannot carry a path"))?
            .pop_if_empty()
            .push(run_id);
        Ok(url)
    }
}

/// Map a transport result onto the gate taxonomy, rejecting non-success statuses
fn check_response(
    action: &str,
    result: Result<HttpResponse, HttpError>,
) -> Result<HttpResponse, GateError> {
    let response = result.map_err(|e| match e {
        HttpError::Signing(_) => GateError::config(format!("{action}: {e}")),
        e => GateError::BackendUnavailable(format!("{action}: {e}")),
    })?;

    if !response.is_success() {
        let excerpt: String = response.body.chars().take(ERROR_BODY_EXCERPT).collect();
        return Err(GateError::BackendUnavailable(format!(
            "{action}: HTTP {} {}",
            response.status_code,
            excerpt.trim()
        )));
    }
    Ok(response)
}

#[async_trait]
impl RunBackend for LoadTestClient {
    async fn start_run(&self, target_url: &Url) -> Result<String, GateError> {
        let payload = self.template.render(target_url)?;
        let url = self.scenarios_url()?;

        debug!("Creating run at {}", url);
        let response = check_response(
            "create run",
            self.http.post_json(url.as_str(), &payload).await,
        )?;

        let run_id = parse_start_response(&response.body)?;
        info!("Started test with ID: {}", run_id);
        Ok(run_id)
    }

    async fn fetch_status(&self, run_id: &str) -> Result<TestRun, GateError> {
        let url = self.run_url(run_id)?;
        let response = check_response("get run status", self.http.get(url.as_str()).await)?;
        parse_status_response(run_id, &response.body)
    }

    async fn probe_target(&self, target_url: &Url) -> Result<(), GateError> {
        // Any HTTP answer, error statuses included, proves the endpoint is reachable.
        match self.probe.get(target_url.as_str()).await {
            Ok(response) => {
                info!(
                    "Target {} reachable (status: {})",
                    target_url, response.status_code
                );
                Ok(())
            }
            Err(e) => Err(GateError::TargetUnreachable(format!("{target_url}: {e}"))),
        }
    }
}
