//! AWS Signature Version 4 request signing
//!
//! Signs backend requests for API Gateway (`execute-api`) with credentials
//! from the default AWS provider chain: environment variables, shared
//! profiles, web identity, the ECS/CodeBuild container endpoint and EC2
//! instance metadata.

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::Url;
use std::collections::HashMap;
use std::time::SystemTime;
use tracing::{debug, info};

use super::client::HttpError;

/// Resolve the default credential chain for `region`
///
/// Credentials are fetched once here so a gate without any usable source
/// fails before the first backend call.
pub async fn default_credentials(region: &str) -> Result<SharedCredentialsProvider, HttpError> {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;

    let provider = config
        .credentials_provider()
        .ok_or_else(|| HttpError::Signing("no AWS credential provider configured".to_string()))?;

    let credentials = provider
        .provide_credentials()
        .await
        .map_err(|e| HttpError::Signing(format!("no AWS credentials found: {e}")))?;
    info!(
        "Signing requests as {} in {}",
        credentials.access_key_id(),
        region
    );

    Ok(provider)
}

/// Request signer bound to one region and service
#[derive(Clone, Debug)]
pub struct RequestSigner {
    provider: SharedCredentialsProvider,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(
        provider: SharedCredentialsProvider,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Compute the headers to add to a request: `x-amz-date`, the optional
    /// `x-amz-security-token` and `authorization`
    ///
    /// Credentials are resolved per request so expiring container and
    /// instance credentials are refreshed by their provider.
    pub async fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<Vec<(String, String)>, HttpError> {
        let credentials = self
            .provider
            .provide_credentials()
            .await
            .map_err(|e| HttpError::Signing(format!("cannot resolve AWS credentials: {e}")))?;

        self.sign_at(credentials, method, url, headers, body, SystemTime::now())
    }

    fn sign_at(
        &self,
        credentials: Credentials,
        method: &str,
        url: &Url,
        headers: &HashMap<String, String>,
        body: &[u8],
        time: SystemTime,
    ) -> Result<Vec<(String, String)>, HttpError> {
        let identity: Identity = credentials.into();
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(time)
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| HttpError::Signing(e.to_string()))?
            .into();

        let request = SignableRequest::new(
            method,
            url.as_str(),
            headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            SignableBody::Bytes(body),
        )
        .map_err(|e| HttpError::Signing(e.to_string()))?;

        let (instructions, _) = sign(request, &params)
            .map_err(|e| HttpError::Signing(e.to_string()))?
            .into_parts();

        debug!("Signed {} {} for {}", method, url, self.service);
        Ok(instructions
            .headers()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }
}
