//! Registration hub client module
//!
//! This module provides a client for the registration hub's installation
//! REST API. It covers creating or overwriting an installation record,
//! patching individual pieces of it (tags, enabled flag), and reading the
//! canonical record back.
//!
//! The main component is the `HubClient` struct, which handles SAS
//! authorization and communication with the hub. Requests carry the
//! configured api-version and are retried according to the injected
//! [`RetryPolicy`](crate::retry::RetryPolicy).

use reqwest::{header, Client, Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use hublink_config::HubConfig;
use thiserror::Error;

use crate::connection::{ConnectionString, ConnectionStringError};
use crate::installation::{InstallationRecord, PatchOperation};
use crate::retry::{NoRetry, RetryPolicy};
use crate::sas::{sas_token_for, SasError};

/// Errors that can occur when interacting with the registration hub API
#[derive(Error, Debug)]
pub enum HubError {
    /// The hub rejected the request's authorization
    #[error("Authorization error: {0}")]
    AuthError(String),

    /// Error during HTTP request to the hub
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing or malformed configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// The addressed installation does not exist
    #[error("Installation not found: {0}")]
    NotFound(String),

    /// Error returned by the hub API
    #[error("Hub API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The hub's response could not be interpreted
    #[error("Failed to parse hub response: {0}")]
    ResponseError(String),

    /// An upsert was attempted before an installation id was assigned
    #[error("installation record has no installation id")]
    MissingInstallationId,

    /// Token generation failed
    #[error(transparent)]
    SasError(#[from] SasError),
}

impl From<ConnectionStringError> for HubError {
    fn from(err: ConnectionStringError) -> Self {
        HubError::ConfigError(err.to_string())
    }
}

/// Client for the registration hub's installation API
///
/// Holds the parsed connection credentials and an HTTP client. One
/// `HubClient` serves all installation operations for the configured hub.
pub struct HubClient {
    /// HTTP client for making requests to the hub
    client: Client,

    /// Parsed shared-access credentials and endpoint
    connection: ConnectionString,

    /// Name of the hub addressed by this client
    hub_name: String,

    /// REST api-version requested on every call
    api_version: String,

    /// Retry policy applied to transport failures and 5xx responses
    retry: Arc<dyn RetryPolicy>,
}

impl HubClient {
    /// Creates a new hub client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `HubError::ConfigError` if the connection string does not
    /// parse.
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let connection: ConnectionString = config.connection_string.parse()?;
        Ok(HubClient {
            client: Client::new(),
            connection,
            hub_name: config.hub_name.clone(),
            api_version: config.api_version.clone(),
            retry: Arc::new(NoRetry),
        })
    }

    /// Replaces the retry policy used for transport and 5xx failures.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    fn installation_url(&self, installation_id: &str) -> String {
        format!(
            "{}/{}/installations/{}?api-version={}",
            self.connection.https_endpoint(),
            self.hub_name,
            installation_id,
            self.api_version
        )
    }

    /// Creates or overwrites an installation record, returning the record
    /// as the hub stored it.
    pub async fn put_installation(
        &self,
        record: &InstallationRecord,
    ) -> Result<InstallationRecord, HubError> {
        let url = self.installation_url(&record.installation_id);
        let body = serde_json::to_value(record)
            .map_err(|err| HubError::ResponseError(err.to_string()))?;
        debug!(installation_id = %record.installation_id, "upserting installation");
        let response = self.execute(Method::PUT, &url, Some(body)).await?;
        Self::parse_record(response).await
    }

    /// Applies JSON-patch operations to an installation, returning the
    /// canonical record.
    pub async fn patch_installation(
        &self,
        installation_id: &str,
        operations: &[PatchOperation],
    ) -> Result<InstallationRecord, HubError> {
        let url = self.installation_url(installation_id);
        let body = serde_json::to_value(operations)
            .map_err(|err| HubError::ResponseError(err.to_string()))?;
        debug!(installation_id, ops = operations.len(), "patching installation");
        let response = self.execute(Method::PATCH, &url, Some(body)).await?;
        Self::parse_record(response).await
    }

    /// Reads the canonical installation record.
    pub async fn get_installation(
        &self,
        installation_id: &str,
    ) -> Result<InstallationRecord, HubError> {
        let url = self.installation_url(installation_id);
        let response = self.execute(Method::GET, &url, None).await?;
        Self::parse_record(response).await
    }

    async fn parse_record(response: reqwest::Response) -> Result<InstallationRecord, HubError> {
        response
            .json::<InstallationRecord>()
            .await
            .map_err(|err| HubError::ResponseError(err.to_string()))
    }

    /// Issues one request, re-issuing it per the retry policy on transport
    /// failures and 5xx responses. A fresh SAS token is minted per attempt
    /// so retries never run into token expiry.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, HubError> {
        let mut attempt: u32 = 0;
        loop {
            let token = sas_token_for(&self.connection, url)?;
            let mut request = self
                .client
                .request(method.clone(), url)
                .header(header::AUTHORIZATION, token)
                .header("x-ms-version", &self.api_version);
            if let Some(body) = &body {
                let content_type = if method == Method::PATCH {
                    "application/json-patch+json"
                } else {
                    "application/json"
                };
                request = request
                    .header(header::CONTENT_TYPE, content_type)
                    .body(body.to_string());
            }

            let failure = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().is_server_error() => {
                    Self::api_error(response).await
                }
                Ok(response) => return Err(Self::map_client_error(response).await),
                Err(err) if err.is_connect() || err.is_timeout() => HubError::RequestError(err),
                Err(err) => return Err(HubError::RequestError(err)),
            };

            match self.retry.delay_for(attempt) {
                Some(delay) => {
                    warn!(attempt, ?delay, error = %failure, "hub call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(failure),
            }
        }
    }

    async fn map_client_error(response: reqwest::Response) -> HubError {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                HubError::AuthError(Self::error_text(response).await)
            }
            StatusCode::NOT_FOUND => HubError::NotFound(Self::error_text(response).await),
            _ => HubError::ApiError {
                status: status.as_u16(),
                message: Self::error_text(response).await,
            },
        }
    }

    async fn api_error(response: reqwest::Response) -> HubError {
        HubError::ApiError {
            status: response.status().as_u16(),
            message: Self::error_text(response).await,
        }
    }

    async fn error_text(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "<no response body>".to_string())
    }
}
