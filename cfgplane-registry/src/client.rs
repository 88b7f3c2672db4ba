//! RPC client for out-of-process model plugins.
//!
//! Plugins serve a small JSON API over mutual TLS: the client presents its
//! certificate but does **not** verify the plugin's server certificate.
//! Plugins are expected on the local host and are trusted by port. This is
//! a known trust limitation.
//!
//! Plain HTTP is refused unless [`ClientConfig::insecure_plaintext`] is set.

use crate::error::{RegistryError, RegistryResult};
use crate::model::ModelInfo;
use async_trait::async_trait;
use cfgplane_types::PathValue;
use reqwest::{Client, Identity, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

pub const MODEL_INFO_ROUTE: &str = "/v1/model-info";
pub const VALIDATE_ROUTE: &str = "/v1/validate";
pub const PATH_VALUES_ROUTE: &str = "/v1/path-values";

/// The calls the registry makes on a model plugin.
#[async_trait]
pub trait PluginClient: Send + Sync {
    /// Fetches the plugin's model metadata.
    async fn get_model_info(&self) -> RegistryResult<ModelInfo>;

    /// Asks the plugin whether `document` is valid for its model.
    async fn validate_config(&self, document: &Value) -> RegistryResult<bool>;

    /// Decomposes `document` into typed path values below `path_prefix`.
    async fn get_path_values(
        &self,
        path_prefix: &str,
        document: &Value,
    ) -> RegistryResult<Vec<PathValue>>;
}

/// Client certificate presented to plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM-encoded client certificate.
    pub client_cert: PathBuf,
    /// PEM-encoded private key for `client_cert`.
    pub client_key: PathBuf,
}

impl TlsConfig {
    fn identity(&self) -> RegistryResult<Identity> {
        let mut pem = std::fs::read(&self.client_cert)?;
        pem.push(b'\n');
        pem.extend(std::fs::read(&self.client_key)?);
        Identity::from_pem(&pem).map_err(|e| {
            RegistryError::Tls(format!(
                "loading {} / {}: {e}",
                self.client_cert.display(),
                self.client_key.display()
            ))
        })
    }
}

/// Retry policy for transient RPC failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

/// How the registry reaches plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host the plugin ports are bound on.
    pub host: String,
    /// Mutual TLS settings. Required unless `insecure_plaintext` is set.
    pub tls: Option<TlsConfig>,
    /// Allow plain HTTP when `tls` is absent.
    pub insecure_plaintext: bool,
    pub retry: RetryPolicy,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            tls: None,
            insecure_plaintext: false,
            retry: RetryPolicy::default(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    /// Fails with [`RegistryError::TlsRequired`] when the configuration
    /// would reach plugins over plain HTTP without opting in.
    pub fn check_transport(&self) -> RegistryResult<()> {
        if self.tls.is_none() && !self.insecure_plaintext {
            return Err(RegistryError::TlsRequired);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    json: &'a Value,
}

#[derive(Deserialize)]
struct ValidateResponse {
    valid: bool,
}

#[derive(Serialize)]
struct PathValuesRequest<'a> {
    path_prefix: &'a str,
    json: &'a Value,
}

#[derive(Deserialize)]
struct PathValuesResponse {
    #[serde(default)]
    path_values: Vec<PathValue>,
}

/// [`PluginClient`] speaking JSON over HTTP(S).
pub struct HttpPluginClient {
    base_url: String,
    http: Client,
    retry: RetryPolicy,
}

impl HttpPluginClient {
    /// Builds a client for the plugin listening on `port`. No connection
    /// is made until the first call.
    pub fn new(config: &ClientConfig, port: u16) -> RegistryResult<Self> {
        config.check_transport()?;

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms));

        let scheme = match &config.tls {
            Some(tls) => {
                builder = builder
                    .use_rustls_tls()
                    .identity(tls.identity()?)
                    .danger_accept_invalid_certs(true);
                "https"
            }
            None => "http",
        };
        let base_url = format!("{scheme}://{}:{port}", config.host);
        if config.tls.is_none() {
            warn!(base_url = %base_url, "Plugin channel is plaintext (insecure_plaintext set)");
        }

        Ok(Self {
            base_url,
            http: builder.build()?,
            retry: config.retry,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    async fn send_with_retry<F>(&self, request: F) -> RegistryResult<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let max_backoff = Duration::from_millis(self.retry.max_backoff_ms);
        let mut backoff = Duration::from_millis(self.retry.initial_backoff_ms);
        let mut attempt = 1;

        loop {
            let result = request().send().await;
            let transient = match &result {
                Ok(resp) => is_transient_status(resp.status()),
                Err(e) => e.is_connect() || e.is_timeout(),
            };
            if !transient || attempt >= max_attempts {
                return match result {
                    Ok(resp) => check_status(resp).await,
                    Err(e) => Err(e.into()),
                };
            }

            drop(result);
            debug!(base_url = %self.base_url, attempt, "Transient plugin RPC failure, retrying");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(max_backoff);
            attempt += 1;
        }
    }

    async fn post<B, T>(&self, route: &str, body: &B) -> RegistryResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(route);
        let resp = self
            .send_with_retry(|| self.http.post(&url).json(body))
            .await?;
        Ok(resp.json().await?)
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn check_status(resp: Response) -> RegistryResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(RegistryError::Rpc {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PluginClient for HttpPluginClient {
    async fn get_model_info(&self) -> RegistryResult<ModelInfo> {
        let url = self.url(MODEL_INFO_ROUTE);
        let resp = self.send_with_retry(|| self.http.get(&url)).await?;
        Ok(resp.json().await?)
    }

    async fn validate_config(&self, document: &Value) -> RegistryResult<bool> {
        let resp: ValidateResponse = self
            .post(VALIDATE_ROUTE, &ValidateRequest { json: document })
            .await?;
        Ok(resp.valid)
    }

    async fn get_path_values(
        &self,
        path_prefix: &str,
        document: &Value,
    ) -> RegistryResult<Vec<PathValue>> {
        let resp: PathValuesResponse = self
            .post(
                PATH_VALUES_ROUTE,
                &PathValuesRequest {
                    path_prefix,
                    json: document,
                },
            )
            .await?;
        Ok(resp.path_values)
    }
}
