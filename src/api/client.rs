//! HTTP client for the App Store Connect API.

use bytes::Bytes;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

use super::model::{ErrorResponse, UploadOperation};
use super::{ApiError, ConnectApi, TokenSigner};
use crate::config::DeployConfig;

/// Authenticated App Store Connect client.
///
/// No retries happen here; a failed request is reported to the caller as-is.
pub struct AppStoreClient {
    http: Client,
    base_url: String,
    signer: TokenSigner,
}

impl AppStoreClient {
    /// Create a client from configuration, loading the API key from disk.
    pub fn from_config(config: &DeployConfig) -> Result<Self, ApiError> {
        let signer = TokenSigner::from_key_file(
            &config.credentials.key_id,
            &config.credentials.issuer_id,
            &config.credentials.key_file,
        )?;
        Self::new(
            &config.api.base_url,
            Duration::from_secs(config.api.timeout_secs),
            signer,
        )
    }

    /// Create a client against `base_url` with an existing signer.
    pub fn new(base_url: &str, timeout: Duration, signer: TokenSigner) -> Result<Self, ApiError> {
        // A bad key fails here instead of on the first request
        signer.token()?;

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Request {
                method: "INIT".to_string(),
                path: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let url = self.url_for(path);
        log::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(self.signer.token()?);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|source| ApiError::Request {
            method: method.to_string(),
            path: path.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ApiError::Request {
            method: method.to_string(),
            path: path.to_string(),
            source,
        })?;
        log::debug!("{} {} -> {}", method, path, status);

        if !status.is_success() {
            let errors = serde_json::from_str::<ErrorResponse>(&text)
                .map(|body| body.errors)
                .unwrap_or_default();
            if errors.is_empty() && !text.is_empty() {
                log::debug!("Error body: {}", text);
            }
            return Err(ApiError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                errors,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

impl ConnectApi for AppStoreClient {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None).await.map(|_| ())
    }

    async fn upload(&self, operation: &UploadOperation, data: Bytes) -> Result<(), ApiError> {
        let method = Method::from_bytes(operation.method.as_bytes()).unwrap_or(Method::PUT);

        // Upload URLs are pre-signed; they must not carry the API token
        let mut request = self.http.request(method.clone(), &operation.url).body(data);
        for header in &operation.request_headers {
            request = request.header(header.name.as_str(), header.value.as_str());
        }

        let response = request.send().await.map_err(|source| ApiError::Request {
            method: method.to_string(),
            path: operation.url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                method: method.to_string(),
                path: operation.url.clone(),
                status: status.as_u16(),
                errors: Vec::new(),
            });
        }

        log::debug!(
            "Uploaded {} bytes at offset {}",
            operation.length,
            operation.offset
        );
        Ok(())
    }
}
