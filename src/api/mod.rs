//! App Store Connect API access.
//!
//! [`ConnectApi`] is the seam between the deployment workflow and the
//! network: [`AppStoreClient`] talks to Apple, tests substitute a scripted
//! double. Responses are handled as raw JSON documents and decoded into the
//! typed views in [`model`] by the workflow steps that need them.

mod auth;
mod client;
pub mod model;

pub use auth::TokenSigner;
pub use client::AppStoreClient;
pub use model::{ErrorDetail, UploadOperation};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

/// Errors raised while talking to App Store Connect
#[derive(Error, Debug)]
pub enum ApiError {
    /// The API key could not be loaded or a token could not be signed
    #[error("Invalid API credentials: {reason}")]
    Credentials {
        /// What went wrong
        reason: String,
    },

    /// The request never produced a response
    #[error("{method} {path} failed: {source}")]
    Request {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// App Store Connect answered with a non-2xx status
    #[error("{method} {path} returned HTTP {status}{}", describe_errors(.errors))]
    Status {
        method: String,
        path: String,
        status: u16,
        /// Entries of the `errors` array in the response body
        errors: Vec<ErrorDetail>,
    },

    /// The response body did not have the expected shape
    #[error("Unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response was well-formed but lacked a required value
    #[error("Response from {path} has no {field}")]
    MissingField { path: String, field: &'static str },
}

fn describe_errors(errors: &[ErrorDetail]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let details: Vec<String> = errors.iter().map(ErrorDetail::to_string).collect();
    format!(": {}", details.join("; "))
}

impl ApiError {
    /// HTTP status for [`ApiError::Status`]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Resource API operations the workflow needs.
///
/// Paths are relative to the API root (`bundleIds`, `apps/123/appInfos`, ...)
/// and may carry a query string.
pub trait ConnectApi: Send + Sync {
    /// `GET` a resource or collection document
    fn get(&self, path: &str) -> impl Future<Output = Result<Value, ApiError>> + Send;

    /// `POST` a new resource; returns the created document
    fn post(&self, path: &str, body: Value)
    -> impl Future<Output = Result<Value, ApiError>> + Send;

    /// `PATCH` a resource or relationship; returns the response document
    /// (`Value::Null` for empty bodies)
    fn patch(
        &self,
        path: &str,
        body: Value,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;

    /// `DELETE` a resource
    fn delete(&self, path: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Execute one asset upload operation with its byte range
    fn upload(
        &self,
        operation: &UploadOperation,
        data: Bytes,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl<T: ConnectApi> ConnectApi for &T {
    fn get(&self, path: &str) -> impl Future<Output = Result<Value, ApiError>> + Send {
        (**self).get(path)
    }

    fn post(&self, path: &str, body: Value) -> impl Future<Output = Result<Value, ApiError>> + Send {
        (**self).post(path, body)
    }

    fn patch(&self, path: &str, body: Value) -> impl Future<Output = Result<Value, ApiError>> + Send {
        (**self).patch(path, body)
    }

    fn delete(&self, path: &str) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).delete(path)
    }

    fn upload(
        &self,
        operation: &UploadOperation,
        data: Bytes,
    ) -> impl Future<Output = Result<(), ApiError>> + Send {
        (**self).upload(operation, data)
    }
}

/// Decode a JSON document fetched from `path` into `T`.
pub fn decode<T: DeserializeOwned>(path: &str, document: Value) -> Result<T, ApiError> {
    serde_json::from_value(document).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

/// `GET` `path` and decode the document into `T`.
pub async fn fetch<T, A>(api: &A, path: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    A: ConnectApi + ?Sized,
{
    let document = api.get(path).await?;
    decode(path, document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_lists_remote_details() {
        let err = ApiError::Status {
            method: "POST".to_string(),
            path: "appStoreVersions".to_string(),
            status: 409,
            errors: vec![ErrorDetail {
                status: Some("409".to_string()),
                code: Some("ENTITY_ERROR.ATTRIBUTE.INVALID".to_string()),
                title: Some("An attribute value is invalid.".to_string()),
                detail: Some("The version string has already been used.".to_string()),
            }],
        };

        let message = err.to_string();
        assert!(message.starts_with("POST appStoreVersions returned HTTP 409: "));
        assert!(message.contains("The version string has already been used."));
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn status_error_without_details() {
        let err = ApiError::Status {
            method: "GET".to_string(),
            path: "apps".to_string(),
            status: 500,
            errors: Vec::new(),
        };
        assert_eq!(err.to_string(), "GET apps returned HTTP 500");
    }
}
