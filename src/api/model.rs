//! Typed views of App Store Connect JSON:API documents.
//!
//! Only the attributes the workflow reads are modelled; everything else in
//! the payload is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Top-level document: `{ "data": ..., "included": [...] }`
#[derive(Debug, Clone, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default)]
    pub included: Vec<Resource<Value>>,
}

/// Collection document
pub type ListDocument<A> = Document<Vec<Resource<A>>>;

/// Single-resource document
pub type ResourceDocument<A> = Document<Resource<A>>;

/// One resource object
#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Option<A>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleIdAttributes {
    pub identifier: String,
    pub name: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAttributes {
    pub bundle_id: String,
    pub name: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfoAttributes {
    /// Lifecycle state (`PREPARE_FOR_SUBMISSION`, `READY_FOR_DISTRIBUTION`, ...)
    pub state: Option<String>,
    /// Older spelling of `state`, still returned alongside it
    pub app_store_state: Option<String>,
}

impl AppInfoAttributes {
    /// Whether the store listing behind this app info can still be edited
    pub fn is_editable(&self) -> bool {
        let state = self.state.as_deref().or(self.app_store_state.as_deref());
        !matches!(
            state,
            Some("READY_FOR_DISTRIBUTION") | Some("READY_FOR_SALE") | Some("REPLACED_WITH_NEW_INFO")
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationAttributes {
    pub locale: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStoreVersionAttributes {
    pub version_string: String,
    pub platform: Option<String>,
    pub app_store_state: Option<String>,
}

impl AppStoreVersionAttributes {
    /// Whether the version still accepts metadata and a build.
    ///
    /// A missing state is treated as editable.
    pub fn is_editable(&self) -> bool {
        matches!(
            self.app_store_state.as_deref(),
            None | Some(
                "PREPARE_FOR_SUBMISSION"
                    | "DEVELOPER_REJECTED"
                    | "REJECTED"
                    | "METADATA_REJECTED"
                    | "INVALID_BINARY"
            )
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAttributes {
    /// Build number (CFBundleVersion)
    pub version: String,
    pub uploaded_date: Option<DateTime<Utc>>,
    pub processing_state: Option<String>,
}

impl BuildAttributes {
    /// Processing finished and the build can be attached to a version
    pub fn is_processed(&self) -> bool {
        self.processing_state.as_deref() == Some("VALID")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmissionAttributes {
    pub platform: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotSetAttributes {
    pub screenshot_display_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotAttributes {
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    #[serde(default)]
    pub upload_operations: Option<Vec<UploadOperation>>,
    pub asset_delivery_state: Option<AssetDeliveryState>,
}

impl ScreenshotAttributes {
    /// The file was received and committed; a reservation still waiting for
    /// its bytes or its commit is not.
    pub fn is_complete(&self) -> bool {
        self.asset_delivery_state
            .as_ref()
            .is_some_and(|delivery| matches!(delivery.state.as_str(), "COMPLETE" | "UPLOAD_COMPLETE"))
    }
}

/// `assetDeliveryState` of an uploaded asset
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDeliveryState {
    /// `AWAITING_UPLOAD`, `UPLOAD_COMPLETE`, `COMPLETE` or `FAILED`
    pub state: String,
}

/// One byte range App Store Connect asks the client to send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOperation {
    pub method: String,
    pub url: String,
    pub length: u64,
    pub offset: u64,
    #[serde(default)]
    pub request_headers: Vec<HttpHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

/// Error body: `{ "errors": [...] }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

/// One entry of an error response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    pub status: Option<String>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub detail: Option<String>,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code.as_deref().unwrap_or("UNKNOWN");
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => write!(f, "[{code}] {title} {detail}"),
            (Some(text), None) | (None, Some(text)) => write!(f, "[{code}] {text}"),
            (None, None) => write!(f, "[{code}]"),
        }
    }
}
