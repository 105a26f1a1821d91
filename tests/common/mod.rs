//! Shared doubles for deployment workflow tests

#![allow(dead_code)]

use bytes::Bytes;
use kodegen_bundler_appstore::api::model::ErrorDetail;
use kodegen_bundler_appstore::api::{ApiError, ConnectApi, UploadOperation};
use kodegen_bundler_appstore::build::BuildRunner;
use kodegen_bundler_appstore::cli::{OutputManager, RuntimeConfig};
use kodegen_bundler_appstore::config::DeployConfig;
use kodegen_bundler_appstore::workflow::{ReleaseNumbers, Sleeper};
use kodegen_bundler_appstore::{CliError, DeployError};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const BUNDLE_ID: &str = "com.example.controlla";

pub const CONFIG: &str = r#"
[app]
bundle_id = "com.example.controlla"
name = "Controlla"
sku = "controlla"
team_id = "TEAM123456"

[credentials]
key_id = "KEY123"
issuer_id = "issuer-uuid"
key_file = "AuthKey_KEY123.p8"

[build]
scheme = "Controlla"
"#;

pub fn config() -> DeployConfig {
    toml::from_str(CONFIG).expect("test config parses")
}

pub fn quiet() -> RuntimeConfig {
    RuntimeConfig::new(OutputManager::new(false, true))
}

/// One recorded request
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

enum Reply {
    Json(Value),
    Status(u16),
}

/// Scripted App Store Connect.
///
/// Replies are keyed by method and exact path. Several replies for the same
/// key are served in order; the last one repeats.
#[derive(Default)]
pub struct FakeApi {
    replies: Mutex<HashMap<(String, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, method: &str, path: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn on(self, method: &str, path: &str, document: Value) -> Self {
        self.push(method, path, Reply::Json(document))
    }

    pub fn fail(self, method: &str, path: &str, status: u16) -> Self {
        self.push(method, path, Reply::Status(status))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    pub fn any_path_starting_with(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.path.starts_with(prefix))
    }

    pub fn body_of(&self, method: &str, path: &str) -> Option<Value> {
        self.calls()
            .into_iter()
            .find(|call| call.method == method && call.path == path)
            .and_then(|call| call.body)
    }

    fn respond(&self, method: &'static str, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body,
        });

        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(&(method.to_string(), path.to_string()));
        let reply = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().map(|reply| match reply {
                Reply::Json(value) => Reply::Json(value.clone()),
                Reply::Status(status) => Reply::Status(*status),
            }),
            None => None,
        };

        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Status(status)) => Err(ApiError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status,
                errors: vec![ErrorDetail {
                    status: Some(status.to_string()),
                    code: Some("SCRIPTED_FAILURE".to_string()),
                    ..Default::default()
                }],
            }),
            None => Err(ApiError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: 599,
                errors: vec![ErrorDetail {
                    detail: Some(format!("no scripted reply for {method} {path}")),
                    ..Default::default()
                }],
            }),
        }
    }
}

impl ConnectApi for FakeApi {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.respond("GET", path, None)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.respond("POST", path, Some(body))
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.respond("PATCH", path, Some(body))
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.respond("DELETE", path, None).map(|_| ())
    }

    async fn upload(&self, operation: &UploadOperation, data: Bytes) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(Call {
            method: "UPLOAD",
            path: operation.url.clone(),
            body: Some(json!({
                "offset": operation.offset,
                "length": data.len(),
                "data": String::from_utf8_lossy(&data),
            })),
        });
        Ok(())
    }
}

/// Records the releases it was asked to build.
#[derive(Default)]
pub struct FakeBuilder {
    pub fail: bool,
    built: Mutex<Vec<ReleaseNumbers>>,
}

impl FakeBuilder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn built(&self) -> Vec<ReleaseNumbers> {
        self.built.lock().unwrap().clone()
    }
}

impl BuildRunner for FakeBuilder {
    async fn build_and_upload(&self, release: &ReleaseNumbers) -> Result<(), DeployError> {
        self.built.lock().unwrap().push(release.clone());
        if self.fail {
            return Err(CliError::ExecutionFailed {
                command: "xcodebuild archive".to_string(),
                reason: "exit code 65".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Records sleeps instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Collection document of `kind` resources
pub fn list(kind: &str, items: &[(&str, Value)]) -> Value {
    let data: Vec<Value> = items
        .iter()
        .map(|(id, attributes)| json!({ "type": kind, "id": id, "attributes": attributes }))
        .collect();
    json!({ "data": data })
}

/// Single-resource document
pub fn single(kind: &str, id: &str, attributes: Value) -> Value {
    json!({ "data": { "type": kind, "id": id, "attributes": attributes } })
}

pub fn empty_list() -> Value {
    json!({ "data": [] })
}

pub fn build(version: &str, state: &str) -> Value {
    json!({
        "version": version,
        "uploadedDate": "2025-03-01T10:15:00-08:00",
        "processingState": state
    })
}

/// Replies for bundle registration and app lookup with everything present
pub fn with_registered_app(api: FakeApi) -> FakeApi {
    api.on(
        "GET",
        &format!("bundleIds?filter[identifier]={BUNDLE_ID}"),
        list(
            "bundleIds",
            &[("bid-1", json!({ "identifier": BUNDLE_ID, "name": "Controlla", "platform": "IOS" }))],
        ),
    )
    .on(
        "GET",
        &format!("apps?filter[bundleId]={BUNDLE_ID}"),
        list("apps", &[("app-1", json!({ "bundleId": BUNDLE_ID, "name": "Controlla" }))]),
    )
}

/// Replies for a metadata upload against an existing en-US localization
pub fn with_metadata(api: FakeApi) -> FakeApi {
    api.on(
        "GET",
        "apps/app-1/appInfos",
        list("appInfos", &[("info-1", json!({ "state": "PREPARE_FOR_SUBMISSION" }))]),
    )
    .on(
        "GET",
        "appInfos/info-1/appInfoLocalizations",
        list("appInfoLocalizations", &[("aloc-1", json!({ "locale": "en-US" }))]),
    )
    .on(
        "PATCH",
        "appInfoLocalizations/aloc-1",
        single("appInfoLocalizations", "aloc-1", json!({ "locale": "en-US" })),
    )
}

pub const VERSION_1_0_0: &str =
    "apps/app-1/appStoreVersions?filter[versionString]=1.0.0&filter[platform]=IOS";
pub const EDITABLE_VERSIONS: &str =
    "apps/app-1/appStoreVersions?filter[appStoreState]=PREPARE_FOR_SUBMISSION&filter[platform]=IOS";
pub const LATEST_BUILD: &str = "builds?filter[app]=app-1&sort=-uploadedDate&limit=1";
pub const OPEN_SUBMISSIONS: &str =
    "reviewSubmissions?filter[app]=app-1&filter[platform]=IOS&filter[state]=READY_FOR_REVIEW";

/// Replies for creating version 1.0.0 from scratch
pub fn with_new_version(api: FakeApi) -> FakeApi {
    api.on("GET", VERSION_1_0_0, empty_list())
        .on("GET", EDITABLE_VERSIONS, empty_list())
        .on(
            "POST",
            "appStoreVersions",
            single(
                "appStoreVersions",
                "ver-1",
                json!({ "versionString": "1.0.0", "platform": "IOS", "appStoreState": "PREPARE_FOR_SUBMISSION" }),
            ),
        )
}

/// Replies for attaching and submitting
pub fn with_attach_and_submit(api: FakeApi, version_id: &str) -> FakeApi {
    api.on(
        "PATCH",
        &format!("appStoreVersions/{version_id}/relationships/build"),
        Value::Null,
    )
    .on("GET", OPEN_SUBMISSIONS, empty_list())
    .on(
        "POST",
        "reviewSubmissions",
        single("reviewSubmissions", "rs-1", json!({ "platform": "IOS", "state": "READY_FOR_REVIEW" })),
    )
    .on(
        "POST",
        "reviewSubmissionItems",
        single("reviewSubmissionItems", "item-1", json!({})),
    )
    .on(
        "PATCH",
        "reviewSubmissions/rs-1",
        single("reviewSubmissions", "rs-1", json!({ "platform": "IOS", "state": "WAITING_FOR_REVIEW" })),
    )
}
