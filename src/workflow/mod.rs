//! Deployment workflow.
//!
//! The pipeline is linear: register bundle id → resolve app → metadata →
//! version → build/upload → wait for processing → attach → submit. Each step
//! lives in its own module as plain functions over [`ConnectApi`]; the
//! [`Deployer`] strings them together, talks to the operator and decides
//! where a run stops.
//!
//! [`ConnectApi`]: crate::api::ConnectApi

mod bundle;
mod deployer;
mod metadata;
mod poll;
mod screenshots;
mod version;

pub use bundle::{find_app_id, register_bundle_id};
pub use deployer::{BuildStatus, Deployer, Outcome};
pub use metadata::upload_metadata;
pub use poll::{PollOutcome, RetryPolicy, Sleeper, TokioSleeper, poll_until};
pub use screenshots::{ScreenshotReport, collect_screenshots, upload_screenshots};
pub use version::{
    EditableVersion, attach_build, attached_build, create_version, find_editable_version,
    latest_processed_build, submit_for_review, update_version_localization,
};

use crate::error::CliError;

/// Where a run starts and stops, as selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Every step; `release` is prompted for when absent
    Full { release: Option<ReleaseNumbers> },
    /// Stop after resolving the app id
    SetupOnly,
    /// Stop after uploading metadata
    MetadataOnly,
    /// Upload screenshots to the editable version and make sure a build is attached
    Screenshots,
    /// Poll for the latest build and attach it to the editable version,
    /// without uploading metadata
    AttachBuild,
}

/// Marketing version and build number of one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNumbers {
    version: String,
    build_number: String,
}

impl ReleaseNumbers {
    /// Validate and wrap a version string ("1.0.0") and build number ("5").
    ///
    /// Both must be one to three period-separated integers.
    pub fn new(version: &str, build_number: &str) -> Result<Self, CliError> {
        let version = version.trim();
        let build_number = build_number.trim();

        if !is_dotted_number(version) {
            return Err(CliError::InvalidArguments {
                reason: format!("version '{version}' must look like 1.0 or 1.0.0"),
            });
        }
        if !is_dotted_number(build_number) {
            return Err(CliError::InvalidArguments {
                reason: format!("build number '{build_number}' must look like 5 or 5.1"),
            });
        }

        Ok(Self {
            version: version.to_string(),
            build_number: build_number.to_string(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn build_number(&self) -> &str {
        &self.build_number
    }
}

fn is_dotted_number(value: &str) -> bool {
    let segments: Vec<&str> = value.split('.').collect();
    (1..=3).contains(&segments.len())
        && segments
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
}
