//! Native build, export and upload.
//!
//! The deployment treats the build as an opaque step behind [`BuildRunner`]:
//! given a version and build number, produce a binary and get it uploaded to
//! App Store Connect. [`XcodeBuildRunner`] does that with `xcodebuild` and
//! `xcrun altool`.

mod tool_detection;
mod xcode;

pub use tool_detection::require_tool;
pub use xcode::XcodeBuildRunner;

use std::future::Future;

use crate::error::Result;
use crate::workflow::ReleaseNumbers;

/// Produces and uploads a build for a release.
pub trait BuildRunner: Send + Sync {
    fn build_and_upload(&self, release: &ReleaseNumbers) -> impl Future<Output = Result<()>> + Send;
}

impl<T: BuildRunner> BuildRunner for &T {
    fn build_and_upload(&self, release: &ReleaseNumbers) -> impl Future<Output = Result<()>> + Send {
        (**self).build_and_upload(release)
    }
}
