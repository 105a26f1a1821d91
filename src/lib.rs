//! App Store Connect deployment library
//!
//! Drives an Apple application from source to App Review:
//! - Bundle identifier registration and app lookup
//! - Store metadata and screenshot upload
//! - Version creation, Xcode archive/export/upload
//! - Waiting for build processing, attaching the build, review submission
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod api;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod workflow;

// Re-export commonly used types
pub use error::{CliError, DeployError, Result};
