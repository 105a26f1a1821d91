//! Error types for deployment operations.
//!
//! Every failure carries enough context to tell the operator which step
//! stopped the run and what App Store Connect said about it.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

/// Result type alias for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// Main error type for all deployment operations
#[derive(Error, Debug)]
pub enum DeployError {
    /// CLI argument and subprocess errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// App Store Connect API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A pipeline step failed and the remaining steps were skipped
    #[error("{step} failed: {source}")]
    Step {
        /// Human-readable step name
        step: &'static str,
        /// Underlying failure
        #[source]
        source: Box<DeployError>,
    },

    /// The app record has not been created in App Store Connect yet
    #[error("No app found for bundle identifier {bundle_id}")]
    AppMissing {
        /// Bundle identifier that was searched for
        bundle_id: String,
    },

    /// No version in PREPARE_FOR_SUBMISSION for the platform
    #[error("No {platform} version in PREPARE_FOR_SUBMISSION state found")]
    NoEditableVersion {
        /// App Store Connect platform name
        platform: String,
    },

    /// A version with the requested number exists but can no longer be edited
    #[error("Version {version} already exists in state {state} and cannot be edited")]
    VersionLocked {
        /// Requested version string
        version: String,
        /// Current App Store state of that version
        state: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments or operator input
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Required external tool is not installed
    #[error("Required tool not found: {tool}")]
    ToolNotFound {
        /// Tool name as looked up on PATH
        tool: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

impl DeployError {
    /// Wrap this error with the name of the pipeline step that produced it.
    pub fn at_step(self, step: &'static str) -> Self {
        match self {
            // Keep the innermost step name
            already @ DeployError::Step { .. } => already,
            other => DeployError::Step {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Name of the step that failed, if the error came from the pipeline
    pub fn step(&self) -> Option<&'static str> {
        match self {
            DeployError::Step { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Actionable suggestions for the operator
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DeployError::Step { source, .. } => source.recovery_suggestions(),
            DeployError::AppMissing { .. } => vec![
                "Create the app in App Store Connect, then run this again".to_string(),
            ],
            DeployError::NoEditableVersion { .. } => vec![
                "Run a full deployment first so a version record exists".to_string(),
            ],
            DeployError::VersionLocked { .. } => vec![
                "Pick a version number that has not been released or submitted".to_string(),
            ],
            DeployError::Config(_) => {
                vec!["Check deploy.toml or pass --config with the right path".to_string()]
            }
            DeployError::Api(ApiError::Credentials { .. }) => vec![
                "Check the API key id, issuer id and .p8 key file".to_string(),
            ],
            DeployError::Cli(CliError::ToolNotFound { .. }) => {
                vec!["Install Xcode and its command line tools".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_step_keeps_innermost_step() {
        let err = DeployError::AppMissing {
            bundle_id: "com.example.app".to_string(),
        }
        .at_step("Resolve app")
        .at_step("Outer");

        assert_eq!(err.step(), Some("Resolve app"));
        assert!(err.to_string().starts_with("Resolve app failed"));
    }

    #[test]
    fn step_suggestions_come_from_the_cause() {
        let err = DeployError::AppMissing {
            bundle_id: "com.example.app".to_string(),
        }
        .at_step("Resolve app");

        assert_eq!(
            err.recovery_suggestions(),
            vec!["Create the app in App Store Connect, then run this again".to_string()]
        );
    }
}
