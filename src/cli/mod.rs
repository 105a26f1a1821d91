//! Command line interface for App Store deployment.
//!
//! Parses arguments, loads configuration, wires the real collaborators into
//! a [`Deployer`] and runs the selected mode.

mod args;
mod output;
mod prompt;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;
pub use prompt::{ConsolePrompter, Prompter, ScriptedPrompter};

use crate::api::AppStoreClient;
use crate::build::XcodeBuildRunner;
use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::workflow::{Deployer, TokioSleeper};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    run_with(args).await
}

/// Run with already-parsed arguments.
pub async fn run_with(args: Args) -> Result<i32> {
    let runtime_config = RuntimeConfig::from(&args);
    let mode = args.mode()?;

    let mut config = DeployConfig::load(&args.config)?;
    config.apply_credential_overrides(args.key_id, args.issuer_id, args.key_file);
    config.validate()?;

    let api = AppStoreClient::from_config(&config)?;
    let builder = XcodeBuildRunner::new(&config, runtime_config.clone());
    let deployer = Deployer::new(
        config,
        api,
        builder,
        ConsolePrompter::new(args.yes),
        TokioSleeper,
        runtime_config.clone(),
    );

    let outcome = deployer.run(mode).await?;
    log::debug!("Deployment finished: {:?}", outcome);
    Ok(0)
}

/// Print an error and its recovery suggestions for the operator.
pub fn report_error(error: &DeployError) {
    let output = OutputManager::new(false, false);
    // Display already nests the causes
    if let Err(e) = output.error(&error.to_string()) {
        log::debug!("Failed to write error report: {}", e);
    }
    log::debug!("{:?}", error);

    for suggestion in error.recovery_suggestions() {
        eprintln!("   → {suggestion}");
    }
}
