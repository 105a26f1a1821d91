//! Archive, export and upload with Xcode command line tools.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{BuildRunner, require_tool};
use crate::cli::RuntimeConfig;
use crate::config::{BuildSettings, DeployConfig, Platform};
use crate::error::{CliError, DeployError, Result};
use crate::workflow::ReleaseNumbers;

/// Stderr lines kept for the failure report
const STDERR_TAIL: usize = 20;

/// Runs `xcodebuild archive`, `xcodebuild -exportArchive` and
/// `xcrun altool --upload-app` in sequence.
#[derive(Debug, Clone)]
pub struct XcodeBuildRunner {
    settings: BuildSettings,
    platform: Platform,
    package_name: String,
    key_id: String,
    issuer_id: String,
    key_file: PathBuf,
    runtime_config: RuntimeConfig,
}

impl XcodeBuildRunner {
    pub fn new(config: &DeployConfig, runtime_config: RuntimeConfig) -> Self {
        Self {
            settings: config.build.clone(),
            platform: config.app.platform,
            package_name: config.package_name(),
            key_id: config.credentials.key_id.clone(),
            issuer_id: config.credentials.issuer_id.clone(),
            key_file: config.credentials.key_file.clone(),
            runtime_config,
        }
    }

    /// Arguments for `xcodebuild archive`
    pub fn archive_args(&self, release: &ReleaseNumbers) -> Vec<String> {
        let mut args = vec!["-scheme".to_string(), self.settings.scheme.clone()];

        if let Some(workspace) = &self.settings.workspace {
            args.push("-workspace".to_string());
            args.push(workspace.display().to_string());
        } else if let Some(project) = &self.settings.project {
            args.push("-project".to_string());
            args.push(project.display().to_string());
        }

        args.extend([
            "-configuration".to_string(),
            self.settings.configuration.clone(),
            "-archivePath".to_string(),
            self.settings.archive_path.display().to_string(),
            "archive".to_string(),
            format!("MARKETING_VERSION={}", release.version()),
            format!("CURRENT_PROJECT_VERSION={}", release.build_number()),
        ]);
        args
    }

    /// Arguments for `xcodebuild -exportArchive`
    pub fn export_args(&self) -> Vec<String> {
        vec![
            "-exportArchive".to_string(),
            "-archivePath".to_string(),
            self.settings.archive_path.display().to_string(),
            "-exportPath".to_string(),
            self.settings.export_path.display().to_string(),
            "-exportOptionsPlist".to_string(),
            self.settings.export_options.display().to_string(),
        ]
    }

    /// Arguments for `xcrun altool --upload-app`
    pub fn upload_args(&self) -> Vec<String> {
        vec![
            "altool".to_string(),
            "--upload-app".to_string(),
            "-f".to_string(),
            self.package_path().display().to_string(),
            "-t".to_string(),
            self.platform.altool_type().to_string(),
            "--apiKey".to_string(),
            self.key_id.clone(),
            "--apiIssuer".to_string(),
            self.issuer_id.clone(),
        ]
    }

    fn package_path(&self) -> PathBuf {
        self.settings.export_path.join(&self.package_name)
    }

    /// altool looks for `AuthKey_<id>.p8` in `API_PRIVATE_KEYS_DIR`
    fn private_keys_dir(&self) -> Option<&Path> {
        self.key_file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    async fn run_tool(&self, program: &Path, label: &str, args: Vec<String>) -> Result<()> {
        let command_line = format!("{label} {}", args.join(" "));
        log::info!("Running {}", command_line);
        self.runtime_config
            .verbose_println(&format!("   $ {command_line}"))?;

        let mut command = Command::new(program);
        command
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.private_keys_dir() {
            command.env("API_PRIVATE_KEYS_DIR", dir);
        }

        let mut child = command.spawn().map_err(|e| CliError::ExecutionFailed {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let runtime_config = &self.runtime_config;

        let run = async {
            let (_, stderr_tail, status) = tokio::join!(
                async {
                    if let Some(stdout) = stdout {
                        let mut lines = BufReader::new(stdout).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            log::debug!("{}: {}", label, line);
                            if let Err(e) = runtime_config.verbose_println(&format!("   {line}")) {
                                log::debug!("Failed to echo {} output: {}", label, e);
                            }
                        }
                    }
                },
                async {
                    let mut tail = Vec::new();
                    if let Some(stderr) = stderr {
                        let mut lines = BufReader::new(stderr).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            log::debug!("{}: {}", label, line);
                            tail.push(line);
                            if tail.len() > STDERR_TAIL {
                                tail.remove(0);
                            }
                        }
                    }
                    tail
                },
                child.wait()
            );
            (stderr_tail, status)
        };

        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let finished = tokio::time::timeout(timeout, run).await;
        let (stderr_tail, status) = match finished {
            Ok(finished) => finished,
            Err(_elapsed) => {
                if let Err(e) = self.runtime_config.warn(&format!(
                    "{label} timed out after {} minutes, terminating...",
                    timeout.as_secs() / 60
                )) {
                    log::debug!("Failed to write timeout warning: {}", e);
                }
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill {}: {}", label, e);
                }
                return Err(CliError::ExecutionFailed {
                    command: command_line,
                    reason: format!("timed out after {} seconds", timeout.as_secs()),
                }
                .into());
            }
        };

        let status = status.map_err(|e| CliError::ExecutionFailed {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(CliError::ExecutionFailed {
                command: command_line,
                reason: format!(
                    "exit code {}\n{}",
                    status.code().unwrap_or(-1),
                    stderr_tail.join("\n")
                ),
            }
            .into());
        }

        Ok(())
    }
}

impl BuildRunner for XcodeBuildRunner {
    async fn build_and_upload(&self, release: &ReleaseNumbers) -> Result<()> {
        if self.settings.scheme.is_empty() {
            return Err(DeployError::Cli(CliError::InvalidArguments {
                reason: "build.scheme is not set in the configuration".to_string(),
            }));
        }

        let xcodebuild = require_tool("xcodebuild")?;
        let xcrun = require_tool("xcrun")?;

        self.runtime_config.progress(&format!(
            "Archiving {} {} ({})",
            self.settings.scheme,
            release.version(),
            release.build_number()
        ))?;
        self.run_tool(&xcodebuild, "xcodebuild", self.archive_args(release))
            .await?;

        self.runtime_config.progress("Exporting archive")?;
        self.run_tool(&xcodebuild, "xcodebuild", self.export_args())
            .await?;

        let package = self.package_path();
        if !package.exists() {
            return Err(DeployError::Cli(CliError::ExecutionFailed {
                command: "xcodebuild -exportArchive".to_string(),
                reason: format!("expected package not found at {}", package.display()),
            }));
        }

        self.runtime_config
            .progress(&format!("Uploading {}", package.display()))?;
        self.run_tool(&xcrun, "xcrun", self.upload_args()).await?;

        self.runtime_config.success("Build uploaded")?;
        Ok(())
    }
}
