//! Deployment orchestration.
//!
//! [`Deployer`] runs the pipeline for one [`Mode`], stopping at the first
//! failed step. Every collaborator is injected so a run can be replayed in
//! tests without the network, Xcode, a terminal or a real clock.

use std::future::Future;

use super::poll::{PollOutcome, Sleeper, poll_until};
use super::{Mode, ReleaseNumbers, bundle, metadata, screenshots, version};
use crate::api::ConnectApi;
use crate::build::BuildRunner;
use crate::cli::{Prompter, RuntimeConfig};
use crate::config::DeployConfig;
use crate::error::{DeployError, Result};

/// What happened to the build after upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// The operator chose not to wait for processing
    NotAwaited,
    /// Processing did not finish within the poll policy
    Pending { attempts: u32 },
    /// The build was attached to the version
    Attached {
        build_id: String,
        /// Review submission id when the version was submitted
        submission_id: Option<String>,
    },
}

/// Where a successful run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SetupComplete {
        app_id: String,
    },
    MetadataUploaded {
        app_id: String,
    },
    ScreenshotsUploaded {
        version_id: String,
        report: super::ScreenshotReport,
        /// Build attached during this run or earlier, if any
        build_id: Option<String>,
    },
    BuildAttachment {
        version_id: String,
        build: BuildStatus,
    },
    Released {
        app_id: String,
        version_id: String,
        release: ReleaseNumbers,
        build: BuildStatus,
    },
}

/// Runs the deployment pipeline.
pub struct Deployer<A, B, P, S> {
    config: DeployConfig,
    api: A,
    builder: B,
    prompter: P,
    sleeper: S,
    runtime_config: RuntimeConfig,
}

impl<A, B, P, S> Deployer<A, B, P, S>
where
    A: ConnectApi,
    B: BuildRunner,
    P: Prompter,
    S: Sleeper,
{
    pub fn new(
        config: DeployConfig,
        api: A,
        builder: B,
        prompter: P,
        sleeper: S,
        runtime_config: RuntimeConfig,
    ) -> Self {
        Self {
            config,
            api,
            builder,
            prompter,
            sleeper,
            runtime_config,
        }
    }

    /// The API client, for inspection after a run
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run one step, tagging any failure with the step name.
    async fn step<T, E, F>(&self, name: &'static str, work: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<DeployError>,
    {
        self.runtime_config.progress(&format!("{name}..."))?;
        work.await.map_err(|e| e.into().at_step(name))
    }

    /// Execute the pipeline for `mode`.
    pub async fn run(&self, mode: Mode) -> Result<Outcome> {
        self.runtime_config.section(&format!(
            "{} - App Store Deployment",
            self.config.app.name
        ))?;

        let bundle_resource = self
            .step(
                "Register bundle ID",
                bundle::register_bundle_id(&self.api, &self.config.app),
            )
            .await?;
        self.runtime_config.success(&format!(
            "Bundle ID {} ({bundle_resource})",
            self.config.app.bundle_id
        ))?;

        let app_id = self
            .step("Resolve app", async {
                bundle::find_app_id(&self.api, &self.config.app.bundle_id)
                    .await?
                    .ok_or_else(|| DeployError::AppMissing {
                        bundle_id: self.config.app.bundle_id.clone(),
                    })
            })
            .await?;
        self.runtime_config.success(&format!("App found ({app_id})"))?;

        match mode {
            Mode::SetupOnly => {
                self.runtime_config.success("Setup complete!")?;
                Ok(Outcome::SetupComplete { app_id })
            }
            // The build attaches to an existing version; the listing is left alone
            Mode::AttachBuild => self.attach_latest(&app_id).await,
            Mode::MetadataOnly => {
                self.upload_metadata(&app_id).await?;
                Ok(Outcome::MetadataUploaded { app_id })
            }
            Mode::Screenshots => {
                self.upload_metadata(&app_id).await?;
                self.screenshots(&app_id).await
            }
            Mode::Full { release } => {
                self.upload_metadata(&app_id).await?;
                self.release(app_id, release).await
            }
        }
    }

    async fn upload_metadata(&self, app_id: &str) -> Result<()> {
        self.step(
            "Upload metadata",
            metadata::upload_metadata(&self.api, app_id, &self.config),
        )
        .await?;
        self.runtime_config.success("Metadata uploaded")?;
        Ok(())
    }

    async fn release(&self, app_id: String, release: Option<ReleaseNumbers>) -> Result<Outcome> {
        let release = match release {
            Some(release) => release,
            None => self.ask_release().await?,
        };
        let platform = self.config.app.platform;

        let version_id = self
            .step("Create version", async {
                let id =
                    version::create_version(&self.api, &app_id, platform, release.version()).await?;
                version::update_version_localization(&self.api, &id, &self.config.metadata)
                    .await?;
                Ok::<_, DeployError>(id)
            })
            .await?;
        self.runtime_config.success(&format!(
            "Version {} ready ({version_id})",
            release.version()
        ))?;

        self.runtime_config.section("Building and Uploading")?;
        self.step("Build and upload", self.builder.build_and_upload(&release))
            .await?;

        let build = self
            .await_and_attach(&app_id, &version_id, Some(release.build_number()))
            .await?;
        self.print_summary(&build)?;

        Ok(Outcome::Released {
            app_id,
            version_id,
            release,
            build,
        })
    }

    async fn ask_release(&self) -> Result<ReleaseNumbers> {
        self.runtime_config.blank()?;
        let version = self.prompter.ask("Version number (e.g., 1.0.0): ").await?;
        let build_number = self.prompter.ask("Build number (e.g., 1): ").await?;
        Ok(ReleaseNumbers::new(&version, &build_number)?)
    }

    /// Wait for processing, attach, and offer review submission.
    async fn await_and_attach(
        &self,
        app_id: &str,
        version_id: &str,
        build_number: Option<&str>,
    ) -> Result<BuildStatus> {
        let policy = self.config.poll.retry_policy();

        self.runtime_config.blank()?;
        self.runtime_config
            .progress("Waiting for build to finish processing...")?;
        self.runtime_config.indent(&format!(
            "This can take up to {} minutes",
            policy.ceiling().as_secs().div_ceil(60)
        ))?;
        self.runtime_config
            .indent("Resume later with: kodegen_bundler_appstore --attach-build")?;

        if !self.prompter.confirm("Wait and attach build now?").await? {
            return Ok(BuildStatus::NotAwaited);
        }

        let outcome = poll_until(
            policy,
            &self.sleeper,
            |attempt, policy| {
                if let Err(e) = self.runtime_config.indent(&format!(
                    "Checking again in {}s... ({attempt}/{})",
                    policy.delay.as_secs(),
                    policy.max_attempts
                )) {
                    log::debug!("Failed to write poll progress: {}", e);
                }
            },
            |_| version::latest_processed_build(&self.api, app_id, build_number),
        )
        .await;

        let build_id = match outcome {
            PollOutcome::Found { value, .. } => value,
            PollOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                self.runtime_config.warn(&format!(
                    "Build not processed after {attempts} checks; attach it later with --attach-build"
                ))?;
                if let Some(error) = last_error {
                    self.runtime_config.indent(&format!("Last error: {error}"))?;
                }
                return Ok(BuildStatus::Pending { attempts });
            }
        };

        self.step(
            "Attach build",
            version::attach_build(&self.api, version_id, &build_id),
        )
        .await?;
        self.runtime_config
            .success(&format!("Build {build_id} attached"))?;

        let submission_id = if self.prompter.confirm("Submit for review?").await? {
            let id = self
                .step(
                    "Submit for review",
                    version::submit_for_review(
                        &self.api,
                        app_id,
                        version_id,
                        self.config.app.platform,
                    ),
                )
                .await?;
            self.runtime_config.success("Submitted for review")?;
            Some(id)
        } else {
            None
        };

        Ok(BuildStatus::Attached {
            build_id,
            submission_id,
        })
    }

    async fn editable_version(&self, app_id: &str) -> Result<version::EditableVersion> {
        let platform = self.config.app.platform;
        self.step("Find editable version", async {
            version::find_editable_version(&self.api, app_id, platform)
                .await?
                .ok_or_else(|| DeployError::NoEditableVersion {
                    platform: platform.to_string(),
                })
        })
        .await
    }

    async fn attach_latest(&self, app_id: &str) -> Result<Outcome> {
        let editable = self.editable_version(app_id).await?;
        self.runtime_config.success(&format!(
            "Version {} ({})",
            editable.version_string, editable.id
        ))?;

        let build = self.await_and_attach(app_id, &editable.id, None).await?;
        self.print_summary(&build)?;

        Ok(Outcome::BuildAttachment {
            version_id: editable.id,
            build,
        })
    }

    async fn screenshots(&self, app_id: &str) -> Result<Outcome> {
        let editable = self.editable_version(app_id).await?;
        self.runtime_config.progress(&format!(
            "Uploading screenshots for {} version {}",
            self.config.app.platform, editable.version_string
        ))?;

        let report = self
            .step(
                "Upload screenshots",
                screenshots::upload_screenshots(
                    &self.api,
                    &editable.id,
                    self.config.screenshot_locale(),
                    &self.config.screenshots.directory,
                ),
            )
            .await?;
        self.runtime_config.success(&format!(
            "{} screenshots uploaded, {} already present",
            report.uploaded, report.skipped
        ))?;

        let attached = self
            .step(
                "Check attached build",
                version::attached_build(&self.api, &editable.id),
            )
            .await?;

        let build_id = match attached {
            Some(build_id) => {
                self.runtime_config.success("Build already attached")?;
                Some(build_id)
            }
            None => {
                self.runtime_config.warn("No build attached to version")?;
                let latest = self
                    .step(
                        "Find latest build",
                        version::latest_processed_build(&self.api, app_id, None),
                    )
                    .await?;
                match latest {
                    Some(build_id) => {
                        self.step(
                            "Attach build",
                            version::attach_build(&self.api, &editable.id, &build_id),
                        )
                        .await?;
                        self.runtime_config
                            .success(&format!("Build {build_id} attached"))?;
                        Some(build_id)
                    }
                    None => {
                        self.runtime_config.warn("No processed build available yet")?;
                        None
                    }
                }
            }
        };

        self.runtime_config.blank()?;
        self.runtime_config
            .progress("Next steps (manual in App Store Connect):")?;
        for line in [
            "1. Configure App Privacy",
            "2. Set Age Rating",
            "3. Add App Review Information (contact info + notes)",
            "4. Submit for review",
        ] {
            self.runtime_config.indent(line)?;
        }

        Ok(Outcome::ScreenshotsUploaded {
            version_id: editable.id,
            report,
            build_id,
        })
    }

    fn print_summary(&self, build: &BuildStatus) -> Result<()> {
        self.runtime_config.section("Deployment Complete!")?;
        match build {
            BuildStatus::Attached {
                submission_id: Some(_),
                ..
            } => {
                self.runtime_config
                    .indent("The version is waiting for App Review")?;
            }
            BuildStatus::Attached {
                submission_id: None,
                ..
            } => {
                self.runtime_config.indent("Next steps:")?;
                self.runtime_config.indent("  1. Add screenshots (--screenshots)")?;
                self.runtime_config.indent("  2. Submit for review when ready")?;
            }
            BuildStatus::NotAwaited | BuildStatus::Pending { .. } => {
                self.runtime_config.indent("Next steps:")?;
                self.runtime_config
                    .indent("  1. Check App Store Connect for build processing status")?;
                self.runtime_config
                    .indent("  2. Attach the build with --attach-build")?;
                self.runtime_config.indent("  3. Submit for review when ready")?;
            }
        }
        self.runtime_config.blank()?;
        Ok(())
    }
}
