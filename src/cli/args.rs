//! Command line argument parsing and validation.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::error::CliError;
use crate::workflow::{Mode, ReleaseNumbers};

/// App Store Connect deployment for Apple applications
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_appstore",
    version,
    about = "Deploy an Apple application through the App Store Connect API",
    long_about = "Registers the bundle identifier, uploads store metadata, creates the version,
archives and uploads the build, waits for processing, attaches the build and optionally
submits for review.

Usage:
  kodegen_bundler_appstore                      Full deployment (prompts for version)
  kodegen_bundler_appstore --setup              Bundle id + app check only
  kodegen_bundler_appstore --metadata           Upload metadata only
  kodegen_bundler_appstore --build 1.0.0 5      Full deployment with version 1.0.0 build 5
  kodegen_bundler_appstore --screenshots        Upload screenshots to the editable version
  kodegen_bundler_appstore --attach-build       Wait for the latest build and attach it

Exit code 0 = every requested step succeeded."
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["setup", "metadata", "build", "screenshots", "attach_build"])
        .multiple(false)
))]
pub struct Args {
    /// Stop after registering the bundle id and resolving the app
    #[arg(long)]
    pub setup: bool,

    /// Stop after uploading metadata
    #[arg(long)]
    pub metadata: bool,

    /// Version and build number to deploy, skipping the prompts
    #[arg(long, num_args = 2, value_names = ["VERSION", "BUILD_NUMBER"])]
    pub build: Option<Vec<String>>,

    /// Upload screenshots to the version awaiting submission
    #[arg(long)]
    pub screenshots: bool,

    /// Wait for the latest processed build and attach it to the editable version
    #[arg(long)]
    pub attach_build: bool,

    /// Answer yes to the attach and submit confirmations
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Deployment configuration file
    #[arg(short = 'c', long, env = "ASC_DEPLOY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// API key id (overrides credentials.key_id)
    #[arg(long, env = "ASC_KEY_ID")]
    pub key_id: Option<String>,

    /// API issuer id (overrides credentials.issuer_id)
    #[arg(long, env = "ASC_ISSUER_ID")]
    pub issuer_id: Option<String>,

    /// Path to the .p8 API key (overrides credentials.key_file)
    #[arg(long, env = "ASC_KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// Print extra progress detail
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Deployment mode selected by the flags.
    pub fn mode(&self) -> Result<Mode, CliError> {
        if self.setup {
            return Ok(Mode::SetupOnly);
        }
        if self.metadata {
            return Ok(Mode::MetadataOnly);
        }
        if self.screenshots {
            return Ok(Mode::Screenshots);
        }
        if self.attach_build {
            return Ok(Mode::AttachBuild);
        }

        let release = match self.build.as_deref() {
            Some([version, build_number]) => Some(ReleaseNumbers::new(version, build_number)?),
            Some(other) => {
                return Err(CliError::InvalidArguments {
                    reason: format!("--build takes VERSION BUILD_NUMBER, got {} values", other.len()),
                });
            }
            None => None,
        };

        Ok(Mode::Full { release })
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, false),
        }
    }
}

impl RuntimeConfig {
    /// Runtime configuration with an explicit output manager
    pub fn new(output: super::OutputManager) -> Self {
        Self { output }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print verbose message if in verbose mode
    pub fn verbose_println(&self, message: &str) -> std::io::Result<()> {
        self.output.verbose(message)
    }

    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    pub fn error(&self, message: &str) -> std::io::Result<()> {
        self.output.error(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }

    pub fn blank(&self) -> std::io::Result<()> {
        self.output.blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("kodegen_bundler_appstore").chain(argv.iter().copied()))
    }

    #[test]
    fn no_flags_is_full_with_prompts() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.mode().unwrap(), Mode::Full { release: None });
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn build_flag_takes_literal_values() {
        let args = parse(&["--build", "1.0.0", "5"]).unwrap();
        let mode = args.mode().unwrap();

        let Mode::Full { release: Some(release) } = mode else {
            panic!("expected full mode with release numbers, got {mode:?}");
        };
        assert_eq!(release.version(), "1.0.0");
        assert_eq!(release.build_number(), "5");
    }

    #[test]
    fn build_flag_needs_two_values() {
        assert!(parse(&["--build", "1.0.0"]).is_err());
    }

    #[test]
    fn modes_are_exclusive() {
        let err = parse(&["--setup", "--metadata"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn single_mode_flags() {
        assert_eq!(parse(&["--setup"]).unwrap().mode().unwrap(), Mode::SetupOnly);
        assert_eq!(parse(&["--metadata"]).unwrap().mode().unwrap(), Mode::MetadataOnly);
        assert_eq!(parse(&["--screenshots"]).unwrap().mode().unwrap(), Mode::Screenshots);
        assert_eq!(parse(&["--attach-build"]).unwrap().mode().unwrap(), Mode::AttachBuild);
    }

    #[test]
    fn invalid_build_version_is_rejected() {
        let args = parse(&["--build", "one", "5"]).unwrap();
        assert!(matches!(args.mode(), Err(CliError::InvalidArguments { .. })));
    }

    #[test]
    fn credential_flags_are_optional_overrides() {
        let args = parse(&["--key-id", "ABC", "--key-file", "AuthKey_ABC.p8", "-y"]).unwrap();
        assert_eq!(args.key_id.as_deref(), Some("ABC"));
        assert_eq!(args.key_file, Some(PathBuf::from("AuthKey_ABC.p8")));
        assert!(args.yes);
    }
}
