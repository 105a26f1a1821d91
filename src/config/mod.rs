//! Deployment configuration loaded from `deploy.toml`.
//!
//! The file describes the app identity, the API credentials, the metadata to
//! push and how to drive the Xcode build. Everything except `[app]` has
//! defaults.
//!
//! ```toml
//! [app]
//! bundle_id = "com.example.controlla"
//! name = "Controlla"
//! sku = "controlla"
//! team_id = "ABCDE12345"
//!
//! [credentials]
//! key_id = "ABC123DEFG"
//! issuer_id = "00000000-0000-0000-0000-000000000000"
//! key_file = "deployment/AuthKey_ABC123DEFG.p8"
//!
//! [build]
//! scheme = "Controlla"
//! ```

mod platform;

pub use platform::Platform;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::workflow::RetryPolicy;

/// Default configuration file name, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "deploy.toml";

/// Default App Store Connect API root
pub const DEFAULT_BASE_URL: &str = "https://api.appstoreconnect.apple.com/v1";

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Configuration file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// Configuration file path
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// A field has an unusable value
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted field name, e.g. `app.bundle_id`
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Complete deployment configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct DeployConfig {
    /// App identity in App Store Connect.
    pub app: AppSettings,

    /// API key used to sign tokens.
    #[serde(default)]
    pub credentials: CredentialSettings,

    /// API endpoint settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Store listing metadata.
    #[serde(default)]
    pub metadata: MetadataSettings,

    /// Xcode archive/export/upload settings.
    #[serde(default)]
    pub build: BuildSettings,

    /// Screenshot upload settings.
    #[serde(default)]
    pub screenshots: ScreenshotSettings,

    /// Build processing poll policy.
    #[serde(default)]
    pub poll: PollSettings,
}

/// App identity.
#[derive(Clone, Debug, Deserialize)]
pub struct AppSettings {
    /// Reverse-DNS bundle identifier, e.g. "com.example.app".
    pub bundle_id: String,

    /// App name as shown in the store.
    pub name: String,

    /// Stock keeping unit chosen when the app record was created.
    #[serde(default)]
    pub sku: String,

    /// Developer team identifier.
    #[serde(default)]
    pub team_id: String,

    /// Target platform.
    ///
    /// Default: IOS
    #[serde(default)]
    pub platform: Platform,
}

/// API key credentials.
///
/// Usually left out of the file and supplied through `ASC_KEY_ID`,
/// `ASC_ISSUER_ID` and `ASC_KEY_FILE`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CredentialSettings {
    /// Key identifier shown next to the key in App Store Connect.
    #[serde(default)]
    pub key_id: String,

    /// Issuer identifier (UUID) of the team.
    #[serde(default)]
    pub issuer_id: String,

    /// Path to the downloaded `AuthKey_<KEY_ID>.p8` file.
    #[serde(default)]
    pub key_file: PathBuf,
}

/// API endpoint settings.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiSettings {
    /// API root including the version segment.
    ///
    /// Default: https://api.appstoreconnect.apple.com/v1
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    ///
    /// Default: 60
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Store listing metadata. Unset fields are left untouched remotely.
#[derive(Clone, Debug, Deserialize)]
pub struct MetadataSettings {
    /// Locale of the localization to edit.
    ///
    /// Default: "en-US"
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub privacy_policy_url: Option<String>,

    /// App category id, e.g. "UTILITIES" or "PRODUCTIVITY".
    #[serde(default)]
    pub primary_category: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Comma-separated search keywords (100 characters max remotely).
    #[serde(default)]
    pub keywords: Option<String>,

    #[serde(default)]
    pub promotional_text: Option<String>,

    #[serde(default)]
    pub support_url: Option<String>,

    #[serde(default)]
    pub marketing_url: Option<String>,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            subtitle: None,
            privacy_policy_url: None,
            primary_category: None,
            description: None,
            keywords: None,
            promotional_text: None,
            support_url: None,
            marketing_url: None,
        }
    }
}

impl MetadataSettings {
    /// Whether any version-level localized field is set
    pub fn has_version_fields(&self) -> bool {
        self.description.is_some()
            || self.keywords.is_some()
            || self.promotional_text.is_some()
            || self.support_url.is_some()
            || self.marketing_url.is_some()
    }
}

/// Xcode build settings.
#[derive(Clone, Debug, Deserialize)]
pub struct BuildSettings {
    /// Xcode scheme to archive.
    #[serde(default)]
    pub scheme: String,

    /// `.xcodeproj` to build. Mutually exclusive with `workspace`.
    #[serde(default)]
    pub project: Option<PathBuf>,

    /// `.xcworkspace` to build.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Default: "Release"
    #[serde(default = "default_configuration")]
    pub configuration: String,

    /// Default: "build/App.xcarchive"
    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,

    /// Default: "build"
    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,

    /// Name of the exported package inside `export_path`.
    ///
    /// Default: "<scheme>.ipa" (".pkg" for macOS)
    #[serde(default)]
    pub ipa_name: Option<String>,

    /// Default: "ExportOptions.plist"
    #[serde(default = "default_export_options")]
    pub export_options: PathBuf,

    /// Timeout for each xcodebuild/altool invocation in seconds.
    ///
    /// Default: 3600
    #[serde(default = "default_build_timeout")]
    pub timeout_secs: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            scheme: String::new(),
            project: None,
            workspace: None,
            configuration: default_configuration(),
            archive_path: default_archive_path(),
            export_path: default_export_path(),
            ipa_name: None,
            export_options: default_export_options(),
            timeout_secs: default_build_timeout(),
        }
    }
}

/// Screenshot upload settings.
#[derive(Clone, Debug, Deserialize)]
pub struct ScreenshotSettings {
    /// Root directory holding one sub-directory per display type.
    ///
    /// Default: "fastlane/screenshots"
    #[serde(default = "default_screenshot_dir")]
    pub directory: PathBuf,

    /// Localization to attach screenshots to. Falls back to `metadata.locale`.
    #[serde(default)]
    pub locale: Option<String>,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            directory: default_screenshot_dir(),
            locale: None,
        }
    }
}

/// Build processing poll policy.
#[derive(Clone, Debug, Deserialize)]
pub struct PollSettings {
    /// Default: 30
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,

    /// Default: 30
    #[serde(default = "default_poll_delay")]
    pub delay_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_poll_attempts(),
            delay_secs: default_poll_delay(),
        }
    }
}

impl PollSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_configuration() -> String {
    "Release".to_string()
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("build/App.xcarchive")
}

fn default_export_path() -> PathBuf {
    PathBuf::from("build")
}

fn default_export_options() -> PathBuf {
    PathBuf::from("ExportOptions.plist")
}

fn default_build_timeout() -> u64 {
    3600
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("fastlane/screenshots")
}

fn default_poll_attempts() -> u32 {
    30
}

fn default_poll_delay() -> u64 {
    30
}

impl DeployConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Replace credential fields with values given on the command line or
    /// through the environment.
    pub fn apply_credential_overrides(
        &mut self,
        key_id: Option<String>,
        issuer_id: Option<String>,
        key_file: Option<PathBuf>,
    ) {
        if let Some(key_id) = key_id {
            self.credentials.key_id = key_id;
        }
        if let Some(issuer_id) = issuer_id {
            self.credentials.issuer_id = issuer_id;
        }
        if let Some(key_file) = key_file {
            self.credentials.key_file = key_file;
        }
    }

    /// Check the configuration is usable before any request is sent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_reverse_dns(&self.app.bundle_id) {
            return Err(ConfigError::Invalid {
                field: "app.bundle_id",
                reason: format!(
                    "'{}' is not a reverse-DNS identifier like com.example.app",
                    self.app.bundle_id
                ),
            });
        }

        if self.app.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "app.name",
                reason: "must not be empty".to_string(),
            });
        }

        if self.credentials.key_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "credentials.key_id",
                reason: "must be set in the file, with --key-id or ASC_KEY_ID".to_string(),
            });
        }

        if self.credentials.issuer_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "credentials.issuer_id",
                reason: "must be set in the file, with --issuer-id or ASC_ISSUER_ID".to_string(),
            });
        }

        if self.credentials.key_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "credentials.key_file",
                reason: "must be set in the file, with --key-file or ASC_KEY_FILE".to_string(),
            });
        }

        url::Url::parse(&self.api.base_url).map_err(|e| ConfigError::Invalid {
            field: "api.base_url",
            reason: e.to_string(),
        })?;

        if self.build.project.is_some() && self.build.workspace.is_some() {
            return Err(ConfigError::Invalid {
                field: "build.workspace",
                reason: "set either build.project or build.workspace, not both".to_string(),
            });
        }

        if self.poll.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "poll.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Locale screenshots are uploaded to
    pub fn screenshot_locale(&self) -> &str {
        self.screenshots
            .locale
            .as_deref()
            .unwrap_or(&self.metadata.locale)
    }

    /// File name of the exported package inside the export directory
    pub fn package_name(&self) -> String {
        match &self.build.ipa_name {
            Some(name) => name.clone(),
            None => format!("{}.{}", self.build.scheme, self.app.platform.package_extension()),
        }
    }
}

fn is_reverse_dns(identifier: &str) -> bool {
    let segments: Vec<&str> = identifier.split('.').collect();
    segments.len() >= 2
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [app]
        bundle_id = "com.example.controlla"
        name = "Controlla"

        [credentials]
        key_id = "ABC123"
        issuer_id = "issuer"
        key_file = "AuthKey_ABC123.p8"
    "#;

    #[test]
    fn minimal_file_gets_defaults() {
        let config: DeployConfig = toml::from_str(MINIMAL).unwrap();

        assert_eq!(config.app.platform, Platform::Ios);
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.metadata.locale, "en-US");
        assert_eq!(config.poll.max_attempts, 30);
        assert_eq!(config.poll.delay_secs, 30);
        assert_eq!(config.build.configuration, "Release");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = DeployConfig::load(file.path()).unwrap();
        assert_eq!(config.app.bundle_id, "com.example.controlla");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DeployConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn overrides_replace_credentials() {
        let mut config: DeployConfig = toml::from_str(MINIMAL).unwrap();
        config.apply_credential_overrides(
            Some("NEWKEY".to_string()),
            None,
            Some(PathBuf::from("other.p8")),
        );

        assert_eq!(config.credentials.key_id, "NEWKEY");
        assert_eq!(config.credentials.issuer_id, "issuer");
        assert_eq!(config.credentials.key_file, PathBuf::from("other.p8"));
    }

    #[test]
    fn validate_rejects_bad_bundle_id() {
        let mut config: DeployConfig = toml::from_str(MINIMAL).unwrap();
        config.app.bundle_id = "controlla".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "app.bundle_id", .. }));
    }

    #[test]
    fn validate_requires_credentials() {
        let mut config: DeployConfig = toml::from_str(MINIMAL).unwrap();
        config.credentials.issuer_id.clear();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "credentials.issuer_id",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_zero_poll_attempts() {
        let mut config: DeployConfig = toml::from_str(MINIMAL).unwrap();
        config.poll.max_attempts = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn package_name_follows_scheme_and_platform() {
        let mut config: DeployConfig = toml::from_str(MINIMAL).unwrap();
        config.build.scheme = "AirType".to_string();
        assert_eq!(config.package_name(), "AirType.ipa");

        config.app.platform = Platform::MacOs;
        assert_eq!(config.package_name(), "AirType.pkg");

        config.build.ipa_name = Some("Custom.ipa".to_string());
        assert_eq!(config.package_name(), "Custom.ipa");
    }

    #[test]
    fn screenshot_locale_falls_back_to_metadata() {
        let mut config: DeployConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.screenshot_locale(), "en-US");

        config.screenshots.locale = Some("de-DE".to_string());
        assert_eq!(config.screenshot_locale(), "de-DE");
    }
}
