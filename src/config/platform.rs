//! App Store platform targets.

use std::fmt;

/// Platform a version record and build belong to.
///
/// Serialized with the App Store Connect enum spelling so it can be written
/// straight into filters and request bodies.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_appstore::config::Platform;
///
/// let platform = Platform::Ios;
/// assert_eq!(platform.as_api_str(), "IOS");
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    /// iPhone and iPad
    #[default]
    Ios,
    /// Mac App Store
    MacOs,
    /// Apple TV
    TvOs,
    /// Apple Vision Pro
    VisionOs,
}

impl Platform {
    /// Value used in `appStoreVersions` and `reviewSubmissions` payloads
    pub fn as_api_str(self) -> &'static str {
        match self {
            Platform::Ios => "IOS",
            Platform::MacOs => "MAC_OS",
            Platform::TvOs => "TV_OS",
            Platform::VisionOs => "VISION_OS",
        }
    }

    /// Value used when registering a bundle identifier.
    ///
    /// Bundle ids only distinguish iOS and macOS; tvOS and visionOS apps
    /// register under IOS.
    pub fn bundle_id_platform(self) -> &'static str {
        match self {
            Platform::MacOs => "MAC_OS",
            _ => "IOS",
        }
    }

    /// `--type` argument understood by `xcrun altool`
    pub fn altool_type(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::MacOs => "macos",
            Platform::TvOs => "appletvos",
            Platform::VisionOs => "visionos",
        }
    }

    /// Extension of the exported package
    pub fn package_extension(self) -> &'static str {
        match self {
            Platform::MacOs => "pkg",
            _ => "ipa",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Wrapper {
        platform: Platform,
    }

    #[test]
    fn deserializes_api_spelling() {
        let parsed: Wrapper = toml::from_str(r#"platform = "MAC_OS""#).unwrap();
        assert_eq!(parsed.platform, Platform::MacOs);

        let parsed: Wrapper = toml::from_str(r#"platform = "VISION_OS""#).unwrap();
        assert_eq!(parsed.platform, Platform::VisionOs);
    }

    #[test]
    fn tv_registers_bundle_under_ios() {
        assert_eq!(Platform::TvOs.bundle_id_platform(), "IOS");
        assert_eq!(Platform::MacOs.bundle_id_platform(), "MAC_OS");
    }
}
