//! Environment facts used for provider resolution.
//!
//! A [`FactContext`] is an immutable snapshot supplied by the caller. It is
//! passed by argument to the resolver and the apply context; there is no
//! process-wide "current node".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Platform facts that disambiguate provider selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FactContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_version: Option<String>,
}

impl FactContext {
    /// The generic Linux profile used when the caller supplies nothing
    pub fn generic_linux() -> Self {
        Self {
            os: Some("linux".to_string()),
            platform: Some("linux".to_string()),
            platform_family: None,
            platform_version: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.os.is_none()
            && self.platform.is_none()
            && self.platform_family.is_none()
            && self.platform_version.is_none()
    }

    /// Fill absent fields from a lower-precedence context
    pub fn merged_over(&self, base: &FactContext) -> FactContext {
        FactContext {
            os: self.os.clone().or_else(|| base.os.clone()),
            platform: self.platform.clone().or_else(|| base.platform.clone()),
            platform_family: self
                .platform_family
                .clone()
                .or_else(|| base.platform_family.clone()),
            platform_version: self
                .platform_version
                .clone()
                .or_else(|| base.platform_version.clone()),
        }
    }

    pub fn os(&self) -> Option<&str> {
        self.os.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Platform family, derived from the platform when not given explicitly
    pub fn family(&self) -> Option<&str> {
        self.platform_family
            .as_deref()
            .or_else(|| self.platform().and_then(family_of))
    }

    pub fn is_os(&self, candidates: &[&str]) -> bool {
        self.os().is_some_and(|os| candidates.contains(&os))
    }

    pub fn is_family(&self, candidates: &[&str]) -> bool {
        self.family().is_some_and(|f| candidates.contains(&f))
    }

    /// Leading numeric component of the platform version
    pub fn major_version(&self) -> Option<u32> {
        let version = self.platform_version.as_deref()?;
        let major: String = version
            .trim()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        major.parse().ok()
    }

    /// Whether the major platform version is at least `major`.
    ///
    /// An unknown version counts as current.
    pub fn version_at_least(&self, major: u32) -> bool {
        self.major_version().is_none_or(|v| v >= major)
    }

    /// Detect facts for the running host
    pub fn detect() -> Self {
        let os = std::env::consts::OS;
        let os_release = std::fs::read_to_string(Path::new("/etc/os-release")).ok();
        let mut facts = match os_release {
            Some(content) if os == "linux" => Self::from_os_release(&content),
            _ => Self::default(),
        };

        facts.os = Some(
            match os {
                "macos" => "darwin",
                other => other,
            }
            .to_string(),
        );

        if os == "macos" {
            facts.platform = Some("mac_os_x".to_string());
            facts.platform_family = Some("mac_os_x".to_string());
        }

        if facts.platform.is_none() {
            facts.platform = facts.os.clone();
        }

        log::debug!("Detected facts: {facts}");
        facts
    }

    /// Parse `/etc/os-release` content (`ID`, `ID_LIKE`, `VERSION_ID`)
    pub fn from_os_release(content: &str) -> Self {
        let mut id = None;
        let mut id_like = None;
        let mut version = None;

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
            match key.trim() {
                "ID" => id = Some(value),
                "ID_LIKE" => id_like = Some(value),
                "VERSION_ID" => version = Some(value),
                _ => {}
            }
        }

        let family = id
            .as_deref()
            .and_then(family_of)
            .or_else(|| {
                id_like
                    .as_deref()
                    .and_then(|like| like.split_whitespace().find_map(family_of))
            })
            .map(str::to_string);

        Self {
            os: Some("linux".to_string()),
            platform: id,
            platform_family: family,
            platform_version: version,
        }
    }
}

/// Map a platform name to its family
fn family_of(platform: &str) -> Option<&'static str> {
    let family = match platform {
        "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" => "debian",
        "rhel" | "redhat" | "centos" | "rocky" | "almalinux" | "oracle" | "ol" => "rhel",
        "fedora" => "fedora",
        "amazon" | "amzn" => "amazon",
        "arch" | "manjaro" | "endeavouros" => "arch",
        "alpine" => "alpine",
        "gentoo" => "gentoo",
        "mac_os_x" | "macos" => "mac_os_x",
        "suse" | "sles" => "suse",
        p if p.starts_with("opensuse") => "suse",
        _ => return None,
    };
    Some(family)
}

impl fmt::Display for FactContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "os={} platform={} family={} version={}",
            self.os().unwrap_or("-"),
            self.platform().unwrap_or("-"),
            self.family().unwrap_or("-"),
            self.platform_version.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(platform: &str, family: Option<&str>, version: Option<&str>) -> FactContext {
        FactContext {
            os: Some("linux".into()),
            platform: Some(platform.into()),
            platform_family: family.map(Into::into),
            platform_version: version.map(Into::into),
        }
    }

    #[test]
    fn test_generic_linux_profile() {
        let f = FactContext::generic_linux();
        assert_eq!(f.os(), Some("linux"));
        assert_eq!(f.platform(), Some("linux"));
        assert_eq!(f.family(), None);
        assert_eq!(f.platform_version, None);
    }

    #[test]
    fn test_family_derived_from_platform() {
        assert_eq!(facts("ubuntu", None, None).family(), Some("debian"));
        assert_eq!(facts("rocky", None, None).family(), Some("rhel"));
        assert_eq!(facts("opensuse-leap", None, None).family(), Some("suse"));
        assert_eq!(facts("plan9", None, None).family(), None);
    }

    #[test]
    fn test_explicit_family_wins() {
        assert_eq!(facts("ubuntu", Some("custom"), None).family(), Some("custom"));
    }

    #[test]
    fn test_version_at_least() {
        assert!(facts("rhel", None, Some("8.6")).version_at_least(8));
        assert!(!facts("rhel", None, Some("7.9")).version_at_least(8));
        assert!(facts("rhel", None, None).version_at_least(8));
        assert_eq!(facts("debian", None, Some("12")).major_version(), Some(12));
    }

    #[test]
    fn test_merged_over_keeps_explicit_fields() {
        let request = FactContext {
            platform: Some("debian".into()),
            ..Default::default()
        };
        let merged = request.merged_over(&FactContext::generic_linux());
        assert_eq!(merged.os(), Some("linux"));
        assert_eq!(merged.platform(), Some("debian"));
        assert_eq!(merged.family(), Some("debian"));
    }

    #[test]
    fn test_from_os_release() {
        let content = r#"NAME="Ubuntu"
VERSION_ID="22.04"
ID=ubuntu
ID_LIKE=debian
"#;
        let f = FactContext::from_os_release(content);
        assert_eq!(f.platform(), Some("ubuntu"));
        assert_eq!(f.family(), Some("debian"));
        assert_eq!(f.platform_version.as_deref(), Some("22.04"));
    }

    #[test]
    fn test_from_os_release_uses_id_like() {
        let content = "ID=\"somedistro\"\nID_LIKE=\"rhel centos fedora\"\nVERSION_ID=\"9\"\n";
        let f = FactContext::from_os_release(content);
        assert_eq!(f.platform(), Some("somedistro"));
        assert_eq!(f.family(), Some("rhel"));
    }

    #[test]
    fn test_detect_has_os() {
        let f = FactContext::detect();
        assert!(f.os().is_some());
        assert!(f.platform().is_some());
    }

    #[test]
    fn test_deserialize_partial() {
        let f: FactContext = serde_json::from_str(r#"{"platform_family":"debian"}"#).unwrap();
        assert_eq!(f.family(), Some("debian"));
        assert!(f.os.is_none());
        assert!(!f.is_empty());
        assert!(FactContext::default().is_empty());
    }
}
