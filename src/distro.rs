//! Distribution classification policies.
//!
//! A policy is plain data: which meta-packages define the default install,
//! which packages look default but are not, which extra packages always count
//! as selected, and which names are never interesting. The active policy is
//! chosen once at startup by key and handed to the classifier.

mod debian;
mod generic;
mod ubuntu;

use crate::error::{OneconfError, Result};
use crate::utils::patterns::package_pattern;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

const OS_RELEASE: &str = "/etc/os-release";

#[derive(Debug, Clone)]
pub struct DistroPolicy {
    /// Lookup key (`ubuntu`, `debian`, `generic`).
    pub key: String,
    pub meta_packages: BTreeSet<String>,
    pub false_defaults: BTreeSet<String>,
    pub additional_packages: BTreeSet<String>,
    /// Additional packages whose direct dependencies are also additional.
    pub additional_roots: BTreeSet<String>,
    pub recommends_as_dep: bool,
    blacklist: Option<Regex>,
}

impl DistroPolicy {
    pub fn builder(key: &str) -> DistroPolicyBuilder {
        DistroPolicyBuilder {
            policy: DistroPolicy {
                key: key.to_string(),
                meta_packages: BTreeSet::new(),
                false_defaults: BTreeSet::new(),
                additional_packages: BTreeSet::new(),
                additional_roots: BTreeSet::new(),
                recommends_as_dep: false,
                blacklist: None,
            },
            blacklist_pattern: None,
        }
    }

    /// Known policy keys.
    pub fn known_keys() -> &'static [&'static str] {
        &["ubuntu", "debian", "generic"]
    }

    pub fn for_key(key: &str) -> Result<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ubuntu" => ubuntu::policy(),
            "debian" => debian::policy(),
            "generic" | "none" => generic::policy(),
            other => Err(OneconfError::UnknownDistro(format!(
                "'{}' (known: {})",
                other,
                Self::known_keys().join(", ")
            ))),
        }
    }

    /// Pick the policy for the running system, falling back to `generic`.
    pub fn detect() -> Result<Self> {
        let key = std::fs::read_to_string(OS_RELEASE)
            .ok()
            .and_then(|content| detect_key(&content))
            .unwrap_or("generic");
        tracing::debug!("get_distro: '{}'", key);
        Self::for_key(key)
    }

    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist
            .as_ref()
            .is_some_and(|regex| regex.is_match(name))
    }
}

pub struct DistroPolicyBuilder {
    policy: DistroPolicy,
    blacklist_pattern: Option<String>,
}

impl DistroPolicyBuilder {
    pub fn meta_packages(mut self, names: &[&str]) -> Self {
        self.policy
            .meta_packages
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn false_defaults(mut self, names: &[&str]) -> Self {
        self.policy
            .false_defaults
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn additional_packages(mut self, names: &[&str]) -> Self {
        self.policy
            .additional_packages
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn additional_roots(mut self, names: &[&str]) -> Self {
        self.policy
            .additional_roots
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn recommends_as_dep(mut self, value: bool) -> Self {
        self.policy.recommends_as_dep = value;
        self
    }

    pub fn blacklist(mut self, pattern: &str) -> Self {
        self.blacklist_pattern = Some(pattern.to_string());
        self
    }

    pub fn build(mut self) -> Result<DistroPolicy> {
        if let Some(pattern) = self.blacklist_pattern {
            self.policy.blacklist = Some(package_pattern(&pattern)?);
        }
        Ok(self.policy)
    }
}

/// Map an os-release document to a policy key.
fn detect_key(os_release: &str) -> Option<&'static str> {
    let mut ids = Vec::new();
    for line in os_release.lines() {
        if let Some(value) = line
            .strip_prefix("ID=")
            .or_else(|| line.strip_prefix("ID_LIKE="))
        {
            ids.extend(
                value
                    .trim_matches('"')
                    .split_whitespace()
                    .map(|s| s.to_ascii_lowercase()),
            );
        }
    }

    if ids.iter().any(|id| id == "ubuntu") {
        Some("ubuntu")
    } else if ids.iter().any(|id| id == "debian") {
        Some("debian")
    } else if Path::new("/var/lib/dpkg/status").exists() {
        Some("debian")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_prefers_ubuntu_over_debian_like() {
        let os_release = "NAME=\"Linux Mint\"\nID=linuxmint\nID_LIKE=\"ubuntu debian\"\n";
        assert_eq!(detect_key(os_release), Some("ubuntu"));
    }

    #[test]
    fn detect_plain_debian() {
        let os_release = "PRETTY_NAME=\"Debian GNU/Linux 12\"\nID=debian\n";
        assert_eq!(detect_key(os_release), Some("debian"));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let err = DistroPolicy::for_key("plan9").unwrap_err();
        assert!(matches!(err, OneconfError::UnknownDistro(_)));
    }

    #[test]
    fn ubuntu_blacklists_dev_packages() {
        let policy = DistroPolicy::for_key("ubuntu").expect("ubuntu policy");
        assert!(policy.is_blacklisted("libssl-dev"));
        assert!(policy.is_blacklisted("libfoo-dev-common"));
        assert!(!policy.is_blacklisted("udev"));
        assert!(policy.recommends_as_dep);
        assert!(policy.meta_packages.contains("ubuntu-desktop"));
    }

    #[test]
    fn generic_policy_is_empty() {
        let policy = DistroPolicy::for_key("generic").expect("generic policy");
        assert!(policy.meta_packages.is_empty());
        assert!(!policy.is_blacklisted("libssl-dev"));
    }
}
