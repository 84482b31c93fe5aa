//! dpkg database reader.
//!
//! Reads `/var/lib/dpkg/status` for installed packages and their relations,
//! and apt's `extended_states` for the auto-installed marks.

use super::traits::PackageSource;
use crate::core::types::{InstalledPackage, Priority};
use crate::error::{OneconfError, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const DPKG_STATUS: &str = "/var/lib/dpkg/status";
pub const APT_EXTENDED_STATES: &str = "/var/lib/apt/extended_states";

pub struct DpkgSource {
    status_path: PathBuf,
    extended_states_path: PathBuf,
}

impl DpkgSource {
    pub fn new(status_path: impl Into<PathBuf>, extended_states_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            extended_states_path: extended_states_path.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(DPKG_STATUS, APT_EXTENDED_STATES)
    }
}

impl PackageSource for DpkgSource {
    fn name(&self) -> &str {
        "dpkg"
    }

    fn is_available(&self) -> bool {
        self.status_path.exists()
    }

    fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        let status = read(&self.status_path)?;
        // No extended_states just means nothing was ever marked automatic.
        let auto = match fs::read_to_string(&self.extended_states_path) {
            Ok(content) => parse_extended_states(&content),
            Err(e) => {
                tracing::debug!(
                    "No apt extended states at {}: {}",
                    self.extended_states_path.display(),
                    e
                );
                HashSet::new()
            }
        };
        Ok(parse_status(&status, &auto))
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| OneconfError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Split a deb822 document into stanzas of (field, value), folding
/// continuation lines into the previous value.
fn stanzas(content: &str) -> Vec<BTreeMap<String, String>> {
    let mut result = Vec::new();
    let mut current: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(key) = &last_key
                && let Some(value) = current.get_mut(key)
            {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            current.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// `foo (>= 1), bar:any | baz [amd64]` -> `[["foo"], ["bar", "baz"]]`
pub fn parse_relations(value: &str) -> Vec<Vec<String>> {
    value
        .split(',')
        .map(|group| {
            group
                .split('|')
                .filter_map(|alternative| {
                    let name = alternative
                        .trim()
                        .split(|c: char| c.is_whitespace() || c == '(' || c == '[' || c == '<')
                        .next()?;
                    let name = name.split(':').next()?;
                    (!name.is_empty()).then(|| name.to_string())
                })
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty())
        .collect()
}

pub fn parse_extended_states(content: &str) -> HashSet<String> {
    stanzas(content)
        .into_iter()
        .filter(|stanza| stanza.get("Auto-Installed").map(String::as_str) == Some("1"))
        .filter_map(|mut stanza| stanza.remove("Package"))
        .collect()
}

pub fn parse_status(content: &str, auto: &HashSet<String>) -> Vec<InstalledPackage> {
    let mut packages: BTreeMap<String, InstalledPackage> = BTreeMap::new();

    for stanza in stanzas(content) {
        let Some(name) = stanza.get("Package") else {
            continue;
        };
        let installed = stanza
            .get("Status")
            .is_some_and(|status| status.split_whitespace().last() == Some("installed"));
        if !installed {
            continue;
        }

        let field = |key: &str| stanza.get(key).map(String::as_str).unwrap_or("");
        let mut depends = parse_relations(field("Pre-Depends"));
        depends.extend(parse_relations(field("Depends")));

        let package = InstalledPackage {
            name: name.clone(),
            installed: true,
            auto_installed: auto.contains(name),
            priority: Priority::parse(field("Priority")),
            depends,
            recommends: parse_relations(field("Recommends")),
            origin: stanza.get("Origin").cloned(),
        };

        // Multi-arch installs of one name merge their relations.
        packages
            .entry(name.clone())
            .and_modify(|existing| {
                existing.depends.extend(package.depends.iter().cloned());
                existing.recommends.extend(package.recommends.iter().cloned());
            })
            .or_insert(package);
    }

    packages.into_values().collect()
}
