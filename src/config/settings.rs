//! Settings Module
//!
//! Reads `settings.kdl` from the config directory. Keys may sit at the top
//! level or inside a `settings { }` block:
//!
//! ```kdl
//! settings {
//!     cache-dir "~/.cache/oneconf"
//!     catalog-url "https://catalog.example/api/1.0"
//!     distro "ubuntu"
//!     sync-interval 600
//!     package-source "dpkg"
//! }
//! ```

use crate::error::{OneconfError, Result};
use crate::hosts::HostIdentity;
use crate::project_identity;
use crate::utils::paths;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 600;

pub const VALID_KEYS: &[&str] = &[
    "cache-dir",
    "catalog-url",
    "catalog-token",
    "silo-path",
    "distro",
    "sync-interval",
    "package-source",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cache_dir: Option<PathBuf>,
    pub catalog_url: Option<String>,
    pub catalog_token: Option<String>,
    pub silo_path: Option<PathBuf>,
    /// Distribution policy key; `None` means detect.
    pub distro: Option<String>,
    pub sync_interval: Duration,
    /// `dpkg` or a path to a JSON snapshot.
    pub package_source: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            catalog_url: None,
            catalog_token: None,
            silo_path: None,
            distro: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            package_source: "dpkg".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default location, or defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| OneconfError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let doc: KdlDocument = content.parse()?;
        let mut settings = Self::default();

        for node in doc.nodes() {
            if node.name().value() == "settings" {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        settings.apply_node(child)?;
                    }
                }
            } else {
                settings.apply_node(node)?;
            }
        }
        Ok(settings)
    }

    fn apply_node(&mut self, node: &KdlNode) -> Result<()> {
        let key = node.name().value();
        let value = node.entries().first().map(|entry| entry.value());

        match key {
            "cache-dir" => {
                let path = PathBuf::from(string_value(key, value)?);
                self.cache_dir = Some(paths::expand_home(&path)?);
            }
            "catalog-url" => self.catalog_url = Some(string_value(key, value)?),
            "catalog-token" => self.catalog_token = Some(string_value(key, value)?),
            "silo-path" => {
                let path = PathBuf::from(string_value(key, value)?);
                self.silo_path = Some(paths::expand_home(&path)?);
            }
            "distro" => self.distro = Some(string_value(key, value)?),
            "sync-interval" => {
                let secs = match value {
                    Some(v) => v
                        .as_integer()
                        .and_then(|i| u64::try_from(i).ok())
                        .or_else(|| v.as_string().and_then(|s| s.trim().parse().ok())),
                    None => None,
                };
                match secs {
                    Some(secs) if secs > 0 => self.sync_interval = Duration::from_secs(secs),
                    _ => {
                        return Err(OneconfError::ConfigError(format!(
                            "Invalid value for '{}': expected a positive number of seconds",
                            key
                        )));
                    }
                }
            }
            "package-source" => self.package_source = string_value(key, value)?,
            other => {
                tracing::warn!(
                    "Unknown setting '{}' ignored. Valid settings: {}",
                    other,
                    VALID_KEYS.join(", ")
                );
            }
        }
        Ok(())
    }

    /// Fold in environment overrides; they win over the file.
    pub fn apply_env(&mut self, env: &EnvOverrides) {
        if let Some(dir) = &env.cache_dir {
            self.cache_dir = Some(dir.clone());
        }
        if let Some(token) = &env.catalog_token {
            self.catalog_token = Some(token.clone());
        }
    }

    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_cache_root(),
        }
    }

    /// `(key, value)` pairs for display, unset values shown as empty.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        vec![
            ("cache-dir", path(&self.cache_dir).unwrap_or_default()),
            ("catalog-url", self.catalog_url.clone().unwrap_or_default()),
            (
                "catalog-token",
                self.catalog_token
                    .as_ref()
                    .map(|_| "********".to_string())
                    .unwrap_or_default(),
            ),
            ("silo-path", path(&self.silo_path).unwrap_or_default()),
            ("distro", self.distro.clone().unwrap_or_else(|| "auto".into())),
            ("sync-interval", self.sync_interval.as_secs().to_string()),
            ("package-source", self.package_source.clone()),
        ]
    }
}

fn string_value(key: &str, value: Option<&KdlValue>) -> Result<String> {
    value
        .and_then(|v| v.as_string())
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            OneconfError::ConfigError(format!("Invalid value for '{}': expected a string", key))
        })
}

/// Overrides and test hooks read from the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub cache_dir: Option<PathBuf>,
    pub catalog_token: Option<String>,
    /// `ONECONF_HOST=<hostid>:<hostname>`
    pub host: Option<HostIdentity>,
    pub net_connected: Option<bool>,
    pub sso_credential: Option<bool>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| {
            lookup(&project_identity::env_key(suffix)).filter(|v| !v.trim().is_empty())
        };
        let host = get("HOST").and_then(|value| {
            let identity = HostIdentity::from_override(&value);
            if identity.is_none() {
                tracing::warn!("Ignoring malformed {}: '{}'", project_identity::env_key("HOST"), value);
            }
            identity
        });

        Self {
            cache_dir: get("CACHE_DIR").map(PathBuf::from),
            catalog_token: get("CATALOG_TOKEN"),
            host,
            net_connected: get("NET_CONNECTED").map(|v| parse_flag(&v)),
            sso_credential: get("SSO_CRED").map(|v| parse_flag(&v)),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
