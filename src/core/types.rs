use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Debian-style package priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Required,
    Important,
    Standard,
    #[default]
    Optional,
    Extra,
}

impl Priority {
    /// Packages every installation carries; never part of a selection.
    pub fn is_essential(&self) -> bool {
        matches!(self, Self::Required | Self::Important)
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "required" => Self::Required,
            "important" => Self::Important,
            "standard" => Self::Standard,
            "extra" => Self::Extra,
            _ => Self::Optional,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Required => "required",
            Self::Important => "important",
            Self::Standard => "standard",
            Self::Optional => "optional",
            Self::Extra => "extra",
        };
        write!(f, "{}", name)
    }
}

/// Raw facts about one package, as reported by the package manager.
///
/// Dependency fields hold alternatives groups: `[["a"], ["b", "c"]]` means
/// `a, b | c`. Names are stripped of version constraints and arch qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InstalledPackage {
    pub name: String,
    #[serde(default = "default_true")]
    pub installed: bool,
    #[serde(default)]
    pub auto_installed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub depends: Vec<Vec<String>>,
    #[serde(default)]
    pub recommends: Vec<Vec<String>>,
    #[serde(default)]
    pub origin: Option<String>,
}

fn default_true() -> bool {
    true
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            installed: true,
            ..Self::default()
        }
    }

    pub fn auto(mut self) -> Self {
        self.auto_installed = true;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, names: &[&str]) -> Self {
        self.depends
            .extend(names.iter().map(|n| vec![(*n).to_string()]));
        self
    }

    pub fn recommends(mut self, names: &[&str]) -> Self {
        self.recommends
            .extend(names.iter().map(|n| vec![(*n).to_string()]));
        self
    }
}

/// One entry of a persisted package list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageEntry {
    pub auto: bool,
}

impl PackageEntry {
    pub fn manual() -> Self {
        Self { auto: false }
    }

    pub fn automatic() -> Self {
        Self { auto: true }
    }
}

/// Classified inventory of a host: name -> auto flag. Sorted, so its JSON
/// form is canonical.
pub type PackageList = BTreeMap<String, PackageEntry>;

/// Names of a host's manually selected packages.
pub type Selection = BTreeSet<String>;

pub fn selection_of(list: &PackageList) -> Selection {
    list.iter()
        .filter(|(_, entry)| !entry.auto)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Ledger record of one package of the current host. Kept after removal so
/// callers can tell when a package went away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub installed: bool,
    pub auto_installed: bool,
    pub selection: bool,
    pub last_modification: DateTime<Utc>,
    #[serde(default)]
    pub origin: Option<String>,
}

impl PackageRecord {
    pub fn new(
        installed: bool,
        auto_installed: bool,
        selection: bool,
        origin: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            installed,
            auto_installed,
            selection,
            last_modification: now,
            origin,
        }
    }

    /// Apply fresh facts; bumps `last_modification` only when a field moved.
    pub fn update_needed(
        &mut self,
        installed: bool,
        auto_installed: bool,
        selection: bool,
        origin: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;
        if self.installed != installed {
            self.installed = installed;
            changed = true;
        }
        if self.auto_installed != auto_installed {
            self.auto_installed = auto_installed;
            changed = true;
        }
        if self.selection != selection {
            self.selection = selection;
            changed = true;
        }
        if self.origin.as_deref() != origin {
            self.origin = origin.map(str::to_string);
            changed = true;
        }
        if changed {
            self.last_modification = now;
        }
        changed
    }

    /// Removal time, if the package is no longer installed.
    pub fn removed_at(&self) -> Option<DateTime<Utc>> {
        (!self.installed).then_some(self.last_modification)
    }
}

pub type PackageLedger = BTreeMap<String, PackageRecord>;
