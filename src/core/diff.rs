//! Package-set diff between two hosts.

use crate::core::types::PackageList;
use serde::{Deserialize, Serialize};

/// Result of comparing the local host with another host.
///
/// Both fields are always present, possibly empty: callers on the other side
/// of a transport cannot tell "empty" from "missing".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PackageDiff {
    /// Selected locally, missing on the other host.
    pub to_install: Vec<String>,
    /// Selected on the other host, missing locally.
    pub to_remove: Vec<String>,
}

impl PackageDiff {
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }

    /// The same comparison seen from the other host.
    pub fn reversed(self) -> Self {
        Self {
            to_install: self.to_remove,
            to_remove: self.to_install,
        }
    }
}

/// Compare the selections of two package lists.
///
/// A name selected on one side counts as present on the other side as soon as
/// it is installed there, even as an automatic dependency: only the manual
/// status differs, not the software.
pub fn diff_lists(local: &PackageList, remote: &PackageList) -> PackageDiff {
    PackageDiff {
        to_install: selected_missing_from(local, remote),
        to_remove: selected_missing_from(remote, local),
    }
}

fn selected_missing_from(source: &PackageList, other: &PackageList) -> Vec<String> {
    source
        .iter()
        .filter(|(name, entry)| !entry.auto && !other.contains_key(*name))
        .map(|(name, _)| name.clone())
        .collect()
}
