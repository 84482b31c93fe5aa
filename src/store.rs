//! Per-host package lists and their change tokens.
//!
//! The current host's list is recomputed from the package source on
//! `update`; other hosts' lists are written by the sync engine. Reads go
//! through an in-process cache that is dropped whenever the last-sync date
//! moves, so a query never serves a list older than the last completed sync.

use crate::core::checksum::checksum_of;
use crate::core::classifier::Classifier;
use crate::core::diff::{PackageDiff, diff_lists};
use crate::core::types::{
    InstalledPackage, PackageLedger, PackageList, PackageRecord, Selection, selection_of,
};
use crate::distro::DistroPolicy;
use crate::error::{OneconfError, Result};
use crate::hosts::{SharedRegistry, read_registry, write_registry};
use crate::packages::PackageSource;
use crate::state::io::{load_json, load_json_or_default, write_json_atomically};
use crate::state::types::PackageListFile;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Result of recomputing the current host's package list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Changed(String),
    Unchanged(String),
}

impl UpdateOutcome {
    pub fn etag(&self) -> &str {
        match self {
            Self::Changed(etag) | Self::Unchanged(etag) => etag,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// What `get_packages` hands back: the whole inventory, or only the sorted
/// manually selected names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PackageListing {
    Full(PackageList),
    Manual(Vec<String>),
}

impl PackageListing {
    pub fn len(&self) -> usize {
        match self {
            Self::Full(list) => list.len(),
            Self::Manual(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct StoreCache {
    lists: HashMap<String, PackageListFile>,
    last_storage_sync: Option<f64>,
}

pub struct PackageStore {
    registry: SharedRegistry,
    policy: DistroPolicy,
    cache: Mutex<StoreCache>,
}

impl PackageStore {
    pub fn new(registry: SharedRegistry, policy: DistroPolicy) -> Self {
        Self {
            registry,
            policy,
            cache: Mutex::new(StoreCache::default()),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &DistroPolicy {
        &self.policy
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, StoreCache>> {
        self.cache
            .lock()
            .map_err(|e| OneconfError::LockError(format!("package cache: {}", e)))
    }

    /// Recompute the current host's package list. The file is only written,
    /// and the host checksum only bumped, when the content changed.
    pub fn update(&self, source: &dyn PackageSource) -> Result<UpdateOutcome> {
        tracing::debug!("Updating package list from {}", source.name());
        let installed = source.installed_packages()?;
        let list = Classifier::new(&self.policy).classify(&installed);
        let etag = checksum_of(&list)?;

        let hostid = read_registry(&self.registry)?.current_hostid().to_string();
        self.record_ledger(&installed, &list)?;

        let known = self.cached_list(&hostid)?;
        let outcome = if known.etag.as_deref() == Some(etag.as_str()) {
            tracing::debug!("No refresh needed");
            UpdateOutcome::Unchanged(etag.clone())
        } else {
            tracing::debug!("Package list needs refresh");
            self.store_package_list(&hostid, Some(etag.clone()), list)?;
            UpdateOutcome::Changed(etag.clone())
        };

        write_registry(&self.registry)?.set_packages_checksum(Some(etag))?;
        Ok(outcome)
    }

    /// Bring the package ledger in line with the fresh facts. Packages that
    /// disappeared are kept as removed records.
    fn record_ledger(&self, installed: &[InstalledPackage], list: &PackageList) -> Result<()> {
        let path = read_registry(&self.registry)?
            .layout()
            .package_records_file();
        let mut ledger: PackageLedger = load_json_or_default(&path);
        let now = Utc::now();
        let mut changed = false;

        for pkg in installed.iter().filter(|pkg| pkg.installed) {
            let selection = list.get(&pkg.name).is_some_and(|entry| !entry.auto);
            match ledger.get_mut(&pkg.name) {
                Some(record) => {
                    changed |= record.update_needed(
                        true,
                        pkg.auto_installed,
                        selection,
                        pkg.origin.as_deref(),
                        now,
                    );
                }
                None => {
                    ledger.insert(
                        pkg.name.clone(),
                        PackageRecord::new(
                            true,
                            pkg.auto_installed,
                            selection,
                            pkg.origin.clone(),
                            now,
                        ),
                    );
                    changed = true;
                }
            }
        }

        let still_installed: HashSet<&str> = installed
            .iter()
            .filter(|pkg| pkg.installed)
            .map(|pkg| pkg.name.as_str())
            .collect();
        for (name, record) in ledger.iter_mut() {
            if !still_installed.contains(name.as_str()) {
                let origin = record.origin.clone();
                let auto = record.auto_installed;
                changed |= record.update_needed(false, auto, false, origin.as_deref(), now);
            }
        }

        if changed {
            write_json_atomically(&path, &ledger)?;
        }
        Ok(())
    }

    /// The current host's package records, including removed packages.
    pub fn package_ledger(&self) -> Result<PackageLedger> {
        let path = read_registry(&self.registry)?
            .layout()
            .package_records_file();
        Ok(load_json_or_default(&path))
    }

    /// Packages the current host no longer has, keyed to their removal time.
    pub fn removed_packages(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        Ok(self
            .package_ledger()?
            .into_iter()
            .filter_map(|(name, record)| record.removed_at().map(|at| (name, at)))
            .collect())
    }

    /// Persist a host's list under `etag` and refresh the cache entry.
    pub fn store_package_list(
        &self,
        hostid: &str,
        etag: Option<String>,
        package_list: PackageList,
    ) -> Result<()> {
        let path = read_registry(&self.registry)?
            .layout()
            .package_list_file(hostid);
        let file = PackageListFile { etag, package_list };
        write_json_atomically(&path, &file)?;
        self.lock_cache()?.lists.insert(hostid.to_string(), file);
        Ok(())
    }

    /// Drop the storage cache if a sync completed since it was filled.
    pub fn check_if_storage_refreshed(&self) -> Result<()> {
        let new_sync = read_registry(&self.registry)?.last_sync_date();
        let mut cache = self.lock_cache()?;
        if cache.last_storage_sync != new_sync {
            tracing::debug!("Invalidate cache as storage has been synced");
            cache.lists.clear();
            cache.last_storage_sync = new_sync;
        }
        Ok(())
    }

    pub fn invalidate(&self, hostid: &str) -> Result<()> {
        self.lock_cache()?.lists.remove(hostid);
        Ok(())
    }

    pub fn invalidate_all(&self) -> Result<()> {
        self.lock_cache()?.lists.clear();
        Ok(())
    }

    fn cached_list(&self, hostid: &str) -> Result<PackageListFile> {
        self.check_if_storage_refreshed()?;
        if let Some(file) = self.lock_cache()?.lists.get(hostid) {
            tracing::debug!("Hit cache for {}", hostid);
            return Ok(file.clone());
        }

        let path = read_registry(&self.registry)?
            .layout()
            .package_list_file(hostid);
        let file: PackageListFile = load_json(&path).unwrap_or_default();
        self.lock_cache()?
            .lists
            .insert(hostid.to_string(), file.clone());
        Ok(file)
    }

    /// Change token of the list we hold for `hostid`, if any.
    pub fn package_list_etag(&self, hostid: &str) -> Result<Option<String>> {
        Ok(self.cached_list(hostid)?.etag)
    }

    pub fn get_package_list(&self, hostid: &str) -> Result<PackageList> {
        Ok(self.cached_list(hostid)?.package_list)
    }

    pub fn get_selection(&self, hostid: &str) -> Result<Selection> {
        Ok(selection_of(&self.get_package_list(hostid)?))
    }

    pub fn get_packages(&self, hostid: &str, only_manual: bool) -> Result<PackageListing> {
        tracing::debug!("Request for package list for {}", hostid);
        let list = self.get_package_list(hostid)?;
        if only_manual {
            Ok(PackageListing::Manual(selection_of(&list).into_iter().collect()))
        } else {
            Ok(PackageListing::Full(list))
        }
    }

    /// What `local` has that `remote` lacks, and the reverse, by selection.
    pub fn diff(&self, local_hostid: &str, remote_hostid: &str) -> Result<PackageDiff> {
        tracing::debug!("Comparing {} against {}", local_hostid, remote_hostid);
        let local = self.get_package_list(local_hostid)?;
        let remote = self.get_package_list(remote_hostid)?;
        Ok(diff_lists(&local, &remote))
    }
}
