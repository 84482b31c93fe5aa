//! Caller-facing operations.
//!
//! Queries only read the local cache and never touch the network. Empty
//! results are empty collections, never absent values.

use crate::core::diff::PackageDiff;
use crate::distro::DistroPolicy;
use crate::error::Result;
use crate::hosts::{
    HostIdentity, HostRegistry, HostSummary, SharedRegistry, read_registry, write_registry,
};
use crate::packages::PackageSource;
use crate::store::{PackageListing, PackageStore, UpdateOutcome};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub const NEVER_SYNCED: &str = "Was never synced";

pub struct OneConf {
    store: Arc<PackageStore>,
    source: Box<dyn PackageSource>,
}

impl OneConf {
    pub fn new(store: Arc<PackageStore>, source: Box<dyn PackageSource>) -> Self {
        Self { store, source }
    }

    pub fn open(
        cache_root: impl Into<PathBuf>,
        identity: &HostIdentity,
        policy: DistroPolicy,
        source: Box<dyn PackageSource>,
    ) -> Result<Self> {
        let registry = HostRegistry::open(cache_root, identity)?.into_shared();
        Ok(Self::new(Arc::new(PackageStore::new(registry, policy)), source))
    }

    pub fn store(&self) -> &Arc<PackageStore> {
        &self.store
    }

    pub fn registry(&self) -> &SharedRegistry {
        self.store.registry()
    }

    pub fn get_all_hosts(&self) -> Result<BTreeMap<String, HostSummary>> {
        Ok(read_registry(self.registry())?.all_hosts())
    }

    fn resolve(&self, hostid: Option<&str>, hostname: Option<&str>) -> Result<String> {
        read_registry(self.registry())?.resolve(hostid, hostname)
    }

    pub fn get_packages(
        &self,
        hostid: Option<&str>,
        hostname: Option<&str>,
        only_manual: bool,
    ) -> Result<PackageListing> {
        let hostid = self.resolve(hostid, hostname)?;
        self.store.get_packages(&hostid, only_manual)
    }

    /// What this host uninstalled since its first update, and when.
    pub fn get_removed_packages(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        self.store.removed_packages()
    }

    pub fn gethostname_by_id(&self, hostid: &str) -> Result<String> {
        read_registry(self.registry())?.gethostname_by_id(hostid)
    }

    /// Compare the current host against another one.
    pub fn diff(&self, hostid: Option<&str>, hostname: Option<&str>) -> Result<PackageDiff> {
        let remote = self.resolve(hostid, hostname)?;
        let local = read_registry(self.registry())?.current_hostid().to_string();
        self.store.diff(&local, &remote)
    }

    pub fn update(&self) -> Result<UpdateOutcome> {
        self.store.update(self.source.as_ref())
    }

    pub fn set_share_inventory(&self, share: bool, hostid: Option<&str>) -> Result<()> {
        write_registry(self.registry())?.set_share_inventory(share, hostid)
    }

    /// Last sync as a `%.2f` unix timestamp, or [`NEVER_SYNCED`].
    pub fn get_last_sync_date(&self) -> Result<String> {
        Ok(read_registry(self.registry())?
            .last_sync_date()
            .map(|ts| format!("{:.2}", ts))
            .unwrap_or_else(|| NEVER_SYNCED.to_string()))
    }
}
