//! Host registry: who we are, and which other hosts we know about.
//!
//! The current host record lives in the `host` file and is the only one this
//! process mutates freely. Other hosts come from the catalog through sync and
//! are cached in `other_hosts`. Remote mutations that could not be applied
//! yet sit in the `pending_upload` queue.

use crate::core::checksum::checksum_bytes;
use crate::error::{OneconfError, Result};
use crate::state::io::{
    load_json, load_json_or_default, remove_file_best_effort, write_json_atomically,
};
use crate::state::types::{
    HostData, HostMap, HostMetadata, LastSync, OtherHostsFile, PendingUploads,
    SHARE_INVENTORY_KEY,
};
use crate::utils::paths::CacheLayout;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Stable id and display name of the machine we run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostid: String,
    pub hostname: String,
}

impl HostIdentity {
    pub fn new(hostid: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            hostid: hostid.into(),
            hostname: hostname.into(),
        }
    }

    /// Parse an `<hostid>:<hostname>` override.
    pub fn from_override(value: &str) -> Option<Self> {
        let (hostid, hostname) = value.split_once(':')?;
        let (hostid, hostname) = (hostid.trim(), hostname.trim());
        if hostid.is_empty() || hostname.is_empty() {
            return None;
        }
        Some(Self::new(hostid, hostname))
    }

    pub fn detect() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        let hostid = MACHINE_ID_PATHS
            .iter()
            .find_map(|path| fs::read_to_string(path).ok())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("No machine id found; deriving one from the hostname");
                checksum_bytes(hostname.as_bytes())
            });

        Self { hostid, hostname }
    }
}

/// Caller-facing summary of one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    pub is_current: bool,
    pub hostname: String,
    pub share_inventory: bool,
}

/// The registry as shared between the query path and the sync thread.
pub type SharedRegistry = Arc<RwLock<HostRegistry>>;

pub fn read_registry(registry: &SharedRegistry) -> Result<RwLockReadGuard<'_, HostRegistry>> {
    registry
        .read()
        .map_err(|e| OneconfError::LockError(format!("host registry: {}", e)))
}

pub fn write_registry(registry: &SharedRegistry) -> Result<RwLockWriteGuard<'_, HostRegistry>> {
    registry
        .write()
        .map_err(|e| OneconfError::LockError(format!("host registry: {}", e)))
}

pub struct HostRegistry {
    layout: CacheLayout,
    current: HostData,
    other_hosts: OtherHostsFile,
    pending: PendingUploads,
}

impl HostRegistry {
    /// Load or create the current host record under `cache_root`.
    pub fn open(cache_root: impl Into<PathBuf>, identity: &HostIdentity) -> Result<Self> {
        let layout = CacheLayout::new(cache_root, identity.hostid.clone());
        let host_dir = layout.host_dir();
        fs::create_dir_all(&host_dir).map_err(|e| OneconfError::IoError {
            path: host_dir.clone(),
            source: e,
        })?;

        let stored = load_json::<HostData>(&layout.host_file())
            .filter(|host| host.hostid == identity.hostid);
        let (current, dirty) = match stored {
            Some(mut host) => {
                let renamed = host.hostname != identity.hostname;
                if renamed {
                    tracing::debug!(
                        "Hostname changed from {} to {}",
                        host.hostname,
                        identity.hostname
                    );
                    host.hostname = identity.hostname.clone();
                }
                (host, renamed)
            }
            None => {
                tracing::debug!("Registering current host {}", identity.hostid);
                (HostData::new(&identity.hostid, &identity.hostname), true)
            }
        };

        let mut registry = Self {
            other_hosts: load_json_or_default(&layout.other_hosts_file()),
            pending: load_json_or_default(&layout.pending_upload_file()),
            layout,
            current,
        };
        if dirty {
            registry.save_host()?;
        }
        Ok(registry)
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Re-read the files another process (the sync service) may have updated.
    pub fn reload(&mut self) {
        self.other_hosts = load_json_or_default(&self.layout.other_hosts_file());
        self.reload_pending();
        self.reload_host();
    }

    fn reload_host(&mut self) {
        if let Some(host) = load_json::<HostData>(&self.layout.host_file())
            .filter(|host| host.hostid == self.current.hostid)
        {
            self.current = host;
        }
    }

    fn reload_pending(&mut self) {
        self.pending = load_json_or_default(&self.layout.pending_upload_file());
    }

    /// Change one field of the current host record on top of what is on disk,
    /// so fields another process wrote meanwhile survive. Writes only when the
    /// record changed.
    fn modify_host(&mut self, change: impl FnOnce(&mut HostData)) -> Result<()> {
        self.reload_host();
        let before = self.current.clone();
        change(&mut self.current);
        if self.current == before {
            return Ok(());
        }
        self.save_host()
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn current_host(&self) -> &HostData {
        &self.current
    }

    pub fn current_hostid(&self) -> &str {
        &self.current.hostid
    }

    pub fn is_current(&self, hostid: &str) -> bool {
        self.current.hostid == hostid
    }

    pub fn other_hosts(&self) -> &HostMap {
        &self.other_hosts.hosts
    }

    pub fn other_hosts_etag(&self) -> Option<&str> {
        self.other_hosts.etag.as_deref()
    }

    fn save_host(&self) -> Result<()> {
        tracing::debug!("Save current host to disk");
        write_json_atomically(&self.layout.host_file(), &self.current)
    }

    pub fn get_host(&self, hostid: &str) -> Result<HostSummary> {
        if self.is_current(hostid) {
            return Ok(self.current_summary());
        }
        self.other_hosts
            .hosts
            .get(hostid)
            .map(|meta| self.other_summary(hostid, meta))
            .ok_or_else(|| OneconfError::UnknownHostId(hostid.to_string()))
    }

    fn current_summary(&self) -> HostSummary {
        HostSummary {
            is_current: true,
            hostname: self.current.hostname.clone(),
            share_inventory: self.current.share_inventory,
        }
    }

    /// Other hosts are shared by definition, unless we queued their removal.
    fn other_summary(&self, hostid: &str, meta: &HostMetadata) -> HostSummary {
        HostSummary {
            is_current: false,
            hostname: meta.hostname.clone(),
            share_inventory: !self.is_pending_unshare(hostid),
        }
    }

    fn is_pending_unshare(&self, hostid: &str) -> bool {
        self.pending_change(hostid, SHARE_INVENTORY_KEY) == Some(&Value::Bool(false))
    }

    pub fn gethostname_by_id(&self, hostid: &str) -> Result<String> {
        self.get_host(hostid).map(|host| host.hostname)
    }

    /// Resolve a display name to its host id; ambiguity is an error.
    pub fn gethostid_by_name(&self, hostname: &str) -> Result<String> {
        let mut candidates = Vec::new();
        if self.current.hostname == hostname {
            candidates.push(self.current.hostid.clone());
        }
        candidates.extend(
            self.other_hosts
                .hosts
                .iter()
                .filter(|(_, meta)| meta.hostname == hostname)
                .map(|(hostid, _)| hostid.clone()),
        );

        match candidates.len() {
            0 => Err(OneconfError::UnknownHostname(hostname.to_string())),
            1 => Ok(candidates.remove(0)),
            _ => Err(OneconfError::AmbiguousHostname {
                hostname: hostname.to_string(),
                candidates,
            }),
        }
    }

    /// Pick a host from an optional id or name; neither means the current one.
    /// Empty strings count as absent.
    pub fn resolve(&self, hostid: Option<&str>, hostname: Option<&str>) -> Result<String> {
        let hostid = hostid.filter(|id| !id.is_empty());
        let hostname = hostname.filter(|name| !name.is_empty());
        match (hostid, hostname) {
            (Some(hostid), _) => {
                self.get_host(hostid)?;
                Ok(hostid.to_string())
            }
            (None, Some(hostname)) => self.gethostid_by_name(hostname),
            (None, None) => Ok(self.current.hostid.clone()),
        }
    }

    pub fn all_hosts(&self) -> BTreeMap<String, HostSummary> {
        tracing::debug!("Request to compute a list of all hosts");
        let mut result = BTreeMap::new();
        result.insert(self.current.hostid.clone(), self.current_summary());
        for (hostid, meta) in &self.other_hosts.hosts {
            result.insert(hostid.clone(), self.other_summary(hostid, meta));
        }
        result
    }

    /// Change whether a host's inventory is shared. `None` (or an empty id)
    /// targets the current host.
    ///
    /// Turning sharing off for a host the catalog may hold queues a remote
    /// removal; turning it back on cancels the queued removal.
    pub fn set_share_inventory(&mut self, share: bool, hostid: Option<&str>) -> Result<()> {
        let target = hostid
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.current.hostid)
            .to_string();
        tracing::debug!("Update share_inventory state of {} to {}", target, share);

        if self.is_current(&target) {
            let mut previously_shared = false;
            self.modify_host(|host| {
                previously_shared = host.share_inventory;
                host.share_inventory = share;
            })?;
            if share {
                self.remove_pending_change(&target)?;
            } else if previously_shared {
                self.add_pending_change(&target, SHARE_INVENTORY_KEY, Value::Bool(false))?;
            }
            return Ok(());
        }

        self.get_host(&target)?;
        if share {
            self.remove_pending_change(&target)
        } else {
            self.add_pending_change(&target, SHARE_INVENTORY_KEY, Value::Bool(false))
        }
    }

    pub fn set_packages_checksum(&mut self, checksum: Option<String>) -> Result<()> {
        self.modify_host(|host| host.packages_checksum = checksum)
    }

    /// Remember which package list the catalog accepted last.
    pub fn set_pushed_packages_checksum(&mut self, checksum: Option<String>) -> Result<()> {
        self.modify_host(|host| host.pushed_packages_checksum = checksum)
    }

    pub fn set_logo_checksum(&mut self, checksum: Option<String>) -> Result<()> {
        self.modify_host(|host| host.logo_checksum = checksum)
    }

    /// Replace the cached view of other hosts.
    ///
    /// Artifacts of hosts that disappeared are deleted (best effort). Returns
    /// the ids that were dropped.
    pub fn update_other_hosts(&mut self, etag: Option<String>, hosts: HostMap) -> Result<Vec<String>> {
        let file = OtherHostsFile { etag, hosts };
        write_json_atomically(&self.layout.other_hosts_file(), &file)?;

        let removed: Vec<String> = self
            .other_hosts
            .hosts
            .keys()
            .filter(|hostid| !file.hosts.contains_key(*hostid))
            .cloned()
            .collect();
        for hostid in &removed {
            for path in self.layout.artifacts_for(hostid) {
                remove_file_best_effort(&path);
            }
        }

        self.other_hosts = file;
        Ok(removed)
    }

    /// Drop one other host locally after the catalog confirmed its removal.
    pub fn forget_other_host(&mut self, hostid: &str) -> Result<bool> {
        if !self.other_hosts.hosts.contains_key(hostid) {
            return Ok(false);
        }
        let mut hosts = self.other_hosts.hosts.clone();
        hosts.remove(hostid);
        // The next pull must rewrite the file whatever the catalog says.
        self.update_other_hosts(None, hosts)?;
        Ok(true)
    }

    pub fn pending_changes(&self) -> &PendingUploads {
        &self.pending
    }

    pub fn pending_change(&self, hostid: &str, key: &str) -> Option<&Value> {
        self.pending.get(hostid).and_then(|changes| changes.get(key))
    }

    pub fn add_pending_change(&mut self, hostid: &str, key: &str, value: Value) -> Result<()> {
        self.reload_pending();
        self.pending
            .entry(hostid.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.save_pending()
    }

    /// Remove every queued change for `hostid`.
    pub fn remove_pending_change(&mut self, hostid: &str) -> Result<()> {
        self.reload_pending();
        if self.pending.remove(hostid).is_none() {
            return Ok(());
        }
        self.save_pending()
    }

    fn save_pending(&self) -> Result<()> {
        let path = self.layout.pending_upload_file();
        if self.pending.is_empty() {
            remove_file_best_effort(&path);
            return Ok(());
        }
        write_json_atomically(&path, &self.pending)
    }

    /// Unix timestamp of the last completed sync, if any.
    pub fn last_sync_date(&self) -> Option<f64> {
        load_json::<LastSync>(&self.layout.last_sync_file()).map(|sync| sync.last_sync)
    }

    pub fn record_sync(&self, timestamp: f64) -> Result<()> {
        write_json_atomically(
            &self.layout.last_sync_file(),
            &LastSync {
                last_sync: timestamp,
            },
        )
    }

    pub fn logo_path(&self, hostid: &str) -> PathBuf {
        self.layout.logo_file(hostid)
    }
}
