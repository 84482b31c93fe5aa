//! # Sync Engine
//!
//! One sync cycle reconciles the local cache with the remote catalog:
//!
//! 1. **pull hosts**: refresh `other_hosts` (and changed logos) when the
//!    catalog's host list differs from ours
//! 2. **pull packages**: refresh every other host's package list whose remote
//!    checksum differs from the cached token
//! 3. **push host**: register or update the current host, only if shared
//! 4. **push packages**: upload the current list when its checksum differs
//!    from the one the catalog holds, only if shared
//! 5. **pending removals**: replay queued remote deletions
//!
//! Each remote call is isolated: a failure skips that sub-step and the cycle
//! moves on. Losing network or credentials stops the cycle where it is;
//! already written files stay valid. Caches are invalidated before the
//! matching [`SyncEvent`] is sent.

pub mod scheduler;

pub use scheduler::{SchedulerHandle, SyncScheduler};

use crate::core::checksum::{checksum_bytes, checksum_of};
use crate::error::Result;
use crate::hosts::{read_registry, write_registry};
use crate::remote::{RemoteCatalog, RemoteError, RemoteMachine, RemoteResult};
use crate::state::io::write_bytes_atomically;
use crate::state::types::{HostMap, SHARE_INVENTORY_KEY};
use crate::store::PackageStore;
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{SystemTime, UNIX_EPOCH};

/// Change notifications, sent after the matching caches were invalidated.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    HostsChanged,
    PackagesChanged(String),
    LogoChanged(String),
    LastSyncChanged(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStep {
    #[default]
    PullHosts,
    PullPackages,
    PushHost,
    PushPackages,
    PendingRemovals,
}

/// What one cycle did.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub hosts_changed: bool,
    pub packages_changed: Vec<String>,
    pub logos_changed: Vec<String>,
    pub pushed_host: bool,
    pub pushed_packages: bool,
    pub removed: Vec<String>,
    pub failures: Vec<String>,
    /// Step during which connectivity was lost, if any.
    pub aborted_at: Option<SyncStep>,
    pub completed_at: Option<f64>,
    step: SyncStep,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.aborted_at.is_none()
    }
}

/// Marker for "stop the cycle here".
struct Aborted;

type Step<T = ()> = std::result::Result<T, Aborted>;

pub struct SyncEngine {
    store: Arc<PackageStore>,
    catalog: Box<dyn RemoteCatalog>,
    events: Option<Sender<SyncEvent>>,
    can_sync: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(store: Arc<PackageStore>, catalog: Box<dyn RemoteCatalog>) -> Self {
        Self {
            store,
            catalog,
            events: None,
            can_sync: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_events(mut self, events: Sender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Flag checked between remote calls; clearing it cancels a running
    /// cycle after the call in flight.
    pub fn can_sync_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.can_sync)
    }

    pub fn catalog(&self) -> &dyn RemoteCatalog {
        self.catalog.as_ref()
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            tracing::debug!("No listener for sync events");
        }
    }

    fn checkpoint(&self, report: &mut SyncReport) -> Step {
        if self.can_sync.load(Ordering::SeqCst) {
            Ok(())
        } else {
            tracing::debug!("Sync cancelled during {:?}", report.step);
            report.aborted_at = Some(report.step);
            Err(Aborted)
        }
    }

    /// Sort out a remote call: connectivity loss aborts, anything else is
    /// logged and the sub-step skipped.
    fn remote<T>(
        &self,
        report: &mut SyncReport,
        what: &str,
        result: RemoteResult<T>,
    ) -> Step<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_connectivity_loss() => {
                tracing::warn!("Stopping sync, {} failed: {}", what, e);
                report.failures.push(format!("{}: {}", what, e));
                report.aborted_at = Some(report.step);
                Err(Aborted)
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", what, e);
                report.failures.push(format!("{}: {}", what, e));
                Ok(None)
            }
        }
    }

    fn local<T>(&self, report: &mut SyncReport, what: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{} failed: {}", what, e);
                report.failures.push(format!("{}: {}", what, e));
                None
            }
        }
    }

    /// Run one full cycle. Records the last-sync date only when every step
    /// ran.
    pub fn run_cycle(&self) -> SyncReport {
        tracing::debug!("Start processing sync");
        let mut report = SyncReport::default();

        // Other processes may have changed sharing or the inventory since the
        // last cycle.
        let reloaded = write_registry(self.store.registry()).map(|mut r| r.reload());
        self.local(&mut report, "reload host registry", reloaded);
        let invalidated = self.store.invalidate_all();
        self.local(&mut report, "reset package cache", invalidated);
        if self.run_steps(&mut report).is_err() {
            tracing::info!("Sync interrupted during {:?}", report.aborted_at);
            return report;
        }

        let now = unix_now();
        let recorded = read_registry(self.store.registry()).and_then(|r| r.record_sync(now));
        if self.local(&mut report, "record last sync", recorded).is_some() {
            let refreshed = self.store.check_if_storage_refreshed();
            self.local(&mut report, "refresh package cache", refreshed);
            report.completed_at = Some(now);
            self.emit(SyncEvent::LastSyncChanged(now));
        }
        report
    }

    fn run_steps(&self, report: &mut SyncReport) -> Step {
        report.step = SyncStep::PullHosts;
        self.checkpoint(report)?;
        let machines = self.pull_hosts(report)?;

        report.step = SyncStep::PullPackages;
        self.checkpoint(report)?;
        self.pull_packages(report)?;

        let current = machines.as_ref().and_then(|machines| {
            let registry = read_registry(self.store.registry()).ok()?;
            machines
                .iter()
                .find(|m| registry.is_current(&m.id))
                .cloned()
        });

        report.step = SyncStep::PushHost;
        self.checkpoint(report)?;
        self.push_current_host(report, machines.is_some(), current.as_ref())?;

        report.step = SyncStep::PushPackages;
        self.checkpoint(report)?;
        self.push_current_packages(report, machines.is_some(), current.as_ref())?;

        report.step = SyncStep::PendingRemovals;
        self.checkpoint(report)?;
        self.process_pending_removals(report)
    }

    fn pull_hosts(&self, report: &mut SyncReport) -> Step<Option<Vec<RemoteMachine>>> {
        let listed = self.catalog.list_machines();
        let Some(machines) = self.remote(report, "list machines", listed)? else {
            return Ok(None);
        };

        let Some(mut registry) = self.local(
            report,
            "lock host registry",
            write_registry(self.store.registry()),
        ) else {
            return Ok(Some(machines));
        };

        let hosts: HostMap = machines
            .iter()
            .filter(|m| !registry.is_current(&m.id))
            .map(|m| (m.id.clone(), m.metadata()))
            .collect();
        let etag = match checksum_of(&hosts) {
            Ok(etag) => etag,
            Err(e) => {
                tracing::warn!("Could not compute host list token: {}", e);
                return Ok(Some(machines));
            }
        };
        if registry.other_hosts_etag() == Some(etag.as_str()) {
            tracing::debug!("Host list is up to date");
            return Ok(Some(machines));
        }

        let previous = registry.other_hosts().clone();
        let updated = registry.update_other_hosts(Some(etag), hosts.clone());
        drop(registry);
        let Some(removed) = self.local(report, "save other hosts", updated) else {
            return Ok(Some(machines));
        };
        for hostid in &removed {
            let invalidated = self.store.invalidate(hostid);
            self.local(report, "invalidate package cache", invalidated);
        }
        report.hosts_changed = true;
        self.emit(SyncEvent::HostsChanged);

        for (hostid, meta) in &hosts {
            let Some(checksum) = &meta.logo_checksum else {
                continue;
            };
            let logo_path = match read_registry(self.store.registry()) {
                Ok(registry) => registry.logo_path(hostid),
                Err(_) => continue,
            };
            let known = previous.get(hostid).and_then(|m| m.logo_checksum.as_ref());
            if known == Some(checksum) && logo_path.exists() {
                continue;
            }
            self.checkpoint(report)?;
            let fetched = self.catalog.get_machine_logo(hostid);
            if let Some(Some(bytes)) = self.remote(report, "fetch logo", fetched)? {
                let saved = write_bytes_atomically(&logo_path, &bytes);
                if self.local(report, "save logo", saved).is_some() {
                    report.logos_changed.push(hostid.clone());
                    self.emit(SyncEvent::LogoChanged(hostid.clone()));
                }
            }
        }

        Ok(Some(machines))
    }

    fn pull_packages(&self, report: &mut SyncReport) -> Step {
        let others = match read_registry(self.store.registry()) {
            Ok(registry) => registry.other_hosts().clone(),
            Err(e) => {
                report.failures.push(e.to_string());
                return Ok(());
            }
        };

        for (hostid, meta) in others {
            tracing::debug!("Look for refresh of package list for {}", hostid);
            let Some(remote_checksum) = meta.packages_checksum else {
                continue;
            };
            let local = self.store.package_list_etag(&hostid);
            if self.local(report, "read package list", local).flatten().as_deref()
                == Some(remote_checksum.as_str())
            {
                continue;
            }

            self.checkpoint(report)?;
            let fetched = self.catalog.list_packages(&hostid);
            let Some(list) = self.remote(report, "fetch packages", fetched)? else {
                continue;
            };
            let stored = self
                .store
                .store_package_list(&hostid, Some(remote_checksum), list);
            if self.local(report, "save package list", stored).is_some() {
                report.packages_changed.push(hostid.clone());
                self.emit(SyncEvent::PackagesChanged(hostid));
            }
        }
        Ok(())
    }

    fn push_current_host(
        &self,
        report: &mut SyncReport,
        listed: bool,
        remote: Option<&RemoteMachine>,
    ) -> Step {
        let Some(mut registry) = self.local(
            report,
            "lock host registry",
            write_registry(self.store.registry()),
        ) else {
            return Ok(());
        };
        let hostid = registry.current_hostid().to_string();

        if !registry.current_host().share_inventory {
            tracing::debug!("Ensure that current host is not shared");
            if remote.is_some() && registry.pending_change(&hostid, SHARE_INVENTORY_KEY).is_none() {
                let queued =
                    registry.add_pending_change(&hostid, SHARE_INVENTORY_KEY, Value::Bool(false));
                self.local(report, "queue removal of current host", queued);
            }
            return Ok(());
        }

        // Refresh the logo checksum from whatever logo file is in place.
        let logo_path = registry.logo_path(&hostid);
        let logo = fs::read(&logo_path).ok();
        let logo_checksum = logo.as_deref().map(checksum_bytes);
        let updated = registry.set_logo_checksum(logo_checksum.clone());
        self.local(report, "save logo checksum", updated);
        let host = registry.current_host().clone();
        drop(registry);

        let up_to_date = listed
            && remote.is_some_and(|m| {
                m.hostname == host.hostname && m.logo_checksum == host.logo_checksum
            });
        if up_to_date {
            tracing::debug!("Current host is up to date in the catalog");
            return Ok(());
        }

        tracing::debug!("Push current host to infra now");
        let pushed = self.catalog.update_machine(
            &host.hostid,
            &host.hostname,
            host.logo_checksum.as_deref(),
        );
        if self.remote(report, "update machine", pushed)?.is_none() {
            return Ok(());
        }
        report.pushed_host = true;

        if let (Some(bytes), Some(checksum)) = (logo, logo_checksum)
            && remote.and_then(|m| m.logo_checksum.as_ref()) != Some(&checksum)
        {
            self.checkpoint(report)?;
            let uploaded = self.catalog.update_machine_logo(&host.hostid, &checksum, &bytes);
            self.remote(report, "upload logo", uploaded)?;
        }
        Ok(())
    }

    /// When the machine list could not be fetched, the checksum of our last
    /// accepted upload stands in for the catalog's.
    fn push_current_packages(
        &self,
        report: &mut SyncReport,
        listed: bool,
        remote: Option<&RemoteMachine>,
    ) -> Step {
        let host = match read_registry(self.store.registry()) {
            Ok(registry) => registry.current_host().clone(),
            Err(e) => {
                report.failures.push(e.to_string());
                return Ok(());
            }
        };
        if !host.share_inventory {
            return Ok(());
        }

        tracing::debug!("Check if packages for current host need to be pushed to infra");
        let Some(checksum) = host.packages_checksum else {
            tracing::debug!("No package list computed yet, nothing to push");
            return Ok(());
        };
        let known = if listed {
            remote.and_then(|m| m.packages_checksum.as_deref())
        } else {
            host.pushed_packages_checksum.as_deref()
        };
        if known == Some(checksum.as_str()) {
            tracing::debug!("Catalog already has package list {}", checksum);
            return Ok(());
        }

        let list = self.store.get_package_list(&host.hostid);
        let Some(list) = self.local(report, "read current package list", list) else {
            return Ok(());
        };
        tracing::info!("Push new packages");
        let pushed = self.catalog.update_packages(&host.hostid, &checksum, &list);
        if self.remote(report, "update packages", pushed)?.is_some() {
            report.pushed_packages = true;
            let recorded = write_registry(self.store.registry())
                .and_then(|mut r| r.set_pushed_packages_checksum(Some(checksum)));
            self.local(report, "record pushed package list", recorded);
        }
        Ok(())
    }

    fn process_pending_removals(&self, report: &mut SyncReport) -> Step {
        let pending = match read_registry(self.store.registry()) {
            Ok(registry) => registry.pending_changes().clone(),
            Err(e) => {
                report.failures.push(e.to_string());
                return Ok(());
            }
        };

        for (hostid, changes) in pending {
            if changes.get(SHARE_INVENTORY_KEY) != Some(&Value::Bool(false)) {
                tracing::warn!("Unknown pending change for {}: {:?}", hostid, changes);
                continue;
            }
            self.checkpoint(report)?;
            tracing::debug!("Removing {} from the catalog", hostid);

            // Already gone is as good as deleted.
            let deleted = match self.catalog.delete_machine(&hostid) {
                Err(RemoteError::NotFound(_)) => Ok(()),
                other => other,
            };
            if self.remote(report, "delete machine", deleted)?.is_none() {
                continue;
            }

            let Some(mut registry) = self.local(
                report,
                "lock host registry",
                write_registry(self.store.registry()),
            ) else {
                continue;
            };
            let cleared = registry.remove_pending_change(&hostid);
            self.local(report, "clear pending change", cleared);
            let forgotten = if registry.is_current(&hostid) {
                // Sharing again must upload the list from scratch.
                registry.set_pushed_packages_checksum(None).map(|_| false)
            } else {
                registry.forget_other_host(&hostid)
            };
            drop(registry);

            report.removed.push(hostid.clone());
            if self.local(report, "forget host", forgotten) == Some(true) {
                let invalidated = self.store.invalidate(&hostid);
                self.local(report, "invalidate package cache", invalidated);
                report.hosts_changed = true;
                self.emit(SyncEvent::HostsChanged);
            }
        }
        Ok(())
    }
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests;
