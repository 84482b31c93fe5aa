//! File-backed catalog.
//!
//! The whole catalog lives in one JSON document:
//!
//! ```json
//! {
//!   "hosts_metadata": {"<id>": {"hostname": "...", "logo_checksum": null, "packages_checksum": "..."}},
//!   "packages_metadata": {"<id>": {"package_checksum": "...", "package_list": {"foo": {"auto": false}}}},
//!   "logos": {"<id>": "<hex bytes>"}
//! }
//! ```
//!
//! Failures can be injected per operation, and every call is recorded, so
//! tests can check what a sync cycle sent out.

use super::{RemoteCatalog, RemoteError, RemoteMachine, RemoteResult};
use crate::core::types::PackageList;
use crate::state::io::write_json_atomically;
use crate::state::types::{HostMap, HostMetadata, PackagesUpload};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiloOperation {
    ListMachines,
    GetMachineLogo,
    UpdateMachine,
    UpdateMachineLogo,
    DeleteMachine,
    ListPackages,
    UpdatePackages,
}

/// A recorded call: the operation and the machine it targeted (empty for
/// `ListMachines`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiloCall {
    pub operation: SiloOperation,
    pub machine_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SiloContent {
    #[serde(default)]
    pub hosts_metadata: HostMap,
    #[serde(default)]
    pub packages_metadata: BTreeMap<String, PackagesUpload>,
    #[serde(default)]
    pub logos: BTreeMap<String, String>,
}

pub struct SiloCatalog {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    file_lock: Mutex<()>,
    failures: Mutex<HashMap<SiloOperation, RemoteError>>,
    calls: Mutex<Vec<SiloCall>>,
}

impl SiloCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Mutex::new(()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make every later `operation` call fail with `error`.
    pub fn fail_on(&self, operation: SiloOperation, error: RemoteError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(operation, error);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    pub fn calls(&self) -> Vec<SiloCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, machine_id: &str) -> Vec<SiloOperation> {
        self.calls()
            .into_iter()
            .filter(|call| call.machine_id == machine_id)
            .map(|call| call.operation)
            .collect()
    }

    /// Current catalog content, straight from the file.
    pub fn snapshot(&self) -> RemoteResult<SiloContent> {
        let _guard = self.lock_file()?;
        self.read()
    }

    fn lock_file(&self) -> RemoteResult<std::sync::MutexGuard<'_, ()>> {
        self.file_lock
            .lock()
            .map_err(|e| RemoteError::Transport(format!("silo lock poisoned: {}", e)))
    }

    fn enter(&self, operation: SiloOperation, machine_id: &str) -> RemoteResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(SiloCall {
                operation,
                machine_id: machine_id.to_string(),
            });
        }
        let failure = self
            .failures
            .lock()
            .ok()
            .and_then(|failures| failures.get(&operation).cloned());
        match failure {
            Some(error) => {
                tracing::debug!("Injected silo failure for {:?}: {}", operation, error);
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn read(&self) -> RemoteResult<SiloContent> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| RemoteError::Decode(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SiloContent::default()),
            Err(e) => Err(RemoteError::Transport(e.to_string())),
        }
    }

    fn modify<F>(&self, change: F) -> RemoteResult<()>
    where
        F: FnOnce(&mut SiloContent) -> RemoteResult<()>,
    {
        let _guard = self.lock_file()?;
        let mut content = self.read()?;
        change(&mut content)?;
        write_json_atomically(&self.path, &content)
            .map_err(|e| RemoteError::Transport(e.to_string()))
    }
}

impl RemoteCatalog for SiloCatalog {
    fn name(&self) -> &str {
        "silo"
    }

    fn list_machines(&self) -> RemoteResult<Vec<RemoteMachine>> {
        self.enter(SiloOperation::ListMachines, "")?;
        Ok(self
            .snapshot()?
            .hosts_metadata
            .into_iter()
            .map(|(id, meta)| RemoteMachine {
                id,
                hostname: meta.hostname,
                logo_checksum: meta.logo_checksum,
                packages_checksum: meta.packages_checksum,
            })
            .collect())
    }

    fn get_machine_logo(&self, machine_id: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.enter(SiloOperation::GetMachineLogo, machine_id)?;
        match self.snapshot()?.logos.get(machine_id) {
            Some(encoded) => hex::decode(encoded)
                .map(Some)
                .map_err(|e| RemoteError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    fn update_machine(
        &self,
        machine_id: &str,
        hostname: &str,
        logo_checksum: Option<&str>,
    ) -> RemoteResult<()> {
        self.enter(SiloOperation::UpdateMachine, machine_id)?;
        self.modify(|content| {
            let entry = content
                .hosts_metadata
                .entry(machine_id.to_string())
                .or_insert_with(|| HostMetadata {
                    hostname: hostname.to_string(),
                    logo_checksum: None,
                    packages_checksum: None,
                });
            entry.hostname = hostname.to_string();
            entry.logo_checksum = logo_checksum.map(str::to_string);
            Ok(())
        })
    }

    fn update_machine_logo(
        &self,
        machine_id: &str,
        logo_checksum: &str,
        logo: &[u8],
    ) -> RemoteResult<()> {
        self.enter(SiloOperation::UpdateMachineLogo, machine_id)?;
        self.modify(|content| {
            let entry = content
                .hosts_metadata
                .get_mut(machine_id)
                .ok_or_else(|| RemoteError::NotFound(machine_id.to_string()))?;
            entry.logo_checksum = Some(logo_checksum.to_string());
            content
                .logos
                .insert(machine_id.to_string(), hex::encode(logo));
            Ok(())
        })
    }

    fn delete_machine(&self, machine_id: &str) -> RemoteResult<()> {
        self.enter(SiloOperation::DeleteMachine, machine_id)?;
        self.modify(|content| {
            if content.hosts_metadata.remove(machine_id).is_none() {
                return Err(RemoteError::NotFound(machine_id.to_string()));
            }
            content.packages_metadata.remove(machine_id);
            content.logos.remove(machine_id);
            Ok(())
        })
    }

    fn list_packages(&self, machine_id: &str) -> RemoteResult<PackageList> {
        self.enter(SiloOperation::ListPackages, machine_id)?;
        self.snapshot()?
            .packages_metadata
            .remove(machine_id)
            .map(|upload| upload.package_list)
            .ok_or_else(|| RemoteError::NotFound(machine_id.to_string()))
    }

    fn update_packages(
        &self,
        machine_id: &str,
        packages_checksum: &str,
        packages: &PackageList,
    ) -> RemoteResult<()> {
        self.enter(SiloOperation::UpdatePackages, machine_id)?;
        self.modify(|content| {
            if let Some(host) = content.hosts_metadata.get_mut(machine_id) {
                host.packages_checksum = Some(packages_checksum.to_string());
            }
            content.packages_metadata.insert(
                machine_id.to_string(),
                PackagesUpload {
                    package_checksum: packages_checksum.to_string(),
                    package_list: packages.clone(),
                },
            );
            Ok(())
        })
    }
}
