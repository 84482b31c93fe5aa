use crate::core::types::PackageList;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The `host` file: the current host record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostData {
    pub hostid: String,
    pub hostname: String,
    #[serde(default)]
    pub share_inventory: bool,
    #[serde(default)]
    pub packages_checksum: Option<String>,
    #[serde(default)]
    pub logo_checksum: Option<String>,
    /// `packages_checksum` as of the last upload the catalog accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_packages_checksum: Option<String>,
}

impl HostData {
    pub fn new(hostid: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            hostid: hostid.into(),
            hostname: hostname.into(),
            share_inventory: false,
            packages_checksum: None,
            logo_checksum: None,
            pushed_packages_checksum: None,
        }
    }
}

/// What the catalog (and our cache) knows about another host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetadata {
    pub hostname: String,
    #[serde(default)]
    pub logo_checksum: Option<String>,
    #[serde(default)]
    pub packages_checksum: Option<String>,
}

pub type HostMap = BTreeMap<String, HostMetadata>;

/// The `other_hosts` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OtherHostsFile {
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub hosts: HostMap,
}

/// The `package_list_<hostid>` files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PackageListFile {
    #[serde(rename = "ETag", default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub package_list: PackageList,
}

/// Key of the one pending operation the sync engine knows how to replay.
pub const SHARE_INVENTORY_KEY: &str = "share_inventory";

/// The `pending_upload` file: hostid -> requested remote mutations.
pub type PendingUploads = BTreeMap<String, BTreeMap<String, Value>>;

/// The `last_sync` file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastSync {
    pub last_sync: f64,
}

/// Payload sent to the catalog when pushing a package list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagesUpload {
    pub package_checksum: String,
    pub package_list: PackageList,
}
