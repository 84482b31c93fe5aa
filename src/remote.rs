//! # Remote Catalog
//!
//! The sync engine only sees the [`RemoteCatalog`] trait. Two implementations:
//!
//! - **http** (`http.rs`): the web catalog, REST over `reqwest`
//! - **silo** (`silo.rs`): one JSON file standing in for the catalog, for
//!   offline runs and tests (supports injected failures)
//!
//! Every call may fail. A failed call means "this sub-step did not happen";
//! callers never apply a partial result.

pub mod http;
pub mod silo;

pub use http::HttpCatalog;
pub use silo::{SiloCall, SiloCatalog, SiloContent, SiloOperation};

use crate::core::types::PackageList;
use crate::state::types::HostMetadata;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The catalog could not be reached at all
    #[error("Catalog unreachable: {0}")]
    Offline(String),

    /// Credentials missing, expired or refused
    #[error("Catalog refused the credentials")]
    Unauthorized,

    #[error("Not found in catalog: {0}")]
    NotFound(String),

    #[error("Catalog answered HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid catalog response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Errors meaning we lost the network or the credentials: a sync cycle
    /// seeing one stops instead of trying the next call.
    pub fn is_connectivity_loss(&self) -> bool {
        matches!(self, Self::Offline(_) | Self::Unauthorized)
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// One machine as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMachine {
    pub id: String,
    pub hostname: String,
    #[serde(default)]
    pub logo_checksum: Option<String>,
    #[serde(default)]
    pub packages_checksum: Option<String>,
}

impl RemoteMachine {
    pub fn metadata(&self) -> HostMetadata {
        HostMetadata {
            hostname: self.hostname.clone(),
            logo_checksum: self.logo_checksum.clone(),
            packages_checksum: self.packages_checksum.clone(),
        }
    }
}

pub trait RemoteCatalog: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &str;

    fn list_machines(&self) -> RemoteResult<Vec<RemoteMachine>>;

    /// Logo bytes, or `None` when the machine has none.
    fn get_machine_logo(&self, machine_id: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Create or update a machine record.
    fn update_machine(
        &self,
        machine_id: &str,
        hostname: &str,
        logo_checksum: Option<&str>,
    ) -> RemoteResult<()>;

    fn update_machine_logo(
        &self,
        machine_id: &str,
        logo_checksum: &str,
        logo: &[u8],
    ) -> RemoteResult<()>;

    fn delete_machine(&self, machine_id: &str) -> RemoteResult<()>;

    fn list_packages(&self, machine_id: &str) -> RemoteResult<PackageList>;

    fn update_packages(
        &self,
        machine_id: &str,
        packages_checksum: &str,
        packages: &PackageList,
    ) -> RemoteResult<()>;
}

/// A shared catalog is a catalog: lets callers keep a handle on the one the
/// sync engine owns.
impl<C: RemoteCatalog + ?Sized> RemoteCatalog for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn list_machines(&self) -> RemoteResult<Vec<RemoteMachine>> {
        (**self).list_machines()
    }

    fn get_machine_logo(&self, machine_id: &str) -> RemoteResult<Option<Vec<u8>>> {
        (**self).get_machine_logo(machine_id)
    }

    fn update_machine(
        &self,
        machine_id: &str,
        hostname: &str,
        logo_checksum: Option<&str>,
    ) -> RemoteResult<()> {
        (**self).update_machine(machine_id, hostname, logo_checksum)
    }

    fn update_machine_logo(
        &self,
        machine_id: &str,
        logo_checksum: &str,
        logo: &[u8],
    ) -> RemoteResult<()> {
        (**self).update_machine_logo(machine_id, logo_checksum, logo)
    }

    fn delete_machine(&self, machine_id: &str) -> RemoteResult<()> {
        (**self).delete_machine(machine_id)
    }

    fn list_packages(&self, machine_id: &str) -> RemoteResult<PackageList> {
        (**self).list_packages(machine_id)
    }

    fn update_packages(
        &self,
        machine_id: &str,
        packages_checksum: &str,
        packages: &PackageList,
    ) -> RemoteResult<()> {
        (**self).update_packages(machine_id, packages_checksum, packages)
    }
}
