//! # Package Sources
//!
//! The classifier never talks to a package manager directly. It consumes
//! [`InstalledPackage`](crate::core::types::InstalledPackage) facts from a
//! [`PackageSource`]:
//!
//! - **dpkg** (`dpkg.rs`): the dpkg status database plus apt's auto marks
//! - **snapshot** (`snapshot.rs`): a JSON dump of package facts, for offline
//!   runs and fixtures

pub mod dpkg;
pub mod snapshot;
pub mod traits;

pub use dpkg::DpkgSource;
pub use snapshot::{SnapshotSource, StaticSource};
pub use traits::PackageSource;

/// Build a source from its settings value: `dpkg` or a path to a snapshot.
pub fn create_source(spec: &str) -> Box<dyn PackageSource> {
    match spec.trim() {
        "" | "dpkg" => Box::new(DpkgSource::system()),
        path => Box::new(SnapshotSource::new(path)),
    }
}
