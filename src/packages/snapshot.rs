//! Package facts loaded from a JSON snapshot instead of a live database.

use super::traits::PackageSource;
use crate::core::types::InstalledPackage;
use crate::error::{OneconfError, Result};
use std::fs;
use std::path::PathBuf;

pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PackageSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn is_available(&self) -> bool {
        self.path.exists()
    }

    fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        let content = fs::read_to_string(&self.path).map_err(|e| OneconfError::IoError {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| OneconfError::ParseError {
            file: self.path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// In-memory source, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    packages: Vec<InstalledPackage>,
}

impl StaticSource {
    pub fn new(packages: Vec<InstalledPackage>) -> Self {
        Self { packages }
    }
}

impl PackageSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        Ok(self.packages.clone())
    }
}
