use crate::core::types::InstalledPackage;
use crate::error::Result;

/// Capability reporting what the package manager has installed.
pub trait PackageSource: Send + Sync {
    /// Short name for diagnostics ("dpkg", "snapshot").
    fn name(&self) -> &str;

    /// Every package the package manager knows as installed, with metadata.
    fn installed_packages(&self) -> Result<Vec<InstalledPackage>>;

    fn is_available(&self) -> bool {
        true
    }
}
