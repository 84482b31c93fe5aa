use super::DistroPolicy;
use crate::error::Result;

/// No default install knowledge: every manual package counts.
pub(super) fn policy() -> Result<DistroPolicy> {
    DistroPolicy::builder("generic").build()
}
