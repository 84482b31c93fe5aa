//! Cache file I/O.
//!
//! Every write goes through a temp file renamed over the target, so a reader
//! sees the old or the new content and never a torn file. Every read treats a
//! missing or corrupted file as absent: the cache can always be regenerated
//! by the next update or sync.

mod load_recovery;
mod locking;
mod persist;

pub use load_recovery::{load_json, load_json_or_default};
pub use locking::{InstanceLock, acquire_lock};
pub use persist::{StagedWrite, stage_json, write_bytes_atomically, write_json_atomically};

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Delete a file, ignoring "already gone". Other failures are logged only.
pub fn remove_file_best_effort(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}
