use crate::error::{OneconfError, Result};
use crate::project_identity;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const LOCK_FILENAME: &str = "service.lock";

/// Held for the lifetime of the background service; one per cache root.
pub struct InstanceLock {
    _file: File,
    path: PathBuf,
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

pub fn acquire_lock(cache_root: &Path) -> Result<InstanceLock> {
    fs::create_dir_all(cache_root).map_err(|e| OneconfError::IoError {
        path: cache_root.to_path_buf(),
        source: e,
    })?;
    let lock_path = cache_root.join(LOCK_FILENAME);

    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| OneconfError::IoError {
            path: lock_path.clone(),
            source: e,
        })?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(OneconfError::LockError(format!(
            "Another {} service is currently running.\n\
             Lock file: {}",
            project_identity::BINARY_NAME,
            lock_path.display(),
        )));
    }

    // The pid is informational; the flock is what excludes.
    if let Err(e) = write_owner(&lock_file) {
        tracing::debug!("Failed to record pid in {}: {}", lock_path.display(), e);
    }

    Ok(InstanceLock {
        _file: lock_file,
        path: lock_path,
    })
}

fn write_owner(mut lock_file: &File) -> io::Result<()> {
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::acquire_lock;
    use tempfile::tempdir;

    #[test]
    fn lock_contention_returns_error() {
        let dir = tempdir().expect("tempdir");

        let _lock = acquire_lock(dir.path()).expect("first lock");
        match acquire_lock(dir.path()) {
            Ok(_) => panic!("second lock should fail"),
            Err(err) => assert!(err.to_string().contains("currently running")),
        }
    }

    #[test]
    fn lock_file_records_owner_pid_and_is_removed() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(super::LOCK_FILENAME);

        let lock = acquire_lock(dir.path()).expect("lock");
        let content = std::fs::read_to_string(&path).expect("lock file");
        assert_eq!(content.trim(), std::process::id().to_string());

        drop(lock);
        assert!(!path.exists());
        acquire_lock(dir.path()).expect("lock again");
    }
}
