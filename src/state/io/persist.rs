use crate::error::{OneconfError, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const TEMP_SUFFIX: &str = "new";

/// Content written next to its target but not yet visible to readers.
///
/// Dropping a `StagedWrite` without committing leaves the target untouched,
/// which is exactly what a crash between write and rename looks like.
#[derive(Debug)]
#[must_use = "a staged write is invisible until committed"]
pub struct StagedWrite {
    tmp_path: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn commit(self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.target).map_err(|e| OneconfError::IoError {
            path: self.target.clone(),
            source: e,
        })?;

        if let Some(dir) = self.target.parent()
            && let Ok(dir_file) = fs::File::open(dir)
            && let Err(e) = dir_file.sync_all()
        {
            tracing::debug!("Failed to sync cache directory {}: {}", dir.display(), e);
        }

        Ok(())
    }
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        OneconfError::PathError(format!("Invalid cache path (no file name): {}", path.display()))
    })?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".");
    tmp_name.push(TEMP_SUFFIX);
    Ok(path.with_file_name(tmp_name))
}

/// Serialize `value` into the temp file for `path`, creating parent dirs.
pub fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<StagedWrite> {
    let dir = path.parent().ok_or_else(|| {
        OneconfError::PathError(format!(
            "Invalid cache path (no parent directory): {}",
            path.display()
        ))
    })?;
    fs::create_dir_all(dir).map_err(|e| OneconfError::IoError {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let content = serde_json::to_string(value)
        .map_err(|e| OneconfError::SerializationError(format!("{}: {}", path.display(), e)))?;

    let tmp_path = temp_path_for(path)?;
    let mut tmp_file = fs::File::create(&tmp_path).map_err(|e| OneconfError::IoError {
        path: tmp_path.clone(),
        source: e,
    })?;
    tmp_file.write_all(content.as_bytes())?;
    tmp_file.sync_all()?;

    Ok(StagedWrite {
        tmp_path,
        target: path.to_path_buf(),
    })
}

pub fn write_json_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    tracing::debug!("Saving updated {} to disk", path.display());
    stage_json(path, value)?.commit()
}

/// Same discipline for raw bytes (logos).
pub fn write_bytes_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| OneconfError::IoError {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    let tmp_path = temp_path_for(path)?;
    fs::write(&tmp_path, bytes).map_err(|e| OneconfError::IoError {
        path: tmp_path.clone(),
        source: e,
    })?;
    StagedWrite {
        tmp_path,
        target: path.to_path_buf(),
    }
    .commit()
}
