use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Read and parse a cache file.
///
/// Missing file: `None`. Unreadable or corrupted file: logged, then `None`,
/// so the caller regenerates it on the next write.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No file found for {}", path.display());
            return None;
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<T>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                "Cache file {} is corrupted ({}); treating it as absent",
                path.display(),
                e
            );
            None
        }
    }
}

pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    load_json(path).unwrap_or_default()
}
