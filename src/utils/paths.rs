use crate::error::{OneconfError, Result};
use crate::project_identity;
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};

pub const HOST_DATA_FILENAME: &str = "host";
pub const OTHER_HOSTS_FILENAME: &str = "other_hosts";
pub const PACKAGE_LIST_PREFIX: &str = "package_list";
pub const PENDING_UPLOAD_FILENAME: &str = "pending_upload";
pub const LAST_SYNC_DATE_FILENAME: &str = "last_sync";
pub const PACKAGE_RECORDS_FILENAME: &str = "package_records";
pub const LOGO_PREFIX: &str = "logo";

pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return Ok(path.to_path_buf());
    }

    let user_dirs = UserDirs::new().ok_or_else(|| {
        OneconfError::PathError("Could not determine user home directory".to_string())
    })?;

    let home = user_dirs.home_dir();

    if path_str == "~" {
        return Ok(home.to_path_buf());
    }

    let stripped = path_str
        .strip_prefix("~/")
        .ok_or_else(|| OneconfError::PathError(format!("Invalid path format: {}", path_str)))?;

    Ok(home.join(stripped))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", project_identity::CONFIG_DIR_NAME).ok_or_else(|| {
        OneconfError::PathError("Could not determine user directories".to_string())
    })
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(project_identity::SETTINGS_FILE_BASENAME))
}

pub fn default_cache_root() -> Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().to_path_buf())
}

/// On-disk layout of the cache: one subtree per current host id, holding the
/// files of the current host and the cached copies of every other host.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
    hostid: String,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>, current_hostid: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            hostid: current_hostid.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn host_dir(&self) -> PathBuf {
        self.root.join(&self.hostid)
    }

    pub fn host_file(&self) -> PathBuf {
        self.host_dir().join(HOST_DATA_FILENAME)
    }

    pub fn other_hosts_file(&self) -> PathBuf {
        self.host_dir().join(OTHER_HOSTS_FILENAME)
    }

    pub fn package_list_file(&self, hostid: &str) -> PathBuf {
        self.host_dir()
            .join(format!("{}_{}", PACKAGE_LIST_PREFIX, hostid))
    }

    pub fn pending_upload_file(&self) -> PathBuf {
        self.host_dir().join(PENDING_UPLOAD_FILENAME)
    }

    pub fn last_sync_file(&self) -> PathBuf {
        self.host_dir().join(LAST_SYNC_DATE_FILENAME)
    }

    pub fn package_records_file(&self) -> PathBuf {
        self.host_dir().join(PACKAGE_RECORDS_FILENAME)
    }

    pub fn logo_file(&self, hostid: &str) -> PathBuf {
        self.host_dir().join(format!("{}_{}.png", LOGO_PREFIX, hostid))
    }

    /// Files belonging to one host (other than the current one).
    pub fn artifacts_for(&self, hostid: &str) -> [PathBuf; 2] {
        [self.package_list_file(hostid), self.logo_file(hostid)]
    }
}
