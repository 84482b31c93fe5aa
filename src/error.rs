use crate::remote::RemoteError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OneconfError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error at '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    StdIoError(#[from] std::io::Error),

    #[error("Parsing error in '{file}': {message}")]
    ParseError { file: String, message: String },

    #[error("KDL parse error: {0}")]
    KdlError(#[from] kdl::KdlError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// No host registered under this id
    #[error("No hostname registered for this id: {0}")]
    UnknownHostId(String),

    /// No host registered under this name
    #[error("No hostid registered for this hostname: {0}")]
    UnknownHostname(String),

    /// Several hosts share the requested name; callers must pick by id
    #[error(
        "Multiple hostids registered for the hostname '{hostname}' ({}). Use the host id instead.",
        .candidates.join(", ")
    )]
    AmbiguousHostname {
        hostname: String,
        candidates: Vec<String>,
    },

    #[error("Package source error: {0}")]
    PackageSourceError(String),

    #[error("Unknown distribution policy: {0}")]
    UnknownDistro(String),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),

    /// Lock acquisition failed (e.g., mutex poisoned)
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// Path resolution or validation error
    #[error("Path error: {0}")]
    PathError(String),

    #[error("Remote catalog error: {0}")]
    Remote(#[from] RemoteError),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("{0}")]
    Other(String),
}

impl OneconfError {
    /// Lookup failures callers should report instead of guessing a host.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownHostId(_) | Self::UnknownHostname(_) | Self::AmbiguousHostname { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OneconfError>;
