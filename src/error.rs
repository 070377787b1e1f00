//! Error types for the orchestration engine.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UacError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} already exists: {key}")]
    Conflict { kind: &'static str, key: String },

    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Permission denied writing {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("IO error on {}: {source}", path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl UacError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn conflict(kind: &'static str, key: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            key: key.into(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Attach a path to an I/O error, promoting EACCES/EPERM to `PermissionDenied`.
    pub fn io_at(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            Self::IoAt {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Errors caused by the request itself rather than by the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Conflict { .. } | Self::Invalid { .. }
        )
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, UacError>;
