use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a directory could not be listed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Permission denied: cannot read {}", .0.display())]
    Access(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to read {}: {kind}", .path.display())]
    Io { path: PathBuf, kind: io::ErrorKind },
}

impl ScanError {
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => ScanError::NotFound(path),
            io::ErrorKind::PermissionDenied => ScanError::Access(path),
            io::ErrorKind::NotADirectory => ScanError::NotADirectory(path),
            kind => ScanError::Io { path, kind },
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ScanError::NotFound(path)
            | ScanError::Access(path)
            | ScanError::NotADirectory(path)
            | ScanError::Io { path, .. } => path,
        }
    }

    /// True when the directory itself is gone rather than merely unreadable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScanError::NotFound(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatchError {
    #[error("File watch unavailable for {}: {reason}", .path.display())]
    Unavailable { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("State store error: {0}")]
    Store(#[from] heed::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),
}
