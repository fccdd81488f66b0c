use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("IO error at {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Metadata extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("Gallery root is not a directory: {root}")]
    RootNotFound { root: PathBuf },

    #[error("Not a vgloss gallery (missing data directory): {root}")]
    NotInitialized { root: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Attach path context to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Path {
            path: path.into(),
            source,
        }
    }

    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the underlying cause is a file that no longer exists.
    pub fn is_vanished(&self) -> bool {
        match self {
            Self::Io(e) | Self::Path { source: e, .. } => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
