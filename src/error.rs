use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the deployer or the launcher can surface.
///
/// Leaf functions never terminate the process; they return one of these and
/// the binaries decide how to exit.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read manifest {path:?}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse manifest {path:?}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Manifest conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid layout: {message}")]
    Layout { message: String },

    #[error("Cannot resolve toolset '{toolset}': {message}")]
    Resolve { toolset: String, message: String },

    #[error("Failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to unpack {archive:?}")]
    Unpack {
        archive: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Failed to link alias '{alias}' at {path:?}")]
    Link {
        alias: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read launcher config {path:?}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse launcher config {path:?}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to launch {program:?}")]
    Launch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error during {operation} at {path:?}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start fetch runtime")]
    Runtime(#[source] io::Error),
}

impl Error {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout {
            message: message.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Fetch {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn unpack(archive: &Path, source: impl Into<BoxError>) -> Self {
        Self::Unpack {
            archive: archive.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn link(alias: &str, path: &Path, source: io::Error) -> Self {
        Self::Link {
            alias: alias.to_string(),
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.to_path_buf(),
            source,
        }
    }
}
