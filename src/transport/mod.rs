//! Network, source-control and archive primitives used by fetch operations.
//!
//! Operations only talk to [`Transport`]; [`NetworkTransport`] is the real
//! implementation and tests substitute their own.

mod archive;
mod git;
mod http;

pub use archive::extract_archive;

use crate::error::Result;
use std::path::Path;

pub trait Transport: Send + Sync {
    /// Clone `url` into `dest`, checking out `revision` when it resolves.
    fn clone_repository(&self, url: &str, revision: &str, dest: &Path) -> Result<()>;

    /// Download `url` to the file `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Decompress `archive` into the directory `dest`.
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Transport backed by reqwest, git2 and the tar/zip decoders.
#[derive(Clone)]
pub struct NetworkTransport {
    http: http::HttpClient,
}

impl NetworkTransport {
    pub fn new(http_proxy: Option<&str>) -> Result<Self> {
        Ok(Self {
            http: http::HttpClient::new(http_proxy)?,
        })
    }
}

impl Transport for NetworkTransport {
    fn clone_repository(&self, url: &str, revision: &str, dest: &Path) -> Result<()> {
        git::clone(url, revision, dest)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.http.download(url, dest)
    }

    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        extract_archive(archive, dest)
    }
}
