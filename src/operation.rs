use crate::error::{Error, Result};
use crate::manifest::{package_name, Manifest, Toolset};
use crate::transport::Transport;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// URL suffix that selects a source-control clone instead of a download.
pub const CLONE_SUFFIX: &str = ".git";

/// Download suffix that is installed as-is instead of unpacked.
pub const EXECUTABLE_SUFFIX: &str = ".exe";

/// What happens to a downloaded file once it is on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    /// Create the install directory and move the file into it.
    Relocate,
    /// Decompress the archive into the install directory.
    Unpack,
}

/// How a toolset gets onto disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAction {
    Clone {
        url: String,
        revision: String,
        dest: PathBuf,
    },
    Download {
        url: String,
        dest: PathBuf,
        filename: String,
    },
}

impl FetchAction {
    pub fn url(&self) -> &str {
        match self {
            FetchAction::Clone { url, .. } | FetchAction::Download { url, .. } => url,
        }
    }

    pub fn dest(&self) -> &Path {
        match self {
            FetchAction::Clone { dest, .. } | FetchAction::Download { dest, .. } => dest,
        }
    }

    /// Deploy step of a download; clones have none.
    pub fn deploy_step(&self) -> Option<DeployStep> {
        match self {
            FetchAction::Clone { .. } => None,
            FetchAction::Download { filename, .. } => Some(deploy_step_for(filename)),
        }
    }

    /// Fetch and deploy into the install path.
    pub fn execute(&self, transport: &dyn Transport) -> Result<()> {
        match self {
            FetchAction::Clone {
                url,
                revision,
                dest,
            } => clone_into(transport, url, revision, dest),
            FetchAction::Download {
                url,
                dest,
                filename,
            } => download_into(transport, url, dest, filename),
        }
    }
}

impl fmt::Display for FetchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchAction::Clone { url, .. } => write!(f, "clone {url}"),
            FetchAction::Download { url, .. } => write!(f, "download {url}"),
        }
    }
}

/// A toolset paired with its install path and fetch strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsetOperation {
    pub name: String,
    pub toolset: Toolset,
    pub install_path: PathBuf,
    pub action: FetchAction,
}

/// Resolve one toolset declaration into an operation under `install_root`.
pub fn resolve(install_root: &Path, name: &str, toolset: &Toolset) -> Result<ToolsetOperation> {
    let install_path = install_root.join(package_name(name, &toolset.version));
    let url = toolset.url.trim().to_string();

    let action = if url.ends_with(CLONE_SUFFIX) {
        FetchAction::Clone {
            url,
            revision: toolset.version.clone(),
            dest: install_path.clone(),
        }
    } else {
        let filename = download_filename(&url).ok_or_else(|| Error::Resolve {
            toolset: name.to_string(),
            message: format!("cannot derive a file name from url '{url}'"),
        })?;
        FetchAction::Download {
            url,
            dest: install_path.clone(),
            filename,
        }
    };

    debug!(toolset = name, install_path = %install_path.display(), %action, "resolved");

    Ok(ToolsetOperation {
        name: name.to_string(),
        toolset: toolset.clone(),
        install_path,
        action,
    })
}

/// One operation per toolset, in toolset name order.
pub fn resolve_all(install_root: &Path, manifest: &Manifest) -> Result<Vec<ToolsetOperation>> {
    manifest
        .toolsets
        .iter()
        .map(|(name, toolset)| resolve(install_root, name, toolset))
        .collect()
}

/// Last path segment of `url`, ignoring query and fragment.
pub fn download_filename(url: &str) -> Option<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => url.rsplit('/').next().map(str::to_string),
    };

    segment.filter(|name| !name.is_empty())
}

pub fn deploy_step_for(filename: &str) -> DeployStep {
    if filename.to_ascii_lowercase().ends_with(EXECUTABLE_SUFFIX) {
        DeployStep::Relocate
    } else {
        DeployStep::Unpack
    }
}

fn clone_into(transport: &dyn Transport, url: &str, revision: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|err| Error::io("remove previous clone", dest, err))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|err| Error::io("create install root", parent, err))?;
    }
    transport.clone_repository(url, revision, dest)
}

fn download_into(transport: &dyn Transport, url: &str, dest: &Path, filename: &str) -> Result<()> {
    let staging_root = dest.parent().unwrap_or(dest);
    fs::create_dir_all(staging_root)
        .map_err(|err| Error::io("create install root", staging_root, err))?;

    let staging = tempfile::Builder::new()
        .prefix(".download-")
        .tempdir_in(staging_root)
        .map_err(|err| Error::io("create download staging directory", staging_root, err))?;
    let download_path = staging.path().join(filename);

    transport.download(url, &download_path)?;

    fs::create_dir_all(dest).map_err(|err| Error::io("create install directory", dest, err))?;
    match deploy_step_for(filename) {
        DeployStep::Relocate => {
            let target = dest.join(filename);
            fs::rename(&download_path, &target)
                .map_err(|err| Error::io("move download into place", &target, err))?;
            make_executable(&target)?;
        }
        DeployStep::Unpack => transport.unpack(&download_path, dest)?,
    }

    debug!(path = %staging.path().display(), "removing temporary download");
    let staging_path = staging.path().to_path_buf();
    staging
        .close()
        .map_err(|err| Error::io("remove temporary download", &staging_path, err))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|err| Error::io("mark executable", path, err))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
