use crate::error::{Error, Result};
use crate::manifest::Manifest;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const BIN_DIR_ENV: &str = "TOOLDEPLOY_BIN_DIR";
pub const INSTALL_DIR_ENV: &str = "TOOLDEPLOY_INSTALL_DIR";
pub const LAUNCHER_ENV: &str = "TOOLDEPLOY_LAUNCHER";

/// File name of the deployment receipt inside the install root.
pub const RECEIPT_FILE: &str = "tooldeploy.lock";

const LAUNCHER_NAME: &str = "tooldeploy-launcher";

/// Where a deployment writes: alias directory, install root, receipt, and the
/// launcher binary copied under launcher-type aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    bin_dir: PathBuf,
    install_root: PathBuf,
    launcher: Option<PathBuf>,
    receipt_path: PathBuf,
}

impl Layout {
    pub fn new(
        bin_dir: impl Into<PathBuf>,
        install_root: impl Into<PathBuf>,
        launcher: Option<PathBuf>,
    ) -> Result<Self> {
        let bin_dir = bin_dir.into();
        let install_root = install_root.into();
        if bin_dir == install_root {
            return Err(Error::layout(format!(
                "bin directory and install root are both {}",
                bin_dir.display()
            )));
        }

        let receipt_path = install_root.join(RECEIPT_FILE);
        Ok(Self {
            bin_dir,
            install_root,
            launcher,
            receipt_path,
        })
    }

    /// Resolve the layout for `manifest`.
    ///
    /// Each directory comes from its environment variable, then the manifest,
    /// then `$XDG_STATE_HOME/tooldeploy/{bin,install}`.
    pub fn resolve(manifest: &Manifest) -> Result<Self> {
        let bin_dir = match configured_dir(BIN_DIR_ENV, manifest.bin_path.as_deref())? {
            Some(dir) => dir,
            None => state_dir()?.join("bin"),
        };
        let install_root = match configured_dir(INSTALL_DIR_ENV, manifest.install_path.as_deref())? {
            Some(dir) => dir,
            None => state_dir()?.join("install"),
        };
        let launcher = launcher_binary()?;

        debug!(
            bin_dir = %bin_dir.display(),
            install_root = %install_root.display(),
            launcher = ?launcher,
            "resolved layout"
        );

        Self::new(bin_dir, install_root, launcher)
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn launcher(&self) -> Option<&Path> {
        self.launcher.as_deref()
    }

    pub fn receipt_path(&self) -> &Path {
        &self.receipt_path
    }

    /// Create the bin directory and install root.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.bin_dir, &self.install_root] {
            fs::create_dir_all(dir).map_err(|err| Error::io("create directory", dir, err))?;
        }
        Ok(())
    }
}

fn configured_dir(var: &str, manifest_value: Option<&str>) -> Result<Option<PathBuf>> {
    let from_env = env::var(var).ok().filter(|value| !value.trim().is_empty());
    let value = from_env.or_else(|| {
        manifest_value
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    });

    value.map(|value| expand_path(&value)).transpose()
}

/// Expand `~` and environment variables and anchor relative paths at the
/// current directory.
fn expand_path(value: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(value)
        .map_err(|err| Error::layout(format!("cannot expand '{value}': {err}")))?;
    let path = PathBuf::from(expanded.into_owned());
    if path.is_absolute() {
        return Ok(path);
    }

    let cwd = env::current_dir().map_err(|err| Error::io("read current directory", &path, err))?;
    Ok(cwd.join(path))
}

/// `$XDG_STATE_HOME/tooldeploy`, defaulting to `~/.local/state/tooldeploy`.
fn state_dir() -> Result<PathBuf> {
    let base = match env::var_os("XDG_STATE_HOME").filter(|value| !value.is_empty()) {
        Some(value) => PathBuf::from(value),
        None => directories::BaseDirs::new()
            .ok_or_else(|| Error::layout("cannot determine home directory"))?
            .home_dir()
            .join(".local/state"),
    };

    Ok(base.join("tooldeploy"))
}

/// Launcher from `TOOLDEPLOY_LAUNCHER`, otherwise the one installed next to
/// the running executable, if present.
fn launcher_binary() -> Result<Option<PathBuf>> {
    if let Some(value) = env::var(LAUNCHER_ENV).ok().filter(|value| !value.trim().is_empty()) {
        return expand_path(&value).map(Some);
    }

    let sibling = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|dir| dir.join(format!("{LAUNCHER_NAME}{}", env::consts::EXE_SUFFIX)));

    Ok(sibling.filter(|path| path.is_file()))
}
