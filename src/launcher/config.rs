use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of the sidecar file sitting next to every launcher alias.
pub const CONFIG_EXTENSION: &str = "cfg";

/// One environment override applied to the launched process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVariable {
    #[serde(alias = "Key")]
    pub key: String,
    #[serde(default, alias = "Value")]
    pub value: String,
}

impl EnvVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Per-alias launch settings read from the `.cfg` sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    pub exe_path: PathBuf,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_variables: Vec<EnvVariable>,
}

impl LauncherConfig {
    /// Load the sidecar belonging to the alias binary at `alias_path`.
    pub fn for_executable(alias_path: &Path) -> Result<Self> {
        Self::load(&config_path_for(alias_path))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|err| Error::io("serialize launcher config", path, err.into()))?;
        fs::write(path, contents).map_err(|source| Error::io("write launcher config", path, source))
    }
}

/// Sidecar location for an alias: extension stripped, `.cfg` appended.
pub fn config_path_for(alias_path: &Path) -> PathBuf {
    alias_path.with_extension(CONFIG_EXTENSION)
}
