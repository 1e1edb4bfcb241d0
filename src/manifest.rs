use crate::error::{Error, Result};
use crate::launcher::{config_path_for, EnvVariable};
use crate::linker::LinkKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Deployment manifest: a named set of toolsets plus optional layout hints.
///
/// Every field is optional on disk; anything missing deserializes to its
/// zero value and is interpreted later by the consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    /// Directory receiving alias entries; overridden by `TOOLDEPLOY_BIN_DIR`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_path: Option<String>,
    /// Root of the per-version install directories; overridden by `TOOLDEPLOY_INSTALL_DIR`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_path: Option<String>,
    /// Proxy used for archive downloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    pub toolsets: BTreeMap<String, Toolset>,
}

/// A versioned source (repository or archive) and the tools it provides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolset {
    pub url: String,
    pub version: String,
    pub tools: Vec<Tool>,
}

/// A single artifact inside a toolset, exposed under one or more aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tool {
    /// Path relative to the installed package root.
    pub path: String,
    /// Link mechanism tag (`exe`, `bash`, `launcher`); empty means `exe`.
    #[serde(rename = "type")]
    pub kind: String,
    pub aliases: Vec<String>,
    /// Launcher-type tools only: wait for the child instead of detaching.
    pub blocking: bool,
    /// Exported by shell-script links and written to launcher sidecars.
    /// `{installPath}` in a value is replaced by the toolset install path.
    pub env_variables: Vec<EnvVariable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    Yaml,
    Json,
    Toml,
}

impl ManifestFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl Manifest {
    /// Load a manifest from disk, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let parsed = match ManifestFormat::from_path(path) {
            ManifestFormat::Yaml => Self::from_yaml_str(&contents),
            ManifestFormat::Json => serde_json::from_str(&contents).map_err(Into::into),
            ManifestFormat::Toml => Self::from_toml_str(&contents),
        };

        parsed.map_err(|source| Error::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, crate::error::BoxError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, crate::error::BoxError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn is_empty(&self) -> bool {
        self.toolsets.is_empty()
    }

    /// Reject manifests whose aliases, launcher sidecars or install
    /// directories would collide, or whose names cannot be used as path
    /// segments and shell variable names.
    pub fn validate(&self) -> Result<()> {
        let mut aliases: HashMap<&str, &str> = HashMap::new();
        let mut sidecars: HashMap<String, &str> = HashMap::new();
        let mut packages: HashMap<String, &str> = HashMap::new();

        for (name, toolset) in &self.toolsets {
            validate_segment("toolset name", name)?;
            if !toolset.version.is_empty() {
                validate_segment("version", &toolset.version)?;
            }

            let package = package_name(name, &toolset.version);
            if let Some(previous) = packages.insert(package.clone(), name.as_str()) {
                return Err(Error::conflict(format!(
                    "toolsets '{previous}' and '{name}' both install into '{package}'"
                )));
            }

            for tool in &toolset.tools {
                for variable in &tool.env_variables {
                    if !is_variable_name(&variable.key) {
                        return Err(Error::conflict(format!(
                            "environment key '{}' in toolset '{name}' is not a valid variable name",
                            variable.key
                        )));
                    }
                }

                let launched = LinkKind::from_type_tag(&tool.kind) == LinkKind::Launcher;
                for alias in &tool.aliases {
                    if alias.trim().is_empty() {
                        return Err(Error::conflict(format!(
                            "toolset '{name}' declares an empty alias for '{}'",
                            tool.path
                        )));
                    }
                    if alias.contains(['/', '\\']) || alias == "." || alias == ".." {
                        return Err(Error::conflict(format!(
                            "alias '{alias}' in toolset '{name}' is not a plain command name"
                        )));
                    }
                    if let Some(owner) = aliases.insert(alias.as_str(), name.as_str()) {
                        return Err(Error::conflict(format!(
                            "alias '{alias}' is claimed by both '{owner}' and '{name}'"
                        )));
                    }
                    if launched {
                        let sidecar = sidecar_name(alias);
                        if let Some(other) = sidecars.insert(sidecar.clone(), alias.as_str()) {
                            return Err(Error::conflict(format!(
                                "launcher aliases '{other}' and '{alias}' share the config file '{sidecar}'"
                            )));
                        }
                    }
                }
            }
        }

        for (sidecar, owner) in &sidecars {
            if let Some(toolset) = aliases.get(sidecar.as_str()) {
                return Err(Error::conflict(format!(
                    "alias '{sidecar}' in toolset '{toolset}' would be overwritten by the config file of launcher alias '{owner}'"
                )));
            }
        }

        Ok(())
    }
}

/// Reject values that would not stay a single directory name under the
/// install root.
fn validate_segment(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty()
        || value.contains(['/', '\\'])
        || value == "."
        || value.contains("..")
    {
        return Err(Error::conflict(format!(
            "{what} '{value}' is not a plain directory name"
        )));
    }
    Ok(())
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_variable_name(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

/// File name of the sidecar a launcher alias reads.
fn sidecar_name(alias: &str) -> String {
    config_path_for(Path::new(alias)).to_string_lossy().into_owned()
}

/// Directory name of an installed toolset: `<name>.<version>`.
pub fn package_name(name: &str, version: &str) -> String {
    format!("{name}.{version}")
}

/// Join a manifest-relative path (either separator style) onto `root`,
/// folding `.` and `..` lexically. `..` never climbs above `root`; the
/// remaining parts are still joined.
pub fn join_relative(root: &Path, relative: &str) -> PathBuf {
    let mut joined = root.to_path_buf();
    let mut depth = 0usize;
    for part in relative.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if depth > 0 {
                    joined.pop();
                    depth -= 1;
                }
            }
            part => {
                joined.push(part);
                depth += 1;
            }
        }
    }
    joined
}
