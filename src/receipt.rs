use crate::error::{Error, Result};
use crate::executor::Fetched;
use crate::linker::{AliasLink, LinkKind};
use crate::operation::FetchAction;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const RECEIPT_VERSION: u32 = 1;

/// Record of the last deployment, written to the install root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    version: u32,
    pub metadata: Metadata,
    #[serde(default)]
    pub toolsets: Vec<ToolsetReceipt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// RFC 3339 timestamp of the deployment.
    pub deployed_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsetReceipt {
    pub name: String,
    pub version: String,
    pub url: String,
    /// `clone` or `download`
    pub strategy: String,
    pub install_path: PathBuf,
    #[serde(default)]
    pub aliases: Vec<AliasReceipt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasReceipt {
    pub alias: String,
    pub path: PathBuf,
    pub target: PathBuf,
    pub kind: String,
}

impl Receipt {
    /// Build a receipt from the fetched operations and the links created for them.
    pub fn record(fetched: &Fetched, links: &[AliasLink]) -> Self {
        let toolsets = fetched
            .operations()
            .iter()
            .map(|operation| {
                let aliases = links
                    .iter()
                    .filter(|link| link.target.starts_with(&operation.install_path))
                    .map(|link| AliasReceipt {
                        alias: link.alias.clone(),
                        path: link.path.clone(),
                        target: link.target.clone(),
                        kind: kind_name(link.kind).to_string(),
                    })
                    .collect();

                ToolsetReceipt {
                    name: operation.name.clone(),
                    version: operation.toolset.version.clone(),
                    url: operation.action.url().to_string(),
                    strategy: match operation.action {
                        FetchAction::Clone { .. } => "clone",
                        FetchAction::Download { .. } => "download",
                    }
                    .to_string(),
                    install_path: operation.install_path.clone(),
                    aliases,
                }
            })
            .collect();

        Self {
            version: RECEIPT_VERSION,
            metadata: Metadata {
                deployed_at: chrono::Utc::now().to_rfc3339(),
            },
            toolsets,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).map_err(|err| Error::io("read receipt", path, err))?;
        toml::from_str(&contents).map_err(|err| {
            Error::io(
                "parse receipt",
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            )
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io("create receipt directory", parent, err))?;
        }

        let contents = toml::to_string_pretty(self).map_err(|err| {
            Error::io(
                "serialize receipt",
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            )
        })?;

        fs::write(path, contents).map_err(|err| Error::io("write receipt", path, err))
    }
}

fn kind_name(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Executable => "exe",
        LinkKind::ShellScript => "bash",
        LinkKind::Launcher => "launcher",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FetchExecutor;
    use crate::linker::AliasLinker;
    use crate::manifest::{Tool, Toolset};
    use crate::operation::resolve;
    use crate::operation::tests::FakeTransport;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_preserves_aliases() {
        let temp = TempDir::new().unwrap();
        let install_root = temp.path().join("install");
        let toolset = Toolset {
            url: "https://example.com/go.tgz".to_string(),
            version: "1.2".to_string(),
            tools: vec![Tool {
                path: "bin/go".to_string(),
                kind: "bash".to_string(),
                aliases: vec!["go".to_string()],
                ..Tool::default()
            }],
        };
        let op = resolve(&install_root, "go", &toolset).unwrap();
        let fetched = FetchExecutor::new(Arc::new(FakeTransport::default()))
            .unwrap()
            .run(vec![op])
            .unwrap();
        let linker = AliasLinker::new(temp.path().join("bin"), None);
        let links = linker.plan(&fetched.operations()[0]);

        let receipt = Receipt::record(&fetched, &links);
        let path = install_root.join("tooldeploy.lock");
        receipt.save(&path).unwrap();
        let loaded = Receipt::load(&path).unwrap();

        assert_eq!(loaded, receipt);
        assert_eq!(loaded.version(), 1);
        let go = &loaded.toolsets[0];
        assert_eq!(go.strategy, "download");
        assert_eq!(go.install_path, install_root.join("go.1.2"));
        assert_eq!(go.aliases[0].kind, "bash");
        assert_eq!(go.aliases[0].path, temp.path().join("bin/go"));
    }

    #[test]
    fn load_missing_receipt_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = Receipt::load(&temp.path().join("absent.lock")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
