use crate::error::{Error, Result};
use crate::executor::Fetched;
use crate::launcher::{config_path_for, EnvVariable, LauncherConfig};
use crate::manifest::join_relative;
use crate::operation::ToolsetOperation;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Placeholder in environment values replaced by the toolset install path.
pub const INSTALL_PATH_PLACEHOLDER: &str = "{installPath}";

/// How an alias reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Symbolic link straight to the target.
    Executable,
    /// Generated bash script that exports the environment and sources the target.
    ShellScript,
    /// Copy of the launcher binary plus a `.cfg` sidecar.
    Launcher,
}

impl LinkKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "bash" => Self::ShellScript,
            "launcher" => Self::Launcher,
            _ => Self::Executable,
        }
    }
}

/// One alias entry to create in the bin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasLink {
    pub alias: String,
    /// Location of the alias entry.
    pub path: PathBuf,
    /// Installed file the alias resolves to.
    pub target: PathBuf,
    pub kind: LinkKind,
    pub blocking: bool,
    /// Environment with install path placeholders already substituted.
    pub environment: Vec<EnvVariable>,
}

pub struct AliasLinker {
    bin_dir: PathBuf,
    launcher: Option<PathBuf>,
}

impl AliasLinker {
    /// `launcher` is the binary copied under launcher-type aliases; without it
    /// those aliases fail to link.
    pub fn new(bin_dir: impl Into<PathBuf>, launcher: Option<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            launcher,
        }
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Every tool/alias pair of `operation`, in declaration order.
    pub fn plan(&self, operation: &ToolsetOperation) -> Vec<AliasLink> {
        let mut links = Vec::new();
        for tool in &operation.toolset.tools {
            let target = join_relative(&operation.install_path, &tool.path);
            let environment = substitute_install_path(&tool.env_variables, &operation.install_path);
            let kind = LinkKind::from_type_tag(&tool.kind);

            for alias in &tool.aliases {
                links.push(AliasLink {
                    alias: alias.clone(),
                    path: self.bin_dir.join(alias),
                    target: target.clone(),
                    kind,
                    blocking: tool.blocking,
                    environment: environment.clone(),
                });
            }
        }
        links
    }

    /// Create the aliases of every fetched operation, one after another.
    pub fn link_all(&self, fetched: &Fetched) -> Result<Vec<AliasLink>> {
        let mut created = Vec::new();
        for operation in fetched.operations() {
            for link in self.plan(operation) {
                self.link(&link)?;
                created.push(link);
            }
        }
        Ok(created)
    }

    fn link(&self, link: &AliasLink) -> Result<()> {
        debug!(
            alias = %link.alias,
            path = %link.path.display(),
            target = %link.target.display(),
            kind = ?link.kind,
            "linking"
        );

        if !link.target.exists() {
            warn!(alias = %link.alias, target = %link.target.display(), "alias target does not exist");
        }

        let to_link_error = |err: io::Error| Error::link(&link.alias, &link.path, err);
        clear_slot(&link.path).map_err(to_link_error)?;

        match link.kind {
            LinkKind::Executable => create_symlink(&link.target, &link.path).map_err(to_link_error),
            LinkKind::ShellScript => {
                write_executable(&link.path, &shell_script(link)).map_err(to_link_error)
            }
            LinkKind::Launcher => self.install_launcher(link),
        }
    }

    fn install_launcher(&self, link: &AliasLink) -> Result<()> {
        let launcher = self.launcher.as_deref().ok_or_else(|| {
            Error::link(
                &link.alias,
                &link.path,
                io::Error::new(io::ErrorKind::NotFound, "no launcher binary available"),
            )
        })?;

        fs::copy(launcher, &link.path).map_err(|err| Error::link(&link.alias, &link.path, err))?;
        set_executable(&link.path).map_err(|err| Error::link(&link.alias, &link.path, err))?;

        let config = LauncherConfig {
            exe_path: link.target.clone(),
            blocking: link.blocking,
            env_variables: link.environment.clone(),
        };
        config.save(&config_path_for(&link.path))
    }
}

fn substitute_install_path(variables: &[EnvVariable], install_path: &Path) -> Vec<EnvVariable> {
    let install_path = install_path.display().to_string();
    variables
        .iter()
        .map(|variable| {
            EnvVariable::new(
                variable.key.clone(),
                variable.value.replace(INSTALL_PATH_PLACEHOLDER, &install_path),
            )
        })
        .collect()
}

/// Remove a previous alias entry. Directories are never removed.
fn clear_slot(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "a directory occupies the alias path",
        )),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn shell_script(link: &AliasLink) -> String {
    let mut script = String::from("#!/usr/bin/env bash\n\n");
    for variable in &link.environment {
        let _ = writeln!(
            script,
            "export {}=\"{}\"",
            variable.key,
            escape_double_quoted(&variable.value)
        );
    }
    if !link.environment.is_empty() {
        script.push('\n');
    }
    let _ = writeln!(
        script,
        "source \"{}\" \"$@\"",
        escape_double_quoted(&link.target.display().to_string())
    );
    script
}

/// Escape for a double-quoted bash word; `$` stays live so values can
/// reference other variables.
fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '"' | '\\' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn write_executable(path: &Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents)?;
    set_executable(path)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FetchExecutor;
    use crate::manifest::{Tool, Toolset};
    use crate::operation::resolve;
    use crate::operation::tests::FakeTransport;
    use rstest::rstest;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tool(path: &str, kind: &str, aliases: &[&str]) -> Tool {
        Tool {
            path: path.to_string(),
            kind: kind.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
            ..Tool::default()
        }
    }

    fn fetch(install_root: &Path, name: &str, toolset: Toolset) -> Fetched {
        let op = resolve(install_root, name, &toolset).unwrap();
        let executor = FetchExecutor::new(Arc::new(FakeTransport::default())).unwrap();
        executor.run(vec![op]).unwrap()
    }

    fn go_toolset(tools: Vec<Tool>) -> Toolset {
        Toolset {
            url: "https://example.com/go.tgz".to_string(),
            version: "1.2".to_string(),
            tools,
        }
    }

    #[rstest]
    #[case("bash", LinkKind::ShellScript)]
    #[case("BASH", LinkKind::ShellScript)]
    #[case("launcher", LinkKind::Launcher)]
    #[case("exe", LinkKind::Executable)]
    #[case("", LinkKind::Executable)]
    #[case("powershell", LinkKind::Executable)]
    fn type_tag_selects_mechanism(#[case] tag: &str, #[case] kind: LinkKind) {
        assert_eq!(LinkKind::from_type_tag(tag), kind);
    }

    #[test]
    fn plan_covers_every_alias() {
        let temp = TempDir::new().unwrap();
        let op = resolve(
            &temp.path().join("install"),
            "go",
            &go_toolset(vec![
                tool("bin/go", "", &["go", "golang"]),
                tool("bin\\gofmt", "bash", &["gofmt"]),
            ]),
        )
        .unwrap();
        let linker = AliasLinker::new(temp.path().join("bin"), None);

        let links = linker.plan(&op);

        let aliases: Vec<&str> = links.iter().map(|link| link.alias.as_str()).collect();
        assert_eq!(aliases, vec!["go", "golang", "gofmt"]);
        assert_eq!(links[0].target, op.install_path.join("bin/go"));
        assert_eq!(links[1].path, temp.path().join("bin/golang"));
        assert_eq!(links[2].target, op.install_path.join("bin").join("gofmt"));
        assert_eq!(links[2].kind, LinkKind::ShellScript);
    }

    #[test]
    fn install_path_placeholder_is_substituted() {
        let mut go = tool("bin/go", "bash", &["go"]);
        go.env_variables = vec![EnvVariable::new("GOROOT", "{installPath}")];
        let op = resolve(Path::new("/opt/install"), "go", &go_toolset(vec![go])).unwrap();
        let linker = AliasLinker::new("/opt/bin", None);

        let links = linker.plan(&op);

        assert_eq!(
            links[0].environment,
            vec![EnvVariable::new("GOROOT", "/opt/install/go.1.2")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn go_download_scenario_links_executable() {
        let temp = TempDir::new().unwrap();
        let install_root = temp.path().join("install");
        let bin_dir = temp.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let fetched = fetch(&install_root, "go", go_toolset(vec![tool("bin/go", "", &["go"])]));

        let links = AliasLinker::new(&bin_dir, None).link_all(&fetched).unwrap();

        assert_eq!(links.len(), 1);
        let alias = bin_dir.join("go");
        assert!(fs::symlink_metadata(&alias).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&alias).unwrap(), install_root.join("go.1.2/bin/go"));
        assert_eq!(fs::read_to_string(&alias).unwrap(), "unpacked");
    }

    #[cfg(unix)]
    #[test]
    fn bash_tool_gets_shell_script() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let install_root = temp.path().join("install");
        let bin_dir = temp.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let mut go = tool("bin/go", "bash", &["goenv"]);
        go.env_variables = vec![
            EnvVariable::new("GOROOT", "{installPath}"),
            EnvVariable::new("GREETING", "say \"hi\""),
        ];
        let fetched = fetch(&install_root, "go", go_toolset(vec![go]));

        AliasLinker::new(&bin_dir, None).link_all(&fetched).unwrap();

        let script_path = bin_dir.join("goenv");
        let script = fs::read_to_string(&script_path).unwrap();
        let install_path = install_root.join("go.1.2");
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains(&format!("export GOROOT=\"{}\"", install_path.display())));
        assert!(script.contains("export GREETING=\"say \\\"hi\\\"\""));
        assert!(script.contains(&format!(
            "source \"{}\" \"$@\"",
            install_path.join("bin/go").display()
        )));
        let mode = fs::metadata(&script_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn launcher_tool_gets_binary_and_sidecar() {
        let temp = TempDir::new().unwrap();
        let install_root = temp.path().join("install");
        let bin_dir = temp.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let launcher = temp.path().join("tooldeploy-launcher");
        fs::write(&launcher, "launcher-binary").unwrap();
        let mut code = tool("bin/go", "launcher", &["gorun"]);
        code.blocking = true;
        code.env_variables = vec![EnvVariable::new("GOROOT", "{installPath}")];
        let fetched = fetch(&install_root, "go", go_toolset(vec![code]));

        AliasLinker::new(&bin_dir, Some(launcher))
            .link_all(&fetched)
            .unwrap();

        assert_eq!(
            fs::read_to_string(bin_dir.join("gorun")).unwrap(),
            "launcher-binary"
        );
        let config = LauncherConfig::load(&bin_dir.join("gorun.cfg")).unwrap();
        let install_path = install_root.join("go.1.2");
        assert_eq!(config.exe_path, install_path.join("bin/go"));
        assert!(config.blocking);
        assert_eq!(
            config.env_variables,
            vec![EnvVariable::new("GOROOT", install_path.display().to_string())]
        );
    }

    #[test]
    fn launcher_tool_without_launcher_fails() {
        let temp = TempDir::new().unwrap();
        let bin_dir = temp.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let fetched = fetch(
            &temp.path().join("install"),
            "go",
            go_toolset(vec![tool("bin/go", "launcher", &["go"])]),
        );

        let err = AliasLinker::new(&bin_dir, None).link_all(&fetched).unwrap_err();

        assert!(matches!(err, Error::Link { ref alias, .. } if alias == "go"));
    }

    #[cfg(unix)]
    #[test]
    fn existing_alias_file_is_replaced() {
        let temp = TempDir::new().unwrap();
        let install_root = temp.path().join("install");
        let bin_dir = temp.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        fs::write(bin_dir.join("go"), "stale").unwrap();
        let fetched = fetch(&install_root, "go", go_toolset(vec![tool("bin/go", "", &["go"])]));

        AliasLinker::new(&bin_dir, None).link_all(&fetched).unwrap();
        AliasLinker::new(&bin_dir, None).link_all(&fetched).unwrap();

        assert_eq!(
            fs::read_link(bin_dir.join("go")).unwrap(),
            install_root.join("go.1.2/bin/go")
        );
    }

    #[test]
    fn directory_at_alias_path_is_link_error() {
        let temp = TempDir::new().unwrap();
        let bin_dir = temp.path().join("bin");
        fs::create_dir_all(bin_dir.join("go")).unwrap();
        let fetched = fetch(
            &temp.path().join("install"),
            "go",
            go_toolset(vec![tool("bin/go", "", &["go"])]),
        );

        let err = AliasLinker::new(&bin_dir, None).link_all(&fetched).unwrap_err();

        assert!(matches!(err, Error::Link { .. }));
        assert!(bin_dir.join("go").is_dir());
    }
}
