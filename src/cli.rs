use clap::Parser;
use std::path::PathBuf;

/// Toolchain deployer - fetch versioned tool packages and expose them as aliases
///
/// Reads a deployment manifest (YAML by default, `.json` or `.toml` by
/// extension), fetches every toolset concurrently into
/// `<install root>/<name>.<version>` and creates the declared aliases in the
/// bin directory once all fetches have finished.
///
/// Locations come from TOOLDEPLOY_BIN_DIR / TOOLDEPLOY_INSTALL_DIR, then the
/// manifest's `binPath` / `installPath`, then $XDG_STATE_HOME/tooldeploy.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Path to the deployment manifest
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn manifest_is_required() {
        assert!(Cli::try_parse_from(["tooldeploy"]).is_err());
        let cli = Cli::try_parse_from(["tooldeploy", "tools.yaml"]).unwrap();
        assert_eq!(cli.manifest, PathBuf::from("tools.yaml"));
    }
}
