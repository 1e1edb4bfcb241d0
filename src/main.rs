use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tooldeploy::cli::Cli;
use tooldeploy::{Deployer, Layout, Manifest, NetworkTransport};

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tooldeploy=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let manifest = Manifest::load(&cli.manifest)?;
    let layout = Layout::resolve(&manifest)?;
    let transport = NetworkTransport::new(manifest.http_proxy.as_deref())
        .context("Failed to configure HTTP client")?;

    Deployer::new(layout, Arc::new(transport))
        .deploy(&manifest)
        .with_context(|| format!("Deployment of {:?} failed", cli.manifest))?;

    Ok(())
}
