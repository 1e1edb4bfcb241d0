use crate::error::Result;
use crate::executor::FetchExecutor;
use crate::layout::Layout;
use crate::linker::{AliasLink, AliasLinker};
use crate::manifest::Manifest;
use crate::operation::resolve_all;
use crate::receipt::Receipt;
use crate::transport::Transport;
use crate::ui::{self, Status};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Outcome of a successful deployment.
#[derive(Debug, Default)]
pub struct Deployment {
    pub toolsets: usize,
    pub links: Vec<AliasLink>,
    /// Receipt location; `None` when there was nothing to deploy.
    pub receipt: Option<PathBuf>,
}

/// Runs a manifest through validation, resolution, fetch, link and receipt.
pub struct Deployer {
    layout: Layout,
    transport: Arc<dyn Transport>,
}

impl Deployer {
    pub fn new(layout: Layout, transport: Arc<dyn Transport>) -> Self {
        Self { layout, transport }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Deploy every toolset of `manifest`.
    ///
    /// Linking starts only after every fetch has completed; any failure stops
    /// the run and leaves completed work on disk.
    pub fn deploy(&self, manifest: &Manifest) -> Result<Deployment> {
        manifest.validate()?;

        if manifest.is_empty() {
            ui::report(Status::Idle, "Manifest declares no toolsets; nothing to deploy");
            return Ok(Deployment::default());
        }

        self.layout.prepare()?;

        let operations = resolve_all(self.layout.install_root(), manifest)?;
        info!(count = operations.len(), "resolved toolsets");

        let executor = FetchExecutor::new(Arc::clone(&self.transport))?;
        let fetched = executor.run(operations)?;

        let linker = AliasLinker::new(
            self.layout.bin_dir(),
            self.layout.launcher().map(Path::to_path_buf),
        );
        let links = linker.link_all(&fetched)?;

        let receipt = Receipt::record(&fetched, &links);
        receipt.save(self.layout.receipt_path())?;

        ui::report(
            Status::Deployed,
            format!(
                "{} toolset(s), {} alias(es) in {}",
                fetched.completed(),
                links.len(),
                self.layout.bin_dir().display()
            ),
        );

        Ok(Deployment {
            toolsets: fetched.completed(),
            links,
            receipt: Some(self.layout.receipt_path().to_path_buf()),
        })
    }
}
