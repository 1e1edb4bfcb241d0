//! Deploys versioned tool packages from a declarative manifest and exposes
//! them as command aliases, plus the launcher those aliases can run through.

pub mod cli;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod launcher;
pub mod layout;
pub mod linker;
pub mod manifest;
pub mod operation;
pub mod receipt;
pub mod transport;
pub mod ui;

pub use deploy::{Deployer, Deployment};
pub use error::{Error, Result};
pub use executor::{FetchExecutor, Fetched};
pub use launcher::{LauncherConfig, ProcessLauncher};
pub use layout::Layout;
pub use linker::{AliasLink, AliasLinker, LinkKind};
pub use manifest::{Manifest, Tool, Toolset};
pub use operation::{FetchAction, ToolsetOperation};
pub use receipt::Receipt;
pub use transport::{NetworkTransport, Transport};
