//! Runs the real tool behind a launcher alias.
//!
//! An alias created with the `launcher` link type is a copy of the
//! `tooldeploy-launcher` binary plus a `.cfg` sidecar. At invocation time the
//! launcher reads the sidecar, starts the configured executable with the
//! forwarded arguments and mirrors its exit status.

mod config;

pub use config::{config_path_for, EnvVariable, LauncherConfig, CONFIG_EXTENSION};

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, error};

/// Status reported when the target cannot be started or the sidecar is unusable.
pub const FAILURE_STATUS: i32 = 1;

#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    config: LauncherConfig,
}

impl ProcessLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Start the target. Blocking mode returns the child's exit status,
    /// detached mode returns `0` as soon as the child is running.
    pub fn launch<I, S>(&self, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = self.command(args);
        let program = self.config.exe_path.clone();

        if self.config.blocking {
            debug!(program = %program.display(), "launching and waiting");
            let status = command
                .status()
                .map_err(|source| Error::Launch { program, source })?;
            Ok(status_code(status))
        } else {
            debug!(program = %program.display(), "launching detached");
            command
                .spawn()
                .map_err(|source| Error::Launch { program, source })?;
            Ok(0)
        }
    }

    /// Like [`launch`](Self::launch) but folds errors into [`FAILURE_STATUS`].
    pub fn exit_status<I, S>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        match self.launch(args) {
            Ok(code) => code,
            Err(err) => {
                error!("{}", error_chain(&err));
                FAILURE_STATUS
            }
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.config.exe_path);
        command
            .args(args)
            .env_clear()
            .envs(merge_environment(env::vars_os(), &self.config.env_variables))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }
}

/// Extend `base` with `overrides`: colliding keys take the override value in
/// place, new keys are appended in declaration order. `$VAR` references in
/// override values expand against the environment merged so far; unknown
/// variables are kept verbatim.
pub fn merge_environment<I>(base: I, overrides: &[EnvVariable]) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut merged: Vec<(OsString, OsString)> = base.into_iter().collect();
    let mut positions: HashMap<OsString, usize> = merged
        .iter()
        .enumerate()
        .map(|(index, (key, _))| (key.clone(), index))
        .collect();

    for variable in overrides {
        let value = shellexpand::env_with_context_no_errors(&variable.value, |name: &str| {
            lookup(&merged, name)
        })
        .into_owned();
        let key = OsString::from(&variable.key);

        match positions.get(&key) {
            Some(&index) => merged[index].1 = OsString::from(value),
            None => {
                positions.insert(key.clone(), merged.len());
                merged.push((key, OsString::from(value)));
            }
        }
    }

    merged
}

fn lookup(environment: &[(OsString, OsString)], name: &str) -> Option<String> {
    environment
        .iter()
        .find(|(key, _)| key == name)
        .and_then(|(_, value)| value.to_str().map(str::to_string))
}

#[cfg(unix)]
fn status_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(FAILURE_STATUS)
}

#[cfg(not(unix))]
fn status_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(FAILURE_STATUS)
}

/// Entry point of the launcher binary: resolve the sidecar of the running
/// executable and run its target with `args`.
pub fn run_current<I, S>(args: I) -> i32
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let alias = match env::current_exe() {
        Ok(path) => path,
        Err(err) => {
            error!("Unable to locate the running launcher: {err}");
            return FAILURE_STATUS;
        }
    };

    match LauncherConfig::for_executable(&alias) {
        Ok(config) => ProcessLauncher::new(config).exit_status(args),
        Err(err) => {
            error!("{}", error_chain(&err));
            FAILURE_STATUS
        }
    }
}

fn error_chain(err: &Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
