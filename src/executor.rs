use crate::error::{Error, Result};
use crate::operation::ToolsetOperation;
use crate::transport::Transport;
use crate::ui;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Operations whose fetch actions have all completed.
///
/// Only [`FetchExecutor::run`] constructs this, so holding one proves the
/// fetch barrier has been passed.
#[derive(Debug)]
pub struct Fetched {
    operations: Vec<ToolsetOperation>,
    completed: usize,
}

impl Fetched {
    pub fn operations(&self) -> &[ToolsetOperation] {
        &self.operations
    }

    /// Number of fetch actions that returned before the barrier released.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn into_operations(self) -> Vec<ToolsetOperation> {
        self.operations
    }
}

/// Runs every operation's fetch action concurrently, then joins them all.
pub struct FetchExecutor {
    transport: Arc<dyn Transport>,
    runtime: Runtime,
}

impl FetchExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("tooldeploy-fetch")
            .build()
            .map_err(Error::Runtime)?;
        Ok(Self { transport, runtime })
    }

    /// Start one task per operation and wait for all of them.
    ///
    /// Every task is joined before this returns, even after a failure; the
    /// first failure observed is returned and later ones are only logged.
    pub fn run(&self, operations: Vec<ToolsetOperation>) -> Result<Fetched> {
        let total = operations.len();

        let outcome = self.runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for operation in &operations {
                let transport = Arc::clone(&self.transport);
                let name = operation.name.clone();
                let action = operation.action.clone();
                tasks.spawn_blocking(move || {
                    let line = ui::FetchLine::start(format!("{name} ({action})"));
                    let result = action.execute(transport.as_ref());
                    line.finish(&result);
                    (action.url().to_string(), result)
                });
            }

            let mut completed = 0usize;
            let mut first_error: Option<Error> = None;
            while let Some(joined) = tasks.join_next().await {
                let result = match joined {
                    Ok((url, result)) => {
                        debug!(url, ok = result.is_ok(), "fetch finished");
                        result
                    }
                    Err(join_error) => Err(Error::fetch(
                        "<fetch task>",
                        format!("fetch task did not complete: {join_error}"),
                    )),
                };
                completed += 1;

                if let Err(err) = result {
                    if first_error.is_none() {
                        first_error = Some(err);
                    } else {
                        error!("additional fetch failure: {err}");
                    }
                }
            }

            (completed, first_error)
        });

        match outcome {
            (_, Some(err)) => Err(err),
            (completed, None) => {
                debug!(completed, total, "fetch barrier released");
                Ok(Fetched {
                    operations,
                    completed,
                })
            }
        }
    }
}
