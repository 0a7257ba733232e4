//! Routing parsed arguments to command implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cli::args::{Cli, Commands};
use crate::error::Result;
use crate::secrets::SecretMasker;
use crate::steps::TaskResult;

/// A CLI subcommand.
///
/// `Err` is reserved for faults the command could not report itself; an
/// expected failure such as a failed job is an `Ok` with a non-zero exit code.
#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<CommandResult>;
}

/// Outcome of a command: whether it passed and the process exit code.
#[derive(Debug)]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    /// Exit 0 for a passing job result, 1 otherwise.
    pub fn for_job(result: TaskResult) -> Self {
        if result.is_success() {
            Self::success()
        } else {
            Self::failure(1)
        }
    }
}

/// Dispatches CLI commands to their implementations.
///
/// The dispatcher hands every command the process-wide secret masker, the
/// same one the log writer masks with.
pub struct CommandDispatcher {
    masker: Arc<SecretMasker>,
}

impl CommandDispatcher {
    pub fn new(masker: Arc<SecretMasker>) -> Self {
        Self { masker }
    }

    pub fn masker(&self) -> &Arc<SecretMasker> {
        &self.masker
    }

    pub async fn dispatch(&self, cli: &Cli) -> Result<CommandResult> {
        match &cli.command {
            Commands::Run(args) => {
                let cmd = super::run::RunCommand::new(args.clone(), self.masker.clone());
                cmd.execute().await
            }
        }
    }
}
