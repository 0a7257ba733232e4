//! Shell command steps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedSender};

use super::context::ExecutionContext;
use super::logging_command;
use super::result::TaskResult;
use super::step::{Step, StepFlags};
use crate::config::StepConfig;
use crate::error::{HaulerError, Result};

/// A step that runs one command line through the platform shell.
///
/// Stdout and stderr are streamed line by line into the step's context as
/// they arrive, with logging commands handled instead of written. A non-zero
/// exit is a `Failed` result; a zero exit takes any result a command set. A
/// command that cannot be started is an error.
#[derive(Debug, Clone)]
pub struct CommandStep {
    name: String,
    command: String,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    flags: StepFlags,
}

impl CommandStep {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            env: HashMap::new(),
            cwd: None,
            flags: StepFlags::default(),
        }
    }

    /// Build a step from its job file entry.
    pub fn from_config(config: &StepConfig, cwd: Option<&Path>) -> Self {
        Self {
            name: config.name.clone(),
            command: config.run.clone(),
            env: config.env.clone(),
            cwd: cwd.map(Path::to_path_buf),
            flags: StepFlags {
                enabled: config.enabled,
                always_run: config.always_run,
                continue_on_error: config.continue_on_error,
                critical: config.critical,
                is_finally: config.is_finally,
            },
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_flags(mut self, flags: StepFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn build(&self) -> Command {
        let (shell, flag) = shell();
        let mut cmd = Command::new(shell);
        cmd.arg(flag)
            .arg(&self.command)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[async_trait]
impl Step for CommandStep {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn flags(&self) -> StepFlags {
        self.flags
    }

    async fn run(&self, context: &mut ExecutionContext) -> Result<TaskResult> {
        context.output(&format!("##[command]{}", self.command));

        let mut child = self.build().spawn().map_err(|e| HaulerError::StepExecutionError {
            step: self.name.clone(),
            message: format!("failed to start '{}': {}", self.command, e),
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }
        drop(tx);

        while let Some(line) = rx.recv().await {
            if !logging_command::process(context, &line) {
                context.output(&line);
            }
        }
        for reader in readers {
            if let Err(err) = reader.await {
                tracing::warn!(step = %self.name, error = %err, "output reader failed");
            }
        }

        let status = child.wait().await?;
        tracing::debug!(step = %self.name, code = ?status.code(), "command exited");

        if status.success() {
            return Ok(context.result().unwrap_or(TaskResult::Succeeded));
        }
        match status.code() {
            Some(code) => context.error(&format!("Process completed with exit code {}.", code)),
            None => context.error("Process was terminated by a signal."),
        }
        Ok(TaskResult::Failed)
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, tx: UnboundedSender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

fn shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}
