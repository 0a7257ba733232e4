//! Run command implementation.
//!
//! The `hauler run` command executes a job file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::cli::args::RunArgs;
use crate::config::{load_job_config, JobConfig};
use crate::context::AgentContext;
use crate::delivery::LocalTelemetryClient;
use crate::error::{HaulerError, Result};
use crate::runner::{JobRequest, JobRunner, RunProgress};
use crate::secrets::SecretMasker;
use crate::steps::{CommandStep, Step};

use super::dispatcher::{Command, CommandResult};

/// Staging directory for step logs, under the output directory.
const STAGING_DIR: &str = "staging";

/// The run command implementation.
pub struct RunCommand {
    args: RunArgs,
    masker: Arc<SecretMasker>,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(args: RunArgs, masker: Arc<SecretMasker>) -> Self {
        Self { args, masker }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Directory the steps run in.
    ///
    /// `--workdir` wins; otherwise the job file's `working_directory`,
    /// resolved against the job file's directory.
    fn working_directory(&self, config: &JobConfig) -> Option<PathBuf> {
        if let Some(dir) = &self.args.workdir {
            return Some(dir.clone());
        }
        let dir = config.working_directory.as_ref()?;
        if dir.is_absolute() {
            return Some(dir.clone());
        }
        let base = self
            .args
            .job_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Some(base.join(dir))
    }

    fn job_name(&self, config: &JobConfig) -> String {
        if !config.name.trim().is_empty() {
            return config.name.clone();
        }
        self.args
            .job_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "job".to_string())
    }

    fn build_steps(&self, config: &JobConfig) -> Vec<Box<dyn Step>> {
        let cwd = self.working_directory(config);
        config
            .steps
            .iter()
            .map(|step| Box::new(CommandStep::from_config(step, cwd.as_deref())) as Box<dyn Step>)
            .collect()
    }
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self) -> Result<CommandResult> {
        let config = match load_job_config(&self.args.job_file) {
            Ok(c) => c,
            Err(HaulerError::ConfigNotFound { path }) => {
                eprintln!("Job file not found: {}", path.display());
                return Ok(CommandResult::failure(2));
            }
            Err(e) => return Err(e),
        };

        self.masker.add_values(self.args.secret.iter().cloned());
        let registered = config.secrets.register(&self.masker, std::env::vars())?;
        tracing::debug!(
            registered,
            total = self.masker.matcher_count(),
            "secrets registered"
        );

        let output = &self.args.output;
        let client = LocalTelemetryClient::new(output);
        let context = AgentContext::new(self.masker.clone(), Arc::new(client))
            .with_delivery_settings(config.delivery.clone());

        let name = self.job_name(&config);
        let request =
            JobRequest::new(name.as_str(), self.build_steps(&config)).with_log_dir(output.join(STAGING_DIR));
        let timeline_id = request.timeline_id;

        println!("Running {}", name);
        let outcome = JobRunner::new(context)
            .run_with_progress(request, |progress| match progress {
                RunProgress::StepStarting { name, index, total } => {
                    println!("[{}/{}] {}", index + 1, total, name);
                }
                RunProgress::StepFinished { name, result } => {
                    println!("  {} {}", name, result);
                }
                RunProgress::StepSkipped { name } => {
                    println!("  {} skipped", name);
                }
            })
            .await?;

        println!("Job {}: {}", name, outcome.result);
        println!(
            "Telemetry written to {} (timeline {})",
            output.display(),
            timeline_id
        );

        Ok(CommandResult::for_job(outcome.result))
    }
}
