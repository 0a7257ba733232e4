//! Job execution: one delivery queue, one job record, and the steps runner
//! in between.

use std::path::PathBuf;

use tracing::{info, warn};
use uuid::Uuid;

use super::steps::{RunProgress, StepOutcome, StepsRunner};
use crate::context::AgentContext;
use crate::delivery::{DeliveryQueue, JobTarget};
use crate::error::Result;
use crate::steps::{ExecutionContext, Step, TaskResult};

/// A job to run.
pub struct JobRequest {
    pub name: String,
    pub timeline_id: Uuid,
    pub record_id: Uuid,
    pub steps: Vec<Box<dyn Step>>,
    /// Where per-step logs are written before upload. No logs without it.
    pub log_dir: Option<PathBuf>,
}

impl JobRequest {
    /// A request on a fresh timeline with a fresh job record.
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            timeline_id: Uuid::new_v4(),
            record_id: Uuid::new_v4(),
            steps,
            log_dir: None,
        }
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// The result of a finished job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub result: TaskResult,
    pub steps: Vec<StepOutcome>,
    pub timeline_id: Uuid,
    pub record_id: Uuid,
}

/// Runs jobs against an [`AgentContext`].
#[derive(Debug)]
pub struct JobRunner {
    context: AgentContext,
}

impl JobRunner {
    pub fn new(context: AgentContext) -> Self {
        Self { context }
    }

    pub async fn run(&self, request: JobRequest) -> Result<JobOutcome> {
        self.run_with_progress(request, |_| {}).await
    }

    /// Run a job to completion.
    ///
    /// The delivery queue is started before the first step and drained after
    /// the job record completes, so every line and record the job produced
    /// has been handed to the telemetry client when this returns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for nil ids and `QueueDrain` when the final
    /// drain could not deliver everything. Step failures are results, not
    /// errors.
    pub async fn run_with_progress<F>(&self, request: JobRequest, on_progress: F) -> Result<JobOutcome>
    where
        F: FnMut(RunProgress<'_>) + Send,
    {
        let queue = DeliveryQueue::new(
            self.context.client().clone(),
            self.context.delivery_settings().clone(),
        );
        queue.start(JobTarget::new(request.timeline_id, request.record_id))?;

        let mut job = ExecutionContext::new(
            request.name.as_str(),
            request.timeline_id,
            self.context.secrets().clone(),
        )
        .with_record_id(request.record_id)
        .with_delivery(queue.handle());
        if let Some(dir) = &request.log_dir {
            job = job.with_log_dir(dir);
        }

        info!(job = %request.name, steps = request.steps.len(), "job started");
        job.start();

        let steps = StepsRunner::new()
            .run_with_progress(&mut job, &request.steps, on_progress)
            .await;

        let result = job.result().unwrap_or(TaskResult::Succeeded);
        job.complete(result).await;
        info!(job = %request.name, result = %result, "job finished");

        if let Err(err) = queue.shutdown().await {
            warn!(job = %request.name, error = %err, "telemetry delivery incomplete");
            return Err(err);
        }

        Ok(JobOutcome {
            result,
            steps,
            timeline_id: request.timeline_id,
            record_id: request.record_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{MockTelemetryClient, TimelineRecordState};
    use crate::error::HaulerError;
    use crate::secrets::SecretMasker;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Echo {
        name: &'static str,
        lines: Vec<&'static str>,
        result: TaskResult,
    }

    #[async_trait]
    impl Step for Echo {
        fn display_name(&self) -> &str {
            self.name
        }

        async fn run(&self, context: &mut ExecutionContext) -> Result<TaskResult> {
            for line in &self.lines {
                context.output(line);
            }
            Ok(self.result)
        }
    }

    fn runner(client: &Arc<MockTelemetryClient>, secrets: &[&str]) -> JobRunner {
        let masker = SecretMasker::new();
        masker.add_values(secrets.iter().copied());
        JobRunner::new(AgentContext::new(Arc::new(masker), client.clone()))
    }

    #[tokio::test]
    async fn delivers_records_and_masked_console() {
        let client = Arc::new(MockTelemetryClient::new());
        let request = JobRequest::new(
            "build",
            vec![
                Box::new(Echo {
                    name: "one",
                    lines: vec!["token abc123"],
                    result: TaskResult::Succeeded,
                }),
                Box::new(Echo {
                    name: "two",
                    lines: vec!["done"],
                    result: TaskResult::SucceededWithIssues,
                }),
            ],
        );
        let job_record = request.record_id;

        let outcome = runner(&client, &["abc123"]).run(request).await.unwrap();

        assert_eq!(outcome.result, TaskResult::SucceededWithIssues);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(
            client.console_lines(),
            vec!["token ********".to_string(), "done".to_string()]
        );

        let job = client.record(job_record).unwrap();
        assert_eq!(job.state, Some(TimelineRecordState::Completed));
        assert_eq!(job.result, Some(TaskResult::SucceededWithIssues));
        assert_eq!(job.record_type.as_deref(), Some("Job"));
    }

    #[tokio::test]
    async fn step_logs_are_uploaded() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockTelemetryClient::new());
        let request = JobRequest::new(
            "build",
            vec![Box::new(Echo {
                name: "one",
                lines: vec!["a", "b"],
                result: TaskResult::Succeeded,
            })],
        )
        .with_log_dir(temp.path());

        runner(&client, &[]).run(request).await.unwrap();

        let logs = client.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].1, "a\nb\n");
    }

    #[tokio::test]
    async fn job_without_steps_succeeds() {
        let client = Arc::new(MockTelemetryClient::new());
        let outcome = runner(&client, &[])
            .run(JobRequest::new("empty", Vec::new()))
            .await
            .unwrap();
        assert_eq!(outcome.result, TaskResult::Succeeded);
    }

    #[tokio::test]
    async fn nil_timeline_is_rejected() {
        let client = Arc::new(MockTelemetryClient::new());
        let mut request = JobRequest::new("bad", Vec::new());
        request.timeline_id = Uuid::nil();

        let err = runner(&client, &[]).run(request).await.unwrap_err();
        assert!(matches!(err, HaulerError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn console_failures_surface_after_the_job() {
        let client = Arc::new(MockTelemetryClient::new());
        client.fail_console(true);
        let request = JobRequest::new(
            "noisy",
            vec![Box::new(Echo {
                name: "one",
                lines: vec!["x"],
                result: TaskResult::Succeeded,
            })],
        );

        let err = runner(&client, &[]).run(request).await.unwrap_err();
        assert!(matches!(err, HaulerError::QueueDrain { .. }));
    }
}
