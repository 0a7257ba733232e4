//! Execution context of a job or step.
//!
//! A context owns one timeline record. Everything a step reports goes
//! through it: output lines and issues are masked first, then queued as
//! console lines and timeline record updates.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::result::TaskResult;
use crate::delivery::{
    DeliveryHandle, Issue, IssueType, TimelineRecord, TimelineRecordState, UploadItem,
};
use crate::secrets::SecretMasker;

/// Record type of a job context.
pub const JOB_RECORD_TYPE: &str = "Job";
/// Record type of a step context.
pub const TASK_RECORD_TYPE: &str = "Task";

/// Progress, output, and result of one job or step.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use hauler::secrets::SecretMasker;
/// use hauler::steps::ExecutionContext;
/// use uuid::Uuid;
///
/// let masker = Arc::new(SecretMasker::new());
/// masker.add_value("hunter2");
///
/// let job = ExecutionContext::new("build", Uuid::new_v4(), masker);
/// let mut step = job.child("login", 1);
/// step.output("password is hunter2");
///
/// assert_eq!(step.output_lines(), ["password is ********"]);
/// ```
pub struct ExecutionContext {
    name: String,
    timeline_id: Uuid,
    record_id: Uuid,
    parent_id: Option<Uuid>,
    record_type: &'static str,
    order: Option<u32>,
    masker: Arc<SecretMasker>,
    delivery: Option<DeliveryHandle>,
    log_dir: Option<PathBuf>,
    result: Option<TaskResult>,
    issues: Vec<Issue>,
    lines: Vec<String>,
}

impl ExecutionContext {
    /// A job-level context with a fresh record id.
    pub fn new(name: impl Into<String>, timeline_id: Uuid, masker: Arc<SecretMasker>) -> Self {
        Self {
            name: name.into(),
            timeline_id,
            record_id: Uuid::new_v4(),
            parent_id: None,
            record_type: JOB_RECORD_TYPE,
            order: None,
            masker,
            delivery: None,
            log_dir: None,
            result: None,
            issues: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn with_record_id(mut self, record_id: Uuid) -> Self {
        self.record_id = record_id;
        self
    }

    /// Send output and record updates through `delivery`.
    pub fn with_delivery(mut self, delivery: DeliveryHandle) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Write each context's output to a log file in `dir` on completion and
    /// upload it.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// A step context under this one, on the same timeline.
    pub fn child(&self, name: impl Into<String>, order: u32) -> Self {
        Self {
            name: name.into(),
            timeline_id: self.timeline_id,
            record_id: Uuid::new_v4(),
            parent_id: Some(self.record_id),
            record_type: TASK_RECORD_TYPE,
            order: Some(order),
            masker: self.masker.clone(),
            delivery: self.delivery.clone(),
            log_dir: self.log_dir.clone(),
            result: None,
            issues: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeline_id(&self) -> Uuid {
        self.timeline_id
    }

    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn masker(&self) -> &SecretMasker {
        &self.masker
    }

    /// `None` until the context completes, or while no step has
    /// contributed to a job.
    pub fn result(&self) -> Option<TaskResult> {
        self.result
    }

    pub fn set_result(&mut self, result: TaskResult) {
        self.result = Some(result);
    }

    /// Fold a step's contribution into this context's result.
    pub fn merge_result(&mut self, incoming: TaskResult) {
        self.result = TaskResult::merge(self.result, incoming);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn error_count(&self) -> u32 {
        self.count(IssueType::Error)
    }

    pub fn warning_count(&self) -> u32 {
        self.count(IssueType::Warning)
    }

    fn count(&self, issue_type: IssueType) -> u32 {
        self.issues
            .iter()
            .filter(|i| i.issue_type == issue_type)
            .count() as u32
    }

    /// Masked output written so far.
    pub fn output_lines(&self) -> &[String] {
        &self.lines
    }

    /// Write one line of output.
    pub fn output(&mut self, line: &str) {
        let masked = self.masker.mask(line);
        self.write_masked(masked);
    }

    /// Record an error issue and echo it to the output.
    pub fn error(&mut self, message: &str) {
        let masked = self.masker.mask(message);
        self.write_masked(format!("##[error]{}", masked));
        self.issues.push(Issue::error(masked));
    }

    /// Record a warning issue and echo it to the output.
    pub fn warning(&mut self, message: &str) {
        let masked = self.masker.mask(message);
        self.write_masked(format!("##[warning]{}", masked));
        self.issues.push(Issue::warning(masked));
    }

    // `line` must already be masked.
    fn write_masked(&mut self, line: String) {
        if let Some(delivery) = &self.delivery {
            if let Err(err) = delivery.queue_console_line(line.clone()) {
                tracing::debug!(error = %err, "console line not queued");
            }
        }
        self.lines.push(line);
    }

    /// Report progress on the record.
    pub fn set_progress(&mut self, percent: u8, operation: Option<&str>) {
        let mut record = TimelineRecord::new(self.record_id);
        record.percent_complete = Some(percent.min(100));
        record.current_operation = operation.map(|op| self.masker.mask(op));
        self.send(record);
    }

    /// Mark the record as started.
    pub fn start(&mut self) {
        let mut record = self.identity();
        record.state = Some(TimelineRecordState::InProgress);
        record.start_time = Some(Utc::now());
        self.send(record);
    }

    /// Mark the record as completed with `result`.
    ///
    /// With a log directory configured, buffered output is written to
    /// `<dir>/<record-id>.log` and queued for upload.
    pub async fn complete(&mut self, result: TaskResult) {
        self.result = Some(result);
        self.upload_log().await;

        let mut record = self.identity();
        record.state = Some(TimelineRecordState::Completed);
        record.result = Some(result);
        record.percent_complete = Some(100);
        record.finish_time = Some(Utc::now());
        record.error_count = Some(self.error_count());
        record.warning_count = Some(self.warning_count());
        record.issues = self.issues.clone();
        self.send(record);
    }

    /// Complete the record as `Skipped` without ever starting it.
    pub fn skip(&mut self) {
        self.result = Some(TaskResult::Skipped);

        let mut record = self.identity();
        record.state = Some(TimelineRecordState::Completed);
        record.result = Some(TaskResult::Skipped);
        record.finish_time = Some(Utc::now());
        self.send(record);
    }

    fn identity(&self) -> TimelineRecord {
        let mut record = TimelineRecord::new(self.record_id);
        record.name = Some(self.masker.mask(&self.name));
        record.record_type = Some(self.record_type.to_string());
        record.parent_id = self.parent_id;
        record.order = self.order;
        record
    }

    fn send(&self, record: TimelineRecord) {
        let Some(delivery) = &self.delivery else {
            return;
        };
        if let Err(err) = delivery.queue_timeline_record_update(self.timeline_id, record) {
            tracing::warn!(record = %self.record_id, error = %err, "timeline record update not queued");
        }
    }

    async fn upload_log(&self) {
        let (Some(dir), Some(delivery)) = (&self.log_dir, &self.delivery) else {
            return;
        };
        if self.lines.is_empty() {
            return;
        }

        let path = dir.join(format!("{}.log", self.record_id));
        let mut content = self.lines.join("\n");
        content.push('\n');

        let written = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&path, content).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            tracing::warn!(path = %path.display(), error = %err, "failed to write step log");
            return;
        }

        let item = UploadItem::log(self.timeline_id, self.record_id, path);
        if let Err(err) = delivery.queue_file_upload(item) {
            tracing::warn!(record = %self.record_id, error = %err, "step log upload not queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliverySettings;
    use crate::delivery::{DeliveryQueue, JobTarget, MockTelemetryClient};
    use tempfile::TempDir;

    fn masker(values: &[&str]) -> Arc<SecretMasker> {
        let masker = SecretMasker::new();
        masker.add_values(values.iter().copied());
        Arc::new(masker)
    }

    #[test]
    fn child_links_to_parent() {
        let job = ExecutionContext::new("job", Uuid::new_v4(), masker(&[]));
        let step = job.child("step", 3);
        assert_eq!(step.timeline_id(), job.timeline_id());
        assert_ne!(step.record_id(), job.record_id());
        assert_eq!(step.identity().parent_id, Some(job.record_id()));
        assert_eq!(step.identity().order, Some(3));
        assert_eq!(step.identity().record_type.as_deref(), Some(TASK_RECORD_TYPE));
    }

    #[test]
    fn issues_are_masked_and_counted() {
        let mut ctx = ExecutionContext::new("job", Uuid::new_v4(), masker(&["s3cr3t"]));
        ctx.error("bad s3cr3t");
        ctx.warning("careful");
        ctx.warning("again");

        assert_eq!(ctx.error_count(), 1);
        assert_eq!(ctx.warning_count(), 2);
        assert_eq!(ctx.issues()[0].message, "bad ********");
        assert_eq!(ctx.output_lines()[0], "##[error]bad ********");
    }

    #[test]
    fn issue_text_is_masked_once() {
        let mut ctx = ExecutionContext::new("job", Uuid::new_v4(), masker(&["s3cr3t", "]*"]));
        ctx.error("s3cr3t");
        ctx.warning("s3cr3t");

        assert_eq!(ctx.output_lines(), ["##[error]********", "##[warning]********"]);
        assert_eq!(ctx.issues()[0].message, "********");
    }

    #[test]
    fn merge_result_never_downgrades() {
        let mut ctx = ExecutionContext::new("job", Uuid::new_v4(), masker(&[]));
        assert_eq!(ctx.result(), None);
        ctx.merge_result(TaskResult::Failed);
        ctx.merge_result(TaskResult::Succeeded);
        assert_eq!(ctx.result(), Some(TaskResult::Failed));
    }

    #[tokio::test]
    async fn lifecycle_is_delivered() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(MockTelemetryClient::new());
        let queue = DeliveryQueue::new(client.clone(), DeliverySettings::default());
        let timeline = Uuid::new_v4();
        let job_record = Uuid::new_v4();

        let job = ExecutionContext::new("job", timeline, masker(&["tok"]))
            .with_record_id(job_record)
            .with_delivery(queue.handle())
            .with_log_dir(temp.path());
        let mut step = job.child("compile", 1);

        queue.start(JobTarget::new(timeline, job_record)).unwrap();
        step.start();
        step.output("using tok");
        step.complete(TaskResult::Succeeded).await;
        queue.shutdown().await.unwrap();

        assert_eq!(client.console_lines(), vec!["using ********".to_string()]);

        let record = client.record(step.record_id()).unwrap();
        assert_eq!(record.name.as_deref(), Some("compile"));
        assert_eq!(record.state, Some(TimelineRecordState::Completed));
        assert_eq!(record.result, Some(TaskResult::Succeeded));
        assert!(record.start_time.is_some());
        assert!(record.finish_time.is_some());
        assert!(record.log.is_some());

        let logs = client.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].1, "using ********\n");
        assert!(!temp.path().join(format!("{}.log", step.record_id())).exists());
    }

    #[tokio::test]
    async fn skip_emits_completed_skipped_record() {
        let client = Arc::new(MockTelemetryClient::new());
        let queue = DeliveryQueue::new(client.clone(), DeliverySettings::default());
        let timeline = Uuid::new_v4();

        let job = ExecutionContext::new("job", timeline, masker(&[])).with_delivery(queue.handle());
        let mut step = job.child("later", 2);
        step.skip();

        queue
            .start(JobTarget::new(timeline, job.record_id()))
            .unwrap();
        queue.shutdown().await.unwrap();

        let record = client.record(step.record_id()).unwrap();
        assert_eq!(record.state, Some(TimelineRecordState::Completed));
        assert_eq!(record.result, Some(TaskResult::Skipped));
        assert!(record.start_time.is_none());
        assert_eq!(step.result(), Some(TaskResult::Skipped));
    }
}
