//! In-memory telemetry client for testing.
//!
//! `MockTelemetryClient` implements [`TelemetryClient`] and records every
//! successful call for later assertion. Each kind of call can be made to
//! fail on demand.
//!
//! # Example
//!
//! ```
//! use hauler::delivery::{MockTelemetryClient, TelemetryClient};
//! use uuid::Uuid;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client = MockTelemetryClient::new();
//! let (timeline, record) = (Uuid::new_v4(), Uuid::new_v4());
//!
//! client.append_console_lines(timeline, record, &["hi".to_string()]).await.unwrap();
//! assert_eq!(client.console_lines(), vec!["hi".to_string()]);
//!
//! client.fail_console(true);
//! assert!(client.append_console_lines(timeline, record, &[]).await.is_err());
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use super::client::{Content, LogDescriptor, TelemetryClient, Timeline};
use super::record::{merge_records, LogReference, TimelineRecord};
use crate::error::{HaulerError, Result};

/// An attachment captured by [`MockTelemetryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAttachment {
    pub timeline_id: Uuid,
    pub record_id: Uuid,
    pub kind: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Default)]
struct Recorded {
    console: Vec<Vec<String>>,
    timelines: Vec<Uuid>,
    updates: Vec<(Uuid, Vec<TimelineRecord>)>,
    logs: Vec<(LogReference, String)>,
    attachments: Vec<MockAttachment>,
}

/// Recording telemetry client with failure injection.
#[derive(Debug, Default)]
pub struct MockTelemetryClient {
    recorded: Mutex<Recorded>,
    next_log_id: AtomicU64,
    fail_console: AtomicBool,
    fail_create_timeline: AtomicBool,
    fail_uploads: AtomicBool,
    failing_updates: AtomicUsize,
}

impl MockTelemetryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `append_console_lines` fail until turned off.
    pub fn fail_console(&self, fail: bool) {
        self.fail_console.store(fail, Ordering::SeqCst);
    }

    /// Make `create_timeline` fail until turned off.
    pub fn fail_create_timeline(&self, fail: bool) {
        self.fail_create_timeline.store(fail, Ordering::SeqCst);
    }

    /// Make log and attachment calls fail until turned off.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `update_timeline_records` fail.
    pub fn fail_timeline_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    /// Console batches, in the order they were appended.
    pub fn console_batches(&self) -> Vec<Vec<String>> {
        self.recorded().console.clone()
    }

    /// Every console line across all batches.
    pub fn console_lines(&self) -> Vec<String> {
        self.recorded().console.concat()
    }

    /// Timelines created through `create_timeline`.
    pub fn created_timelines(&self) -> Vec<Uuid> {
        self.recorded().timelines.clone()
    }

    /// Each successful `update_timeline_records` call.
    pub fn timeline_updates(&self) -> Vec<(Uuid, Vec<TimelineRecord>)> {
        self.recorded().updates.clone()
    }

    /// The merged view of one record across every update sent for it.
    pub fn record(&self, record_id: Uuid) -> Option<TimelineRecord> {
        let recorded = self.recorded();
        let updates = recorded
            .updates
            .iter()
            .flat_map(|(_, records)| records.iter())
            .filter(|r| r.id == record_id)
            .cloned();
        merge_records(updates).pop()
    }

    /// Uploaded logs and their content.
    pub fn logs(&self) -> Vec<(LogReference, String)> {
        self.recorded().logs.clone()
    }

    pub fn attachments(&self) -> Vec<MockAttachment> {
        self.recorded().attachments.clone()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_uploads(&self, operation: &str) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(HaulerError::telemetry(operation, "injected failure"));
        }
        Ok(())
    }
}

async fn read_to_string(content: Content<'_>) -> Result<String> {
    let mut text = String::new();
    content.read_to_string(&mut text).await?;
    Ok(text)
}

#[async_trait]
impl TelemetryClient for MockTelemetryClient {
    async fn append_console_lines(
        &self,
        _timeline_id: Uuid,
        _record_id: Uuid,
        lines: &[String],
    ) -> Result<()> {
        if self.fail_console.load(Ordering::SeqCst) {
            return Err(HaulerError::telemetry(
                "append_console_lines",
                "injected failure",
            ));
        }
        self.recorded().console.push(lines.to_vec());
        Ok(())
    }

    async fn create_timeline(&self, timeline_id: Uuid) -> Result<Timeline> {
        if self.fail_create_timeline.load(Ordering::SeqCst) {
            return Err(HaulerError::telemetry("create_timeline", "injected failure"));
        }
        self.recorded().timelines.push(timeline_id);
        Ok(Timeline {
            id: timeline_id,
            change_id: 0,
        })
    }

    async fn update_timeline_records(
        &self,
        timeline_id: Uuid,
        records: &[TimelineRecord],
    ) -> Result<Vec<TimelineRecord>> {
        let failing = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(HaulerError::telemetry(
                "update_timeline_records",
                "injected failure",
            ));
        }
        self.recorded()
            .updates
            .push((timeline_id, records.to_vec()));
        Ok(records.to_vec())
    }

    async fn create_log(&self, descriptor: &LogDescriptor) -> Result<LogReference> {
        self.check_uploads("create_log")?;
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LogReference {
            id,
            location: Some(descriptor.path.clone()),
        })
    }

    async fn append_log_content(&self, log_id: u64, content: Content<'_>) -> Result<()> {
        self.check_uploads("append_log_content")?;
        let text = read_to_string(content).await?;
        let reference = LogReference {
            id: log_id,
            location: None,
        };
        self.recorded().logs.push((reference, text));
        Ok(())
    }

    async fn create_attachment(
        &self,
        timeline_id: Uuid,
        record_id: Uuid,
        attachment_type: &str,
        name: &str,
        content: Content<'_>,
    ) -> Result<()> {
        self.check_uploads("create_attachment")?;
        let text = read_to_string(content).await?;
        self.recorded().attachments.push(MockAttachment {
            timeline_id,
            record_id,
            kind: attachment_type.to_string(),
            name: name.to_string(),
            content: text,
        });
        Ok(())
    }
}
