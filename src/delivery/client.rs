//! The remote telemetry service, as seen by the delivery queue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use uuid::Uuid;

use super::record::{LogReference, TimelineRecord};
use crate::error::Result;

/// Readable content handed to an upload call.
pub type Content<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// A timeline known to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: Uuid,
    #[serde(default)]
    pub change_id: u32,
}

/// Request for a new log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDescriptor {
    pub path: String,
}

impl LogDescriptor {
    /// Descriptor for the log of one timeline record.
    pub fn for_record(record_id: Uuid) -> Self {
        Self {
            path: format!("logs/{}", record_id),
        }
    }
}

/// Calls the delivery queue makes against the remote service.
///
/// Every call may fail transiently; the queue decides whether a failure is
/// retried, logged, or surfaced.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Append console lines to a record's live output feed.
    async fn append_console_lines(
        &self,
        timeline_id: Uuid,
        record_id: Uuid,
        lines: &[String],
    ) -> Result<()>;

    /// Create a timeline.
    async fn create_timeline(&self, timeline_id: Uuid) -> Result<Timeline>;

    /// Create or update records on a timeline.
    async fn update_timeline_records(
        &self,
        timeline_id: Uuid,
        records: &[TimelineRecord],
    ) -> Result<Vec<TimelineRecord>>;

    /// Allocate a log.
    async fn create_log(&self, descriptor: &LogDescriptor) -> Result<LogReference>;

    /// Stream content into a previously created log.
    async fn append_log_content(&self, log_id: u64, content: Content<'_>) -> Result<()>;

    /// Attach a file of the given type to a record.
    async fn create_attachment(
        &self,
        timeline_id: Uuid,
        record_id: Uuid,
        attachment_type: &str,
        name: &str,
        content: Content<'_>,
    ) -> Result<()>;
}
