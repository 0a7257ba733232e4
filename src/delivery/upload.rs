//! File uploads.
//!
//! Logs are allocated with `create_log`, streamed with `append_log_content`,
//! and then linked from their record through a timeline update. Everything
//! else goes through `create_attachment`. Failed uploads are logged and
//! dropped.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use super::client::{LogDescriptor, TelemetryClient};
use super::queue::{DeliveryHandle, Drain};
use super::record::TimelineRecord;
use crate::error::{HaulerError, Result};

/// What kind of file an upload carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentType {
    /// A step log; uploaded as a log and linked from the record.
    Log,
    /// Any other attachment, by type name.
    Attachment(String),
}

impl fmt::Display for AttachmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentType::Log => write!(f, "log"),
            AttachmentType::Attachment(kind) => write!(f, "{}", kind),
        }
    }
}

/// A file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub timeline_id: Uuid,
    pub record_id: Uuid,
    pub attachment_type: AttachmentType,
    /// Display name on the remote side
    pub name: String,
    /// Local file to read
    pub path: PathBuf,
    /// Delete `path` once the upload is confirmed
    pub delete_source: bool,
}

impl UploadItem {
    /// A step log that is removed locally after upload.
    pub fn log(timeline_id: Uuid, record_id: Uuid, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.log", record_id));
        Self {
            timeline_id,
            record_id,
            attachment_type: AttachmentType::Log,
            name,
            path,
            delete_source: true,
        }
    }

    /// A generic attachment that stays on disk.
    pub fn attachment(
        timeline_id: Uuid,
        record_id: Uuid,
        kind: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            timeline_id,
            record_id,
            attachment_type: AttachmentType::Attachment(kind.into()),
            name: name.into(),
            path: path.into(),
            delete_source: false,
        }
    }
}

pub(crate) struct UploadDrain {
    items: UnboundedReceiver<UploadItem>,
    client: Arc<dyn TelemetryClient>,
    records: DeliveryHandle,
    uploads_per_cycle: usize,
}

impl UploadDrain {
    pub(crate) fn new(
        items: UnboundedReceiver<UploadItem>,
        client: Arc<dyn TelemetryClient>,
        records: DeliveryHandle,
        uploads_per_cycle: usize,
    ) -> Self {
        Self {
            items,
            client,
            records,
            uploads_per_cycle: uploads_per_cycle.max(1),
        }
    }

    async fn upload(&self, item: &UploadItem) -> Result<()> {
        match &item.attachment_type {
            AttachmentType::Log => {
                let log = self
                    .client
                    .create_log(&LogDescriptor::for_record(item.record_id))
                    .await?;
                let mut content = File::open(&item.path).await?;
                self.client.append_log_content(log.id, &mut content).await?;

                let mut record = TimelineRecord::new(item.record_id);
                record.log = Some(log);
                self.records
                    .queue_timeline_record_update(item.timeline_id, record)?;
            }
            AttachmentType::Attachment(kind) => {
                let mut content = File::open(&item.path).await?;
                self.client
                    .create_attachment(
                        item.timeline_id,
                        item.record_id,
                        kind,
                        &item.name,
                        &mut content,
                    )
                    .await?;
            }
        }

        if item.delete_source {
            if let Err(err) = tokio::fs::remove_file(&item.path).await {
                tracing::warn!(path = %item.path.display(), error = %err, "failed to delete uploaded file");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Drain for UploadDrain {
    const NAME: &'static str = "upload";

    async fn cycle(&mut self, final_drain: bool) -> Result<()> {
        let mut files = Vec::new();
        while let Ok(item) = self.items.try_recv() {
            files.push(item);
            if !final_drain && files.len() >= self.uploads_per_cycle {
                break;
            }
        }
        if files.is_empty() {
            return Ok(());
        }

        let mut errors = Vec::new();
        for file in &files {
            if let Err(err) = self.upload(file).await {
                tracing::warn!(
                    path = %file.path.display(),
                    kind = %file.attachment_type,
                    error = %err,
                    "upload failed; dropping file"
                );
                errors.push(err);
            }
        }

        tracing::info!("uploaded {}/{} files", files.len() - errors.len(), files.len());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HaulerError::DeliveryFailed {
                queue: Self::NAME.to_string(),
                errors,
            })
        }
    }
}
