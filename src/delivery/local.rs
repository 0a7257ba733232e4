//! Directory-backed telemetry client.
//!
//! Layout under the root directory:
//!
//! ```text
//! console/<record-id>.log               live console feed, appended
//! timelines/<timeline-id>.json          current records of each timeline
//! logs/<log-id>.log                     uploaded logs
//! attachments/<record-id>/<type>/<name> uploaded attachments
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::client::{Content, LogDescriptor, TelemetryClient, Timeline};
use super::record::{merge_records, LogReference, TimelineRecord};
use crate::error::{HaulerError, Result};

/// Writes telemetry to files under a root directory.
#[derive(Debug)]
pub struct LocalTelemetryClient {
    root: PathBuf,
    next_log_id: AtomicU64,
    timelines: Mutex<()>,
}

impl LocalTelemetryClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_log_id: AtomicU64::new(1),
            timelines: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the JSON file holding a timeline's records.
    pub fn timeline_path(&self, timeline_id: Uuid) -> PathBuf {
        self.root
            .join("timelines")
            .join(format!("{}.json", timeline_id))
    }

    /// Path of a record's console feed.
    pub fn console_path(&self, record_id: Uuid) -> PathBuf {
        self.root.join("console").join(format!("{}.log", record_id))
    }

    /// Path of an uploaded log.
    pub fn log_path(&self, log_id: u64) -> PathBuf {
        self.root.join("logs").join(format!("{}.log", log_id))
    }

    /// Read the records currently stored for a timeline.
    pub async fn read_timeline(&self, timeline_id: Uuid) -> Result<Vec<TimelineRecord>> {
        let path = self.timeline_path(timeline_id);
        match fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => Ok(serde_json::from_str(&content)?),
            Ok(_) => Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_timeline(&self, timeline_id: Uuid, records: &[TimelineRecord]) -> Result<()> {
        let path = self.timeline_path(timeline_id);
        ensure_parent(&path).await?;
        fs::write(&path, serde_json::to_vec_pretty(records)?).await?;
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Keep a remote-supplied name inside its directory.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[async_trait]
impl TelemetryClient for LocalTelemetryClient {
    async fn append_console_lines(
        &self,
        _timeline_id: Uuid,
        record_id: Uuid,
        lines: &[String],
    ) -> Result<()> {
        let path = self.console_path(record_id);
        ensure_parent(&path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn create_timeline(&self, timeline_id: Uuid) -> Result<Timeline> {
        let _guard = self.timelines.lock().await;
        if !fs::try_exists(self.timeline_path(timeline_id)).await? {
            self.write_timeline(timeline_id, &[]).await?;
        }
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
        let _guard = self.timelines.lock().await;
        let existing = self.read_timeline(timeline_id).await?;
        let merged = merge_records(existing.into_iter().chain(records.iter().cloned()));
        self.write_timeline(timeline_id, &merged).await?;

        Ok(merged
            .into_iter()
            .filter(|stored| records.iter().any(|r| r.id == stored.id))
            .collect())
    }

    async fn create_log(&self, descriptor: &LogDescriptor) -> Result<LogReference> {
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        let path = self.log_path(id);
        ensure_parent(&path).await?;
        fs::File::create(&path).await?;
        tracing::debug!(log = id, descriptor = %descriptor.path, "created log");
        Ok(LogReference {
            id,
            location: Some(path.display().to_string()),
        })
    }

    async fn append_log_content(&self, log_id: u64, content: Content<'_>) -> Result<()> {
        let path = self.log_path(log_id);
        let mut file = OpenOptions::new().append(true).open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HaulerError::telemetry("append_log_content", format!("unknown log {}", log_id))
            } else {
                HaulerError::Io(e)
            }
        })?;
        tokio::io::copy(content, &mut file).await?;
        file.flush().await?;
        Ok(())
    }

    async fn create_attachment(
        &self,
        _timeline_id: Uuid,
        record_id: Uuid,
        attachment_type: &str,
        name: &str,
        content: Content<'_>,
    ) -> Result<()> {
        let path = self
            .root
            .join("attachments")
            .join(record_id.to_string())
            .join(sanitize(attachment_type))
            .join(sanitize(name));
        ensure_parent(&path).await?;
        let mut file = fs::File::create(&path).await?;
        tokio::io::copy(content, &mut file).await?;
        file.flush().await?;
        Ok(())
    }
}
