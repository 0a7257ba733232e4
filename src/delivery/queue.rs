//! The delivery queue.
//!
//! Producers hold a cheap, cloneable [`DeliveryHandle`] and enqueue without
//! blocking. Three background loops, one per telemetry kind, wake on their
//! own interval and ship what has accumulated through the
//! [`TelemetryClient`]. On [`DeliveryQueue::shutdown`] the loops stop, hand
//! their state back, and every queue is drained once more without caps.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::select;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::client::TelemetryClient;
use super::console::ConsoleDrain;
use super::record::TimelineRecord;
use super::timeline::TimelineDrain;
use super::upload::{UploadDrain, UploadItem};
use crate::config::DeliverySettings;
use crate::error::{HaulerError, Result};

/// The job whose console feed and timeline the queue serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTarget {
    /// Timeline of the job; known to exist remotely.
    pub timeline_id: Uuid,
    /// Record whose console feed receives output lines.
    pub record_id: Uuid,
}

impl JobTarget {
    pub fn new(timeline_id: Uuid, record_id: Uuid) -> Self {
        Self {
            timeline_id,
            record_id,
        }
    }
}

/// A timeline record update waiting for its timeline's drain.
#[derive(Debug)]
pub(crate) struct TimelineUpdate {
    pub timeline_id: Uuid,
    pub record: TimelineRecord,
}

/// Producer side of the delivery queue.
///
/// Enqueueing never blocks. Once the queue has shut down every enqueue
/// returns [`HaulerError::QueueClosed`].
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    console: UnboundedSender<String>,
    timeline: UnboundedSender<TimelineUpdate>,
    uploads: UnboundedSender<UploadItem>,
}

impl DeliveryHandle {
    /// Queue one line for the job's live console feed.
    pub fn queue_console_line(&self, line: impl Into<String>) -> Result<()> {
        self.console
            .send(line.into())
            .map_err(|_| HaulerError::QueueClosed)
    }

    /// Queue a partial update for a record on `timeline_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a nil timeline or record id.
    pub fn queue_timeline_record_update(
        &self,
        timeline_id: Uuid,
        record: TimelineRecord,
    ) -> Result<()> {
        require_id("timeline_id", timeline_id)?;
        require_id("record.id", record.id)?;

        tracing::debug!(timeline = %timeline_id, record = %record.id, "enqueue timeline record update");
        self.timeline
            .send(TimelineUpdate {
                timeline_id,
                record,
            })
            .map_err(|_| HaulerError::QueueClosed)
    }

    /// Queue a file for upload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for nil ids, an empty name, or a source file
    /// that does not exist.
    pub fn queue_file_upload(&self, item: UploadItem) -> Result<()> {
        require_id("timeline_id", item.timeline_id)?;
        require_id("record_id", item.record_id)?;
        if item.name.trim().is_empty() {
            return Err(HaulerError::invalid_argument("name", "must not be empty"));
        }
        require_file(&item.path)?;

        tracing::debug!(
            record = %item.record_id,
            kind = %item.attachment_type,
            path = %item.path.display(),
            "enqueue file upload"
        );
        self.uploads
            .send(item)
            .map_err(|_| HaulerError::QueueClosed)
    }
}

fn require_id(name: &str, id: Uuid) -> Result<()> {
    if id.is_nil() {
        return Err(HaulerError::invalid_argument(name, "must not be nil"));
    }
    Ok(())
}

fn require_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(HaulerError::invalid_argument(
            "path",
            format!("file not found: {}", path.display()),
        ));
    }
    Ok(())
}

/// One telemetry kind's consumer.
#[async_trait]
pub(crate) trait Drain: Send + 'static {
    const NAME: &'static str;

    /// Ship what is pending. Periodic cycles honour the per-cycle caps; the
    /// final drain sends everything.
    async fn cycle(&mut self, final_drain: bool) -> Result<()>;
}

async fn run_drain<D: Drain>(mut drain: D, every: Duration, shutdown: CancellationToken) -> D {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!(queue = D::NAME, "drain loop stopping");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = drain.cycle(false).await {
                    tracing::warn!(queue = D::NAME, error = %err, "delivery cycle failed");
                }
            }
        }
    }

    drain
}

struct Receivers {
    console: UnboundedReceiver<String>,
    timeline: UnboundedReceiver<TimelineUpdate>,
    uploads: UnboundedReceiver<UploadItem>,
}

struct Running {
    shutdown: CancellationToken,
    console: JoinHandle<ConsoleDrain>,
    uploads: JoinHandle<UploadDrain>,
    timeline: JoinHandle<TimelineDrain>,
}

enum QueueState {
    Idle(Receivers),
    Running(Running),
    Stopped,
}

/// Batches and ships console lines, timeline records, and file uploads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use hauler::config::DeliverySettings;
/// use hauler::delivery::{DeliveryQueue, JobTarget, MockTelemetryClient};
/// use uuid::Uuid;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let client = Arc::new(MockTelemetryClient::new());
/// let queue = DeliveryQueue::new(client.clone(), DeliverySettings::default());
/// queue.start(JobTarget::new(Uuid::new_v4(), Uuid::new_v4())).unwrap();
///
/// queue.handle().queue_console_line("hello").unwrap();
/// queue.shutdown().await.unwrap();
///
/// assert_eq!(client.console_lines(), vec!["hello".to_string()]);
/// # }
/// ```
pub struct DeliveryQueue {
    client: Arc<dyn TelemetryClient>,
    settings: DeliverySettings,
    handle: DeliveryHandle,
    state: Mutex<QueueState>,
}

impl DeliveryQueue {
    pub fn new(client: Arc<dyn TelemetryClient>, settings: DeliverySettings) -> Self {
        let (console_tx, console_rx) = mpsc::unbounded_channel();
        let (timeline_tx, timeline_rx) = mpsc::unbounded_channel();
        let (uploads_tx, uploads_rx) = mpsc::unbounded_channel();

        Self {
            client,
            settings,
            handle: DeliveryHandle {
                console: console_tx,
                timeline: timeline_tx,
                uploads: uploads_tx,
            },
            state: Mutex::new(QueueState::Idle(Receivers {
                console: console_rx,
                timeline: timeline_rx,
                uploads: uploads_rx,
            })),
        }
    }

    /// A producer handle. Work queued before [`start`](Self::start) is kept.
    pub fn handle(&self) -> DeliveryHandle {
        self.handle.clone()
    }

    /// See [`DeliveryHandle::queue_console_line`].
    pub fn queue_console_line(&self, line: impl Into<String>) -> Result<()> {
        self.handle.queue_console_line(line)
    }

    /// See [`DeliveryHandle::queue_timeline_record_update`].
    pub fn queue_timeline_record_update(
        &self,
        timeline_id: Uuid,
        record: TimelineRecord,
    ) -> Result<()> {
        self.handle.queue_timeline_record_update(timeline_id, record)
    }

    /// See [`DeliveryHandle::queue_file_upload`].
    pub fn queue_file_upload(&self, item: UploadItem) -> Result<()> {
        self.handle.queue_file_upload(item)
    }

    /// Whether the background loops are running.
    pub fn is_running(&self) -> bool {
        matches!(*self.lock_state(), QueueState::Running(_))
    }

    /// Spawn the three drain loops on the current tokio runtime.
    ///
    /// The job timeline is registered as known. Starting a queue that is
    /// already running, or has shut down, does nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for nil target ids.
    pub fn start(&self, target: JobTarget) -> Result<()> {
        require_id("timeline_id", target.timeline_id)?;
        require_id("record_id", target.record_id)?;
        self.settings.validate()?;

        let mut state = self.lock_state();
        let receivers = match std::mem::replace(&mut *state, QueueState::Stopped) {
            QueueState::Idle(receivers) => receivers,
            other => {
                *state = other;
                tracing::debug!("delivery queue already started");
                return Ok(());
            }
        };

        let shutdown = CancellationToken::new();
        let settings = &self.settings;

        let console = ConsoleDrain::new(
            receivers.console,
            self.client.clone(),
            target,
            settings.console_batch_size,
            settings.console_batches_per_cycle,
        );
        let uploads = UploadDrain::new(
            receivers.uploads,
            self.client.clone(),
            self.handle.clone(),
            settings.uploads_per_cycle,
        );
        let timeline = TimelineDrain::new(
            receivers.timeline,
            self.client.clone(),
            target.timeline_id,
            settings.timeline_records_per_cycle,
        );

        *state = QueueState::Running(Running {
            console: tokio::spawn(run_drain(
                console,
                settings.console_interval(),
                shutdown.clone(),
            )),
            uploads: tokio::spawn(run_drain(
                uploads,
                settings.upload_interval(),
                shutdown.clone(),
            )),
            timeline: tokio::spawn(run_drain(
                timeline,
                settings.timeline_interval(),
                shutdown.clone(),
            )),
            shutdown,
        });

        tracing::info!(
            timeline = %target.timeline_id,
            record = %target.record_id,
            "delivery queue started"
        );
        Ok(())
    }

    /// Stop the loops and flush everything still queued.
    ///
    /// The current cycle of each loop finishes, then console lines, uploads,
    /// and timeline records are each drained once without caps, in that
    /// order, so log records produced by uploads are still delivered.
    /// Shutting down a queue that never started, or twice, does nothing.
    ///
    /// # Errors
    ///
    /// Returns `QueueDrain` with every failure of the final drain.
    pub async fn shutdown(&self) -> Result<()> {
        let running = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut *state, QueueState::Stopped) {
                QueueState::Running(running) => running,
                other => {
                    *state = other;
                    tracing::debug!("delivery queue not running; shutdown is a no-op");
                    return Ok(());
                }
            }
        };

        tracing::info!("delivery queue shutting down");
        running.shutdown.cancel();
        let (console, uploads, timeline) =
            tokio::join!(running.console, running.uploads, running.timeline);

        let mut errors = Vec::new();
        final_drain(console, &mut errors).await;
        final_drain(uploads, &mut errors).await;
        final_drain(timeline, &mut errors).await;

        if errors.is_empty() {
            tracing::info!("delivery queue drained");
            Ok(())
        } else {
            tracing::error!(failures = errors.len(), "delivery queue drained with failures");
            Err(HaulerError::QueueDrain { errors })
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn final_drain<D: Drain>(
    joined: std::result::Result<D, tokio::task::JoinError>,
    errors: &mut Vec<HaulerError>,
) {
    match joined {
        Ok(mut drain) => {
            if let Err(err) = drain.cycle(true).await {
                errors.push(err);
            }
        }
        Err(err) => {
            tracing::error!(queue = D::NAME, error = %err, "drain loop panicked");
            errors.push(HaulerError::Other(anyhow::anyhow!(
                "{} drain loop panicked: {}",
                D::NAME,
                err
            )));
        }
    }
}
