//! Console line delivery.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

use super::client::TelemetryClient;
use super::queue::{Drain, JobTarget};
use crate::error::{HaulerError, Result};

/// Groups pending console lines into batches for the job's live feed.
///
/// Failed batches are not requeued.
pub(crate) struct ConsoleDrain {
    lines: UnboundedReceiver<String>,
    client: Arc<dyn TelemetryClient>,
    target: JobTarget,
    batch_size: usize,
    batches_per_cycle: usize,
}

impl ConsoleDrain {
    pub(crate) fn new(
        lines: UnboundedReceiver<String>,
        client: Arc<dyn TelemetryClient>,
        target: JobTarget,
        batch_size: usize,
        batches_per_cycle: usize,
    ) -> Self {
        Self {
            lines,
            client,
            target,
            batch_size: batch_size.max(1),
            batches_per_cycle: batches_per_cycle.max(1),
        }
    }

    fn take_batches(&mut self, final_drain: bool) -> Vec<Vec<String>> {
        let mut batches = Vec::new();
        let mut current = Vec::new();

        while let Ok(line) = self.lines.try_recv() {
            current.push(line);
            if current.len() >= self.batch_size {
                batches.push(std::mem::take(&mut current));
                if !final_drain && batches.len() >= self.batches_per_cycle {
                    break;
                }
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }

        batches
    }
}

#[async_trait]
impl Drain for ConsoleDrain {
    const NAME: &'static str = "console";

    async fn cycle(&mut self, final_drain: bool) -> Result<()> {
        let batches = self.take_batches(final_drain);
        if batches.is_empty() {
            return Ok(());
        }

        let mut errors = Vec::new();
        for batch in &batches {
            if let Err(err) = self
                .client
                .append_console_lines(self.target.timeline_id, self.target.record_id, batch)
                .await
            {
                tracing::debug!(lines = batch.len(), error = %err, "console batch dropped");
                errors.push(err);
            }
        }

        tracing::info!(
            "appended {}/{} console batches",
            batches.len() - errors.len(),
            batches.len()
        );

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
