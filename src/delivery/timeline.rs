//! Timeline record delivery.
//!
//! Updates are held per timeline. Each cycle walks the timelines known to
//! exist remotely, in the order they became known: pending updates are
//! capped per timeline, prefixed with that timeline's retry buffer, folded
//! by record id, and sent in one call. Sub-timelines referenced through a
//! record's `details` are created before the send; a timeline created this
//! way is visited later in the same pass. A creation that fails is tried
//! again at the start of every later cycle, the final drain included.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use super::client::TelemetryClient;
use super::queue::{Drain, TimelineUpdate};
use super::record::{merge_records, TimelineRecord};
use crate::error::{HaulerError, Result};

pub(crate) struct TimelineDrain {
    updates: UnboundedReceiver<TimelineUpdate>,
    client: Arc<dyn TelemetryClient>,
    records_per_cycle: usize,
    pending: IndexMap<Uuid, VecDeque<TimelineRecord>>,
    retry: HashMap<Uuid, Vec<TimelineRecord>>,
    known: IndexSet<Uuid>,
    uncreated: IndexSet<Uuid>,
}

impl TimelineDrain {
    pub(crate) fn new(
        updates: UnboundedReceiver<TimelineUpdate>,
        client: Arc<dyn TelemetryClient>,
        job_timeline: Uuid,
        records_per_cycle: usize,
    ) -> Self {
        let mut known = IndexSet::new();
        known.insert(job_timeline);
        Self {
            updates,
            client,
            records_per_cycle: records_per_cycle.max(1),
            pending: IndexMap::new(),
            retry: HashMap::new(),
            known,
            uncreated: IndexSet::new(),
        }
    }

    fn collect_updates(&mut self) {
        while let Ok(update) = self.updates.try_recv() {
            self.pending
                .entry(update.timeline_id)
                .or_default()
                .push_back(update.record);
        }
    }

    fn take_batch(&mut self, timeline_id: Uuid, final_drain: bool) -> Vec<TimelineRecord> {
        let mut batch = self.retry.remove(&timeline_id).unwrap_or_default();
        if let Some(queue) = self.pending.get_mut(&timeline_id) {
            let count = if final_drain {
                queue.len()
            } else {
                queue.len().min(self.records_per_cycle)
            };
            batch.extend(queue.drain(..count));
        }
        batch
    }

    async fn create_detail_timelines(&mut self, records: &[TimelineRecord]) {
        for details in records.iter().filter_map(|r| r.details) {
            if !self.known.contains(&details.id) {
                self.create_timeline(details.id).await;
            }
        }
    }

    async fn retry_uncreated_timelines(&mut self) {
        let failed: Vec<Uuid> = self.uncreated.iter().copied().collect();
        for timeline_id in failed {
            self.create_timeline(timeline_id).await;
        }
    }

    async fn create_timeline(&mut self, timeline_id: Uuid) {
        match self.client.create_timeline(timeline_id).await {
            Ok(timeline) => {
                tracing::debug!(timeline = %timeline.id, "created detail timeline");
                self.uncreated.shift_remove(&timeline_id);
                self.known.insert(timeline_id);
            }
            Err(err) => {
                tracing::warn!(timeline = %timeline_id, error = %err, "failed to create detail timeline");
                self.uncreated.insert(timeline_id);
            }
        }
    }

    fn stranded(&self) -> Vec<(Uuid, usize)> {
        self.pending
            .iter()
            .filter(|(id, queue)| !queue.is_empty() && !self.known.contains(*id))
            .map(|(id, queue)| (*id, queue.len()))
            .collect()
    }
}

#[async_trait]
impl Drain for TimelineDrain {
    const NAME: &'static str = "timeline";

    async fn cycle(&mut self, final_drain: bool) -> Result<()> {
        self.collect_updates();
        self.retry_uncreated_timelines().await;

        let mut errors = Vec::new();
        let mut index = 0;
        while index < self.known.len() {
            let timeline_id = self.known[index];
            index += 1;

            let batch = self.take_batch(timeline_id, final_drain);
            if batch.is_empty() {
                continue;
            }

            let records = merge_records(batch);
            for record in &records {
                tracing::trace!(timeline = %timeline_id, record = %record.id, state = ?record.state, "merged record");
            }
            self.create_detail_timelines(&records).await;

            match self
                .client
                .update_timeline_records(timeline_id, &records)
                .await
            {
                Ok(_) => {
                    tracing::debug!(timeline = %timeline_id, records = records.len(), "updated timeline records");
                }
                Err(err) => {
                    tracing::warn!(
                        timeline = %timeline_id,
                        records = records.len(),
                        error = %err,
                        "timeline update failed; keeping records for retry"
                    );
                    self.retry.insert(timeline_id, records);
                    errors.push(err);
                }
            }
        }

        if final_drain {
            for (timeline_id, count) in self.stranded() {
                tracing::error!(timeline = %timeline_id, records = count, "records for unknown timeline were never sent");
                errors.push(HaulerError::telemetry(
                    "update_timeline_records",
                    format!("{} record(s) for unknown timeline {}", count, timeline_id),
                ));
            }
        }

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
