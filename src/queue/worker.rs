use super::lifecycle::{claim_next, complete, dead_letter, requeue, ClaimedMessage};
use super::message::{ProvisioningMessage, QueuedMessage};
use super::paths::QueuePaths;
use super::QueueError;
use crate::config::QueueSettings;
use crate::provisioning::{Outcome, Provisioner, WorkflowReport};
use crate::shared::ids::now_secs;
use crate::shared::pause::sleep_with_stop;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Where a delivered message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Completed { path: PathBuf },
    Requeued { path: PathBuf, not_before: i64 },
    DeadLettered { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    pub attempt: u32,
    pub disposition: Disposition,
}

/// Maps workflow outcomes onto the queue: success completes, unprocessable
/// is redelivered later, and bad payloads or exhausted messages are
/// dead-lettered.
#[derive(Debug, Clone)]
pub struct QueueWorker {
    paths: QueuePaths,
    provisioner: Provisioner,
    settings: QueueSettings,
}

impl QueueWorker {
    pub fn new(paths: QueuePaths, provisioner: Provisioner, settings: QueueSettings) -> Self {
        Self {
            paths,
            provisioner,
            settings,
        }
    }

    pub fn paths(&self) -> &QueuePaths {
        &self.paths
    }

    pub fn process_once(&self) -> Result<Option<Delivery>, QueueError> {
        self.process_once_at(now_secs())
    }

    /// Claims and handles at most one message that is due at `now`.
    pub fn process_once_at(&self, now: i64) -> Result<Option<Delivery>, QueueError> {
        let Some(claimed) = claim_next(&self.paths, now)? else {
            return Ok(None);
        };
        let message_id = claimed.name.message_id.clone();
        let attempt = claimed.name.attempt;

        let queued = match QueuedMessage::parse(&claimed.raw) {
            Ok(queued) => queued,
            Err(err) => {
                let reason = format!("invalid payload: {err}");
                tracing::warn!(message_id = %message_id, %reason, "delivery dead-lettered");
                let path = dead_letter(&self.paths, &claimed, &reason)?;
                return Ok(Some(Delivery {
                    message_id,
                    attempt,
                    disposition: Disposition::DeadLettered { path, reason },
                }));
            }
        };

        let span = tracing::info_span!(
            "delivery",
            message_id = %message_id,
            attempt,
            kind = queued.message.kind(),
            external_id = %queued.message.external_id()
        );
        let _entered = span.enter();

        let report = run_workflow(&self.provisioner, &queued.message);
        let disposition = self.settle(&claimed, &report, now)?;
        Ok(Some(Delivery {
            message_id,
            attempt,
            disposition,
        }))
    }

    fn settle(
        &self,
        claimed: &ClaimedMessage,
        report: &WorkflowReport,
        now: i64,
    ) -> Result<Disposition, QueueError> {
        let exhausted = claimed.name.attempt >= self.settings.max_deliveries;
        match &report.outcome {
            Outcome::Completed | Outcome::AlreadyHandled => {
                let path = complete(&self.paths, claimed, report, now)?;
                tracing::info!(status = %report.status, "delivery completed");
                Ok(Disposition::Completed { path })
            }
            Outcome::Unprocessable { reason } if exhausted => {
                let reason = format!(
                    "gave up after {} deliveries: {reason}",
                    claimed.name.attempt
                );
                tracing::error!(%reason, "delivery dead-lettered");
                let path = dead_letter(&self.paths, claimed, &reason)?;
                Ok(Disposition::DeadLettered { path, reason })
            }
            Outcome::Unprocessable { reason } => {
                let not_before = now + self.settings.redelivery_delay_secs as i64;
                tracing::warn!(%reason, not_before, "delivery requeued");
                let path = requeue(&self.paths, claimed, not_before)?;
                Ok(Disposition::Requeued { path, not_before })
            }
        }
    }

    /// Processes messages until `stop` is set, idling between empty polls.
    /// Queue errors are logged and retried after the poll interval.
    pub fn run(&self, stop: &AtomicBool) -> usize {
        let poll = Duration::from_millis(self.settings.poll_interval_millis);
        let mut processed = 0;
        tracing::info!(incoming = %self.paths.incoming.display(), "queue worker started");
        while !stop.load(Ordering::Relaxed) {
            match self.process_once() {
                Ok(Some(_)) => {
                    processed += 1;
                    continue;
                }
                Ok(None) => {}
                Err(err) => tracing::error!(error = %err, "queue poll failed"),
            }
            if !sleep_with_stop(stop, poll) {
                break;
            }
        }
        tracing::info!(processed, "queue worker stopped");
        processed
    }
}

pub fn run_workflow(provisioner: &Provisioner, message: &ProvisioningMessage) -> WorkflowReport {
    match message {
        ProvisioningMessage::Customer(request) => provisioner.handle_customer(request),
        ProvisioningMessage::Order(request) => provisioner.handle_order(request),
    }
}
