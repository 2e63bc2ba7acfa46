use crate::batch::BatchAccumulator;
use crate::config::DeleterConfig;
use snip_core::{DeletionStore, ShortCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// The single background task that applies deletions to storage.
///
/// The worker exclusively owns its [`BatchAccumulator`]; callers only reach it
/// through the channel, so no locking is involved. The loop ends once every
/// sender is dropped and the channel is drained.
pub struct DeleterWorker<S> {
    storage: Arc<S>,
    receiver: mpsc::Receiver<ShortCode>,
    batch: BatchAccumulator,
    batch_waiting_time: Duration,
}

impl<S: DeletionStore> DeleterWorker<S> {
    pub fn new(storage: Arc<S>, receiver: mpsc::Receiver<ShortCode>, config: &DeleterConfig) -> Self {
        Self {
            storage,
            receiver,
            batch: BatchAccumulator::new(config.max_batch_size),
            batch_waiting_time: config.batch_waiting_time,
        }
    }

    /// Runs the worker until the channel is closed.
    ///
    /// A batch is flushed when it reaches the maximum size, when the batch
    /// waiting time ticks with codes pending, and once more when the channel
    /// closes.
    pub async fn run(mut self) {
        info!(
            batch_waiting_time = ?self.batch_waiting_time,
            "url deleter worker started"
        );

        let mut ticker = tokio::time::interval(self.batch_waiting_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.batch.is_empty() {
                        continue;
                    }
                    debug!(batch_size = self.batch.len(), "batch waiting time elapsed");
                    self.flush().await;
                }
                received = self.receiver.recv() => match received {
                    Some(code) => {
                        trace!(code = %code, "code queued for deletion");
                        if self.batch.append(code) {
                            debug!(batch_size = self.batch.len(), "batch is full");
                            self.flush().await;
                        }
                    }
                    None => {
                        debug!(batch_size = self.batch.len(), "channel closed, flushing remaining codes");
                        self.flush().await;
                        break;
                    }
                },
            }
        }

        info!("url deleter worker stopped");
    }

    async fn flush(&mut self) {
        let codes = self.batch.drain();
        if codes.is_empty() {
            return;
        }

        match self.storage.mark_deleted(&codes).await {
            Ok(()) => debug!(batch_size = codes.len(), "batch marked as deleted"),
            // The batch is dropped; users can resubmit the deletion.
            Err(e) => error!(
                batch_size = codes.len(),
                error = %e,
                "failed to mark batch as deleted"
            ),
        }
    }
}
