use crate::config::DeleterConfig;
use crate::error::{DeleterError, Result};
use crate::worker::DeleterWorker;
use async_trait::async_trait;
use parking_lot::Mutex;
use snip_core::{DeletionStore, ShortCode, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Accepts deletion requests on behalf of users.
///
/// Object-safe so request handlers can hold an `Arc<dyn Deleter>` without
/// knowing the storage backend.
#[async_trait]
pub trait Deleter: Send + Sync + 'static {
    /// Queues the codes owned by `user` for deletion.
    ///
    /// Returns once every owned code has been handed to the background worker,
    /// not once it is deleted. Codes the user does not own are skipped.
    async fn delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<()>;
}

/// Front end of the asynchronous URL deleter.
///
/// Shutdown is coordinated without sleeping: `stop` raises the closing flag so
/// new calls are rejected, then takes the write side of the sender slot, which
/// waits until every in-flight `delete` (holding the read side) has finished
/// its sends. Senders still blocked after `stopping_timeout` are aborted.
/// Every `stop` caller then waits on `done`, which the worker task releases
/// when it exits.
pub struct UrlDeleter<S> {
    config: DeleterConfig,
    storage: Arc<S>,
    sender: RwLock<Option<mpsc::Sender<ShortCode>>>,
    receiver: Mutex<Option<mpsc::Receiver<ShortCode>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closing: CancellationToken,
    aborted: CancellationToken,
    done: CancellationToken,
}

impl<S: DeletionStore> UrlDeleter<S> {
    /// Creates a deleter bound to `storage`. Zero config values fall back to
    /// the defaults.
    pub fn new(config: DeleterConfig, storage: S) -> Self {
        let config = config.normalized();
        let (sender, receiver) = mpsc::channel(config.queue_capacity);

        Self {
            config,
            storage: Arc::new(storage),
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
            closing: CancellationToken::new(),
            aborted: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DeleterConfig {
        &self.config
    }

    /// Spawns the background worker on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// * [`DeleterError::AlreadyStarted`] on a second call
    /// * [`DeleterError::Stopped`] if `stop` was already called
    pub fn start(&self) -> Result<()> {
        if self.closing.is_cancelled() {
            return Err(DeleterError::Stopped);
        }

        let Some(receiver) = self.receiver.lock().take() else {
            return Err(if self.closing.is_cancelled() {
                DeleterError::Stopped
            } else {
                DeleterError::AlreadyStarted
            });
        };

        let worker = DeleterWorker::new(Arc::clone(&self.storage), receiver, &self.config);
        let done = self.done.clone().drop_guard();
        *self.worker.lock() = Some(tokio::spawn(async move {
            let _done = done;
            worker.run().await;
        }));

        info!(
            max_batch_size = self.config.max_batch_size,
            queue_capacity = self.config.queue_capacity,
            "url deleter started"
        );
        Ok(())
    }

    /// Stops accepting deletions, closes the channel and waits for the worker
    /// to flush what is left. Concurrent and repeated calls all return only
    /// after that flush.
    pub async fn stop(&self) {
        self.closing.cancel();

        let mut sender = match tokio::time::timeout(
            self.config.stopping_timeout,
            self.sender.write(),
        )
        .await
        {
            Ok(guard) => guard,
            Err(_) => {
                warn!(
                    stopping_timeout = ?self.config.stopping_timeout,
                    "in-flight deletions did not finish in time, aborting them"
                );
                self.aborted.cancel();
                self.sender.write().await
            }
        };

        if sender.take().is_none() {
            trace!("url deleter already stopped");
        }
        drop(sender);

        // Never started: no worker will release `done`.
        if self.receiver.lock().take().is_some() {
            self.done.cancel();
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "url deleter worker terminated abnormally");
            }
        }
        self.done.cancelled().await;

        info!("url deleter stopped");
    }

    /// Queues the codes owned by `user` for deletion.
    ///
    /// See [`Deleter::delete`].
    pub async fn delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<()> {
        Deleter::delete(self, user, codes).await
    }

    async fn owned_codes(&self, user: &UserId) -> Result<HashSet<ShortCode>> {
        let owned = tokio::select! {
            biased;
            _ = self.aborted.cancelled() => return Err(DeleterError::Stopped),
            owned = self.storage.codes_owned_by(user) => owned,
        };

        owned
            .map(|codes| codes.into_iter().collect())
            .map_err(DeleterError::OwnershipLookup)
    }
}

#[async_trait]
impl<S: DeletionStore> Deleter for UrlDeleter<S> {
    async fn delete(&self, user: &UserId, codes: &[ShortCode]) -> Result<()> {
        if self.closing.is_cancelled() {
            return Err(DeleterError::Stopped);
        }

        let sender = self.sender.read().await;
        let Some(sender) = sender.as_ref() else {
            return Err(DeleterError::Stopped);
        };

        let owned = self.owned_codes(user).await?;

        for code in codes {
            if !owned.contains(code) {
                debug!(user = %user, code = %code, "skipping code not owned by user");
                continue;
            }

            tokio::select! {
                biased;
                _ = self.aborted.cancelled() => return Err(DeleterError::Stopped),
                sent = sender.send(code.clone()) => sent.map_err(|_| DeleterError::Stopped)?,
            }
            trace!(user = %user, code = %code, "code handed to deleter worker");
        }

        Ok(())
    }
}
