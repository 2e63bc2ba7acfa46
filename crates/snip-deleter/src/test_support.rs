use async_trait::async_trait;
use parking_lot::Mutex;
use snip_core::{DeletionStore, ShortCode, StorageError, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) fn code(s: &str) -> ShortCode {
    ShortCode::new_unchecked(s)
}

pub(crate) fn codes(values: &[&str]) -> Vec<ShortCode> {
    values.iter().map(|s| code(s)).collect()
}

pub(crate) fn user(s: &str) -> UserId {
    UserId::new_unchecked(s)
}

/// A `DeletionStore` that records every `mark_deleted` call.
#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    owned: Mutex<HashMap<UserId, Vec<ShortCode>>>,
    calls: Mutex<Vec<Vec<ShortCode>>>,
    lookups: AtomicUsize,
    failing_marks: AtomicUsize,
    failing_lookups: AtomicBool,
    mark_delay: Mutex<Option<Duration>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn own(&self, owner: &str, values: &[&str]) {
        self.owned
            .lock()
            .entry(user(owner))
            .or_default()
            .extend(codes(values));
    }

    /// Every `mark_deleted` call, including failed ones.
    pub(crate) fn calls(&self) -> Vec<Vec<ShortCode>> {
        self.calls.lock().clone()
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Makes the next `n` calls to `mark_deleted` fail.
    pub(crate) fn fail_next_marks(&self, n: usize) {
        self.failing_marks.store(n, Ordering::SeqCst);
    }

    /// Makes every `mark_deleted` call take `delay` before it is recorded.
    pub(crate) fn slow_marks(&self, delay: Duration) {
        *self.mark_delay.lock() = Some(delay);
    }

    pub(crate) fn fail_lookups(&self) {
        self.failing_lookups.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeletionStore for RecordingStore {
    async fn mark_deleted(&self, codes: &[ShortCode]) -> snip_core::error::Result<()> {
        let delay = *self.mark_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(codes.to_vec());

        let should_fail = self
            .failing_marks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StorageError::Unavailable("storage is down".to_string()));
        }
        Ok(())
    }

    async fn codes_owned_by(&self, user: &UserId) -> snip_core::error::Result<Vec<ShortCode>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.failing_lookups.load(Ordering::SeqCst) {
            return Err(StorageError::Timeout("lookup timed out".to_string()));
        }
        Ok(self.owned.lock().get(user).cloned().unwrap_or_default())
    }
}
