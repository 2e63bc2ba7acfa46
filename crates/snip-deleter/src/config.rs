use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_STOPPING_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_WAITING_TIME: Duration = Duration::from_millis(100);

/// Tuning of the URL deleter.
///
/// Zero values are replaced with the defaults by [`DeleterConfig::normalized`],
/// which [`UrlDeleter::new`](crate::UrlDeleter::new) always applies.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct DeleterConfig {
    /// Upper bound on how long `stop` waits for in-flight `delete` calls.
    #[builder(default = DEFAULT_STOPPING_TIMEOUT)]
    pub stopping_timeout: Duration,
    /// A batch is flushed as soon as it holds this many codes.
    #[builder(default = DEFAULT_MAX_BATCH_SIZE)]
    pub max_batch_size: usize,
    /// A non-empty batch is flushed at least this often.
    #[builder(default = DEFAULT_BATCH_WAITING_TIME)]
    pub batch_waiting_time: Duration,
    /// Capacity of the channel between callers and the worker.
    /// Zero means "same as `max_batch_size`".
    #[builder(default)]
    pub queue_capacity: usize,
}

impl DeleterConfig {
    pub fn normalized(mut self) -> Self {
        if self.stopping_timeout.is_zero() {
            self.stopping_timeout = DEFAULT_STOPPING_TIMEOUT;
        }
        if self.max_batch_size == 0 {
            self.max_batch_size = DEFAULT_MAX_BATCH_SIZE;
        }
        if self.batch_waiting_time.is_zero() {
            self.batch_waiting_time = DEFAULT_BATCH_WAITING_TIME;
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = self.max_batch_size;
        }
        self
    }
}

impl Default for DeleterConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
