use snip_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeleterError>;

/// Errors surfaced synchronously to callers of the deleter.
///
/// Failures of the batch flush itself never show up here; the worker only
/// logs them.
#[derive(Debug, Clone, Error)]
pub enum DeleterError {
    #[error("url deleter stopped")]
    Stopped,
    #[error("url deleter already started")]
    AlreadyStarted,
    #[error("failed to get user codes: {0}")]
    OwnershipLookup(#[source] StorageError),
}
