//! Asynchronous, batched deletion of short URLs.
//!
//! Request handlers call [`UrlDeleter::delete`] with the codes a user asked to
//! remove. Codes the user does not own are skipped; owned codes are handed to a
//! single background [`DeleterWorker`] over a bounded channel. The worker
//! coalesces them into batches and flushes a batch to storage when it is full,
//! when the batch waiting time elapses, or when the deleter is stopped.
//!
//! Deletion is fire-and-forget: storage failures inside the worker are logged
//! and never reach the caller.
//!
//! ```rust,no_run
//! use snip_core::{ShortCode, UserId};
//! use snip_deleter::{DeleterConfig, UrlDeleter};
//! use snip_storage::InMemoryRepository;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let deleter = UrlDeleter::new(DeleterConfig::default(), InMemoryRepository::new());
//! deleter.start()?;
//!
//! let user = UserId::new("user-1")?;
//! deleter.delete(&user, &[ShortCode::new("abc123")?]).await?;
//!
//! deleter.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod deleter;
pub mod error;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::BatchAccumulator;
pub use config::DeleterConfig;
pub use deleter::{Deleter, UrlDeleter};
pub use error::{DeleterError, Result};
pub use worker::DeleterWorker;
