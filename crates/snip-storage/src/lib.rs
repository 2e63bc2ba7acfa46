//! Storage backends for the snip URL shortener.
//!
//! Three interchangeable implementations of [`Repository`]:
//!
//! - [`InMemoryRepository`]: concurrent maps, lost on restart.
//! - [`FileRepository`]: append-only JSON-lines event log replayed on open.
//! - [`MySqlRepository`]: relational storage with soft deletes.

pub mod file;
pub mod memory;
pub mod mysql;

pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use snip_core::{
    DeletionStore, NewUrl, ReadRepository, Repository, Stats, StorageError, UrlRecord, UserUrl,
};
