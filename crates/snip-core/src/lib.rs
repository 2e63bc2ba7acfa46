//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the domain types shared by the shortener service,
//! the asynchronous URL deleter, the storage backends and the HTTP gateway.

pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;
pub mod user;

pub use error::{CoreError, ShortenerError, StorageError};
pub use repository::{
    DeletionStore, NewUrl, ReadRepository, Repository, Stats, UrlRecord, UserUrl,
};
pub use shortcode::ShortCode;
pub use shortener::{BatchRequest, BatchResponse, Resolution, Shortened, Shortener};
pub use user::UserId;
