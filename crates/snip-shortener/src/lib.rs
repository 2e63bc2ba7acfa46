//! URL shortener service implementation.
//!
//! Wraps a [`Repository`](snip_core::Repository) and a
//! [`Generator`](snip_generator::Generator) behind the [`Shortener`] trait.
//! Core types are re-exported from `snip_core`.

pub mod service;

pub use service::{ShortenerService, MAX_GENERATION_ATTEMPTS};
pub use snip_core::{
    BatchRequest, BatchResponse, Resolution, Shortened, Shortener, ShortenerError,
};
