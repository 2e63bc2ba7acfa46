use crate::repository::{Stats, UserUrl};
use crate::shortcode::ShortCode;
use crate::user::UserId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Outcome of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortened {
    pub code: ShortCode,
    /// `false` when the URL was already shortened and `code` is the existing one.
    pub created: bool,
}

/// One element of a batch shortening request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub correlation_id: String,
    pub original_url: String,
}

/// One element of a batch shortening response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub correlation_id: String,
    pub code: ShortCode,
}

/// What a short code currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(String),
    Deleted,
    Missing,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `user`.
    async fn shorten(&self, user: &UserId, original_url: &str) -> Result<Shortened>;

    /// Shortens several URLs at once, preserving the request order.
    async fn shorten_batch(
        &self,
        user: &UserId,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<BatchResponse>>;

    /// Resolves a short code to its original URL.
    async fn resolve(&self, code: &ShortCode) -> Result<Resolution>;

    /// Lists the URLs shortened by `user`.
    async fn user_urls(&self, user: &UserId) -> Result<Vec<UserUrl>>;

    /// Returns service-wide counters.
    async fn stats(&self) -> Result<Stats>;
}
