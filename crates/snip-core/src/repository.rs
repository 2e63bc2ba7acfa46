use crate::error::Result;
use crate::shortcode::ShortCode;
use crate::user::UserId;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The original URL that was shortened.
    pub original_url: String,
    /// The user who created the short URL, if known.
    pub owner: Option<UserId>,
    /// When the record was created.
    pub created_at: Timestamp,
    /// Whether the record has been soft-deleted.
    pub deleted: bool,
}

/// One element of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrl {
    pub code: ShortCode,
    pub original_url: String,
}

/// A short URL as listed for its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub code: ShortCode,
    pub original_url: String,
}

/// Service-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of stored, non-deleted short URLs.
    pub urls: u64,
    /// Number of distinct users owning at least one short URL.
    pub users: u64,
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the URL record for a given short code.
    ///
    /// Soft-deleted records are returned with `deleted == true`.
    /// Returns `None` if the code was never stored.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Checks whether a short code was ever stored, including soft-deleted ones.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;

    /// Looks up the short code already assigned to `original_url`.
    async fn code_by_url(&self, original_url: &str) -> Result<Option<ShortCode>>;
}

/// The storage capability needed by the URL deleter.
#[async_trait]
pub trait DeletionStore: Send + Sync + 'static {
    /// Marks every given code as deleted.
    ///
    /// Unknown and already-deleted codes are ignored; an empty slice is a no-op.
    async fn mark_deleted(&self, codes: &[ShortCode]) -> Result<()>;

    /// Returns every code created by `user`. Empty if the user owns nothing.
    async fn codes_owned_by(&self, user: &UserId) -> Result<Vec<ShortCode>>;
}

#[async_trait]
pub trait Repository: ReadRepository + DeletionStore {
    /// Inserts a new URL record.
    ///
    /// Returns `Err(Conflict)` if the code already exists and
    /// `Err(UrlConflict(existing))` if the URL is already shortened.
    async fn insert(
        &self,
        code: &ShortCode,
        original_url: &str,
        owner: Option<&UserId>,
    ) -> Result<()>;

    /// Inserts several URLs for the same owner, all or nothing.
    async fn insert_batch(&self, owner: Option<&UserId>, urls: &[NewUrl]) -> Result<()>;

    /// Lists the non-deleted URLs created by `user`, oldest first.
    async fn urls_owned_by(&self, user: &UserId) -> Result<Vec<UserUrl>>;

    /// Returns service-wide counters.
    async fn stats(&self) -> Result<Stats>;
}

#[async_trait]
impl<T: DeletionStore + ?Sized> DeletionStore for Arc<T> {
    async fn mark_deleted(&self, codes: &[ShortCode]) -> Result<()> {
        (**self).mark_deleted(codes).await
    }

    async fn codes_owned_by(&self, user: &UserId) -> Result<Vec<ShortCode>> {
        (**self).codes_owned_by(user).await
    }
}

#[async_trait]
impl<T: ReadRepository + ?Sized> ReadRepository for Arc<T> {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        (**self).get(code).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        (**self).exists(code).await
    }

    async fn code_by_url(&self, original_url: &str) -> Result<Option<ShortCode>> {
        (**self).code_by_url(original_url).await
    }
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn insert(
        &self,
        code: &ShortCode,
        original_url: &str,
        owner: Option<&UserId>,
    ) -> Result<()> {
        (**self).insert(code, original_url, owner).await
    }

    async fn insert_batch(&self, owner: Option<&UserId>, urls: &[NewUrl]) -> Result<()> {
        (**self).insert_batch(owner, urls).await
    }

    async fn urls_owned_by(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        (**self).urls_owned_by(user).await
    }

    async fn stats(&self) -> Result<Stats> {
        (**self).stats().await
    }
}
