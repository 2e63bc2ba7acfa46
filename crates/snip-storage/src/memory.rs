use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use snip_core::error::Result;
use snip_core::{
    DeletionStore, NewUrl, ReadRepository, Repository, ShortCode, Stats, StorageError, UrlRecord,
    UserId, UserUrl,
};
use tracing::trace;

/// In-memory storage entry for a URL mapping.
#[derive(Debug, Clone)]
struct StoredUrl {
    original_url: String,
    owner: Option<UserId>,
    created_at: Timestamp,
    deleted: bool,
}

impl StoredUrl {
    fn to_record(&self) -> UrlRecord {
        UrlRecord {
            original_url: self.original_url.clone(),
            owner: self.owner.clone(),
            created_at: self.created_at,
            deleted: self.deleted,
        }
    }
}

/// In-memory implementation of the Repository trait using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking.
///
/// Lock order is always URL index first, then codes; the two are never held
/// in the opposite order.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    codes: DashMap<String, StoredUrl>,
    by_url: DashMap<String, ShortCode>,
    owners: DashMap<UserId, Vec<ShortCode>>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            codes: DashMap::with_capacity(capacity),
            by_url: DashMap::with_capacity(capacity),
            owners: DashMap::new(),
        }
    }

    pub(crate) fn insert_entry(
        &self,
        code: &ShortCode,
        original_url: &str,
        owner: Option<&UserId>,
        created_at: Timestamp,
    ) -> Result<()> {
        let url_slot = match self.by_url.entry(original_url.to_owned()) {
            Entry::Occupied(existing) => {
                return Err(StorageError::UrlConflict(existing.get().to_string()))
            }
            Entry::Vacant(slot) => slot,
        };

        match self.codes.entry(code.as_str().to_owned()) {
            Entry::Occupied(_) => return Err(StorageError::Conflict(code.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(StoredUrl {
                    original_url: original_url.to_owned(),
                    owner: owner.cloned(),
                    created_at,
                    deleted: false,
                });
            }
        }
        url_slot.insert(code.clone());

        if let Some(owner) = owner {
            self.owners
                .entry(owner.clone())
                .or_default()
                .push(code.clone());
        }

        Ok(())
    }

    /// Inserts every URL or none of them.
    pub(crate) fn insert_entries(
        &self,
        owner: Option<&UserId>,
        urls: &[NewUrl],
        created_at: Timestamp,
    ) -> Result<()> {
        for (inserted, url) in urls.iter().enumerate() {
            if let Err(e) = self.insert_entry(&url.code, &url.original_url, owner, created_at) {
                for rollback in &urls[..inserted] {
                    self.remove_entry(&rollback.code);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    pub(crate) fn remove_entry(&self, code: &ShortCode) {
        let Some((_, stored)) = self.codes.remove(code.as_str()) else {
            return;
        };
        self.by_url.remove(&stored.original_url);

        if let Some(owner) = stored.owner {
            if let Some(mut owned) = self.owners.get_mut(&owner) {
                owned.retain(|c| c != code);
            }
            self.owners.remove_if(&owner, |_, owned| owned.is_empty());
        }
    }

    pub(crate) fn mark(&self, codes: &[ShortCode]) {
        for code in codes {
            match self.codes.get_mut(code.as_str()) {
                Some(mut stored) => stored.deleted = true,
                None => trace!(code = %code, "ignoring deletion of unknown code"),
            }
        }
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.codes.get(code.as_str()).map(|stored| stored.to_record()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.codes.contains_key(code.as_str()))
    }

    async fn code_by_url(&self, original_url: &str) -> Result<Option<ShortCode>> {
        Ok(self.by_url.get(original_url).map(|code| code.value().clone()))
    }
}

#[async_trait]
impl DeletionStore for InMemoryRepository {
    async fn mark_deleted(&self, codes: &[ShortCode]) -> Result<()> {
        self.mark(codes);
        Ok(())
    }

    async fn codes_owned_by(&self, user: &UserId) -> Result<Vec<ShortCode>> {
        Ok(self
            .owners
            .get(user)
            .map(|owned| owned.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(
        &self,
        code: &ShortCode,
        original_url: &str,
        owner: Option<&UserId>,
    ) -> Result<()> {
        self.insert_entry(code, original_url, owner, Timestamp::now())
    }

    async fn insert_batch(&self, owner: Option<&UserId>, urls: &[NewUrl]) -> Result<()> {
        self.insert_entries(owner, urls, Timestamp::now())
    }

    async fn urls_owned_by(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        let owned = self.codes_owned_by(user).await?;

        Ok(owned
            .into_iter()
            .filter_map(|code| {
                let stored = self.codes.get(code.as_str())?;
                if stored.deleted {
                    return None;
                }
                let original_url = stored.original_url.clone();
                Some(UserUrl { code, original_url })
            })
            .collect())
    }

    async fn stats(&self) -> Result<Stats> {
        let urls = self.codes.iter().filter(|entry| !entry.deleted).count();

        Ok(Stats {
            urls: urls as u64,
            users: self.owners.len() as u64,
        })
    }
}
