use crate::memory::InMemoryRepository;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use snip_core::error::Result;
use snip_core::{
    DeletionStore, NewUrl, ReadRepository, Repository, ShortCode, Stats, StorageError, UrlRecord,
    UserId, UserUrl,
};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One line of the storage file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Event {
    Created {
        code: ShortCode,
        original_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        created_at: Timestamp,
    },
    Deleted {
        codes: Vec<ShortCode>,
    },
}

impl Event {
    fn created(code: &ShortCode, original_url: &str, owner: Option<&UserId>, at: Timestamp) -> Self {
        Self::Created {
            code: code.clone(),
            original_url: original_url.to_owned(),
            user_id: owner.cloned(),
            created_at: at,
        }
    }
}

/// File-backed repository.
///
/// Every mutation is appended to a newline-delimited JSON log and synced
/// before the call returns. Reads are served from an in-memory index that
/// is rebuilt by replaying the log on [`FileRepository::open`]. Mutations are
/// serialised by the file lock, so the log order is the order of application.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    file: Mutex<File>,
    index: InMemoryRepository,
}

impl FileRepository {
    /// Opens the log at `path`, creating it if needed, and replays it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index = InMemoryRepository::new();

        let replayed = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => replay(&index, &contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!(path = %path.display(), events = replayed, "opened file storage");

        Ok(Self {
            path,
            file: Mutex::new(file),
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(file: &mut File, events: &[Event]) -> Result<()> {
        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            buf.push(b'\n');
        }

        let len = file.metadata().await?.len();
        let written = Self::write_synced(file, &buf).await;
        if written.is_err() {
            Self::truncate_to(file, len).await;
        }
        written
    }

    async fn write_synced(file: &mut File, buf: &[u8]) -> Result<()> {
        file.write_all(buf).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Cuts a failed append off the log so replay never sees a torn line or
    /// an event whose mutation was rolled back.
    async fn truncate_to(file: &mut File, len: u64) {
        let truncated = match file.set_len(len).await {
            Ok(()) => file.sync_data().await,
            Err(e) => Err(e),
        };
        if let Err(e) = truncated {
            warn!(error = %e, len, "could not truncate failed append");
        }
    }
}

fn replay(index: &InMemoryRepository, contents: &str) -> Result<usize> {
    let mut replayed = 0;

    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let event: Event = serde_json::from_str(line).map_err(|e| {
            StorageError::InvalidData(format!("line {}: {e}", number + 1))
        })?;

        match event {
            Event::Created {
                code,
                original_url,
                user_id,
                created_at,
            } => index
                .insert_entry(&code, &original_url, user_id.as_ref(), created_at)
                .map_err(|e| StorageError::InvalidData(format!("line {}: {e}", number + 1)))?,
            Event::Deleted { codes } => index.mark(&codes),
        }
        replayed += 1;
    }

    Ok(replayed)
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        self.index.get(code).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        self.index.exists(code).await
    }

    async fn code_by_url(&self, original_url: &str) -> Result<Option<ShortCode>> {
        self.index.code_by_url(original_url).await
    }
}

#[async_trait]
impl DeletionStore for FileRepository {
    async fn mark_deleted(&self, codes: &[ShortCode]) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock().await;
        Self::append(
            &mut file,
            &[Event::Deleted {
                codes: codes.to_vec(),
            }],
        )
        .await?;
        self.index.mark(codes);

        debug!(count = codes.len(), "appended deletion event");
        Ok(())
    }

    async fn codes_owned_by(&self, user: &UserId) -> Result<Vec<ShortCode>> {
        self.index.codes_owned_by(user).await
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn insert(
        &self,
        code: &ShortCode,
        original_url: &str,
        owner: Option<&UserId>,
    ) -> Result<()> {
        let mut file = self.file.lock().await;
        let now = Timestamp::now();

        self.index.insert_entry(code, original_url, owner, now)?;
        if let Err(e) =
            Self::append(&mut file, &[Event::created(code, original_url, owner, now)]).await
        {
            self.index.remove_entry(code);
            return Err(e);
        }
        Ok(())
    }

    async fn insert_batch(&self, owner: Option<&UserId>, urls: &[NewUrl]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock().await;
        let now = Timestamp::now();

        self.index.insert_entries(owner, urls, now)?;
        let events: Vec<Event> = urls
            .iter()
            .map(|url| Event::created(&url.code, &url.original_url, owner, now))
            .collect();
        if let Err(e) = Self::append(&mut file, &events).await {
            for url in urls {
                self.index.remove_entry(&url.code);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn urls_owned_by(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        self.index.urls_owned_by(user).await
    }

    async fn stats(&self) -> Result<Stats> {
        self.index.stats().await
    }
}
