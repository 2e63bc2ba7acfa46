use async_trait::async_trait;
use jiff::Timestamp;
use snip_core::error::Result;
use snip_core::{
    DeletionStore, NewUrl, ReadRepository, Repository, ShortCode, Stats, StorageError, UrlRecord,
    UserId, UserUrl,
};
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

/// MySQL implementation of the repository contract.
///
/// Soft delete is implemented with `deleted_at`. Deleted rows stay readable
/// so redirects can answer "gone", and neither their code nor their URL is
/// ever reused.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `short_urls` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("mysql schema is up to date");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Works out which unique key a rejected insert collided with.
    ///
    /// A URL that is already shortened wins over a code collision, so callers
    /// can hand the existing short code back to the user.
    async fn resolve_conflict(&self, attempted: &[(&ShortCode, &str)]) -> StorageError {
        let mut colliding_code = None;

        for &(code, url) in attempted {
            match self.code_by_url(url).await {
                Ok(Some(existing)) => return StorageError::UrlConflict(existing.to_string()),
                Ok(None) => {}
                Err(e) => return e,
            }
            if colliding_code.is_none() {
                colliding_code = Some(code.to_string());
            }
        }

        StorageError::Conflict(colliding_code.unwrap_or_default())
    }
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn parse_timestamp(column: &str, seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{seconds}': {e}"))
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT original_url, user_id, created_at, deleted_at
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
        let owner: Option<String> = row.try_get("user_id").map_err(map_sqlx_error)?;
        let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
        let deleted_at: Option<i64> = row.try_get("deleted_at").map_err(map_sqlx_error)?;

        Ok(Some(UrlRecord {
            original_url,
            owner: owner.map(UserId::new_unchecked),
            created_at: parse_timestamp("created_at", created_at)?,
            deleted: deleted_at.is_some(),
        }))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn code_by_url(&self, original_url: &str) -> Result<Option<ShortCode>> {
        let code: Option<String> = sqlx::query_scalar(
            r#"
            SELECT short_code
            FROM short_urls
            WHERE original_url = ?
            LIMIT 1
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(code.map(ShortCode::new_unchecked))
    }
}

#[async_trait]
impl DeletionStore for MySqlRepository {
    async fn mark_deleted(&self, codes: &[ShortCode]) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<MySql> =
            QueryBuilder::new("UPDATE short_urls SET deleted_at = ");
        builder.push_bind(now_unix_seconds());
        builder.push(" WHERE deleted_at IS NULL AND short_code IN (");
        let mut separated = builder.separated(", ");
        for code in codes {
            separated.push_bind(code.as_str());
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(
            requested = codes.len(),
            affected = result.rows_affected(),
            "soft-deleted short urls"
        );
        Ok(())
    }

    async fn codes_owned_by(&self, user: &UserId) -> Result<Vec<ShortCode>> {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT short_code
            FROM short_urls
            WHERE user_id = ?
            ORDER BY created_at, short_code
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(codes.into_iter().map(ShortCode::new_unchecked).collect())
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn insert(
        &self,
        code: &ShortCode,
        original_url: &str,
        owner: Option<&UserId>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (short_code, original_url, user_id, created_at, deleted_at)
            VALUES (?, ?, ?, ?, NULL)
            "#,
        )
        .bind(code.as_str())
        .bind(original_url)
        .bind(owner.map(UserId::as_str))
        .bind(now_unix_seconds())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(self.resolve_conflict(&[(code, original_url)]).await)
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn insert_batch(&self, owner: Option<&UserId>, urls: &[NewUrl]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let now = now_unix_seconds();
        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
            "INSERT INTO short_urls (short_code, original_url, user_id, created_at) ",
        );
        builder.push_values(urls, |mut row, url| {
            row.push_bind(url.code.as_str())
                .push_bind(url.original_url.as_str())
                .push_bind(owner.map(UserId::as_str))
                .push_bind(now);
        });

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        match builder.build().execute(&mut *tx).await {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await.map_err(map_sqlx_error)?;
                let attempted: Vec<(&ShortCode, &str)> = urls
                    .iter()
                    .map(|url| (&url.code, url.original_url.as_str()))
                    .collect();
                return Err(self.resolve_conflict(&attempted).await);
            }
            Err(err) => return Err(map_sqlx_error(err)),
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn urls_owned_by(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        let rows = sqlx::query(
            r#"
            SELECT short_code, original_url
            FROM short_urls
            WHERE user_id = ?
              AND deleted_at IS NULL
            ORDER BY created_at, short_code
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
                let original_url: String =
                    row.try_get("original_url").map_err(map_sqlx_error)?;
                Ok(UserUrl {
                    code: ShortCode::new_unchecked(code),
                    original_url,
                })
            })
            .collect()
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM short_urls WHERE deleted_at IS NULL) AS urls,
                (SELECT COUNT(DISTINCT user_id) FROM short_urls WHERE user_id IS NOT NULL) AS users
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let urls: i64 = row.try_get("urls").map_err(map_sqlx_error)?;
        let users: i64 = row.try_get("users").map_err(map_sqlx_error)?;

        Ok(Stats {
            urls: urls.max(0) as u64,
            users: users.max(0) as u64,
        })
    }
}
