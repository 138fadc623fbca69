//! SQLite database operations
//!
//! All cache persistence goes through this module. Every method is a
//! single statement against the pool; callers compose multi-step
//! sequences without a surrounding transaction.

use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Translate write failures, surfacing uniqueness violations as conflicts
fn map_write_error(error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            return AppError::Conflict(db_error.message().to_string());
        }
    }
    AppError::Database(error)
}

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get(&self, id: i64) -> Result<Option<CachedData>, AppError> {
        let data = sqlx::query_as::<_, CachedData>("SELECT * FROM cached_data WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(data)
    }

    pub async fn get_by_discord_id(&self, discord_id: &str) -> Result<Option<CachedData>, AppError> {
        let data =
            sqlx::query_as::<_, CachedData>("SELECT * FROM cached_data WHERE discord_id = ?")
                .bind(discord_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(data)
    }

    /// Look up by uuid, ignoring dashes in the input
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<CachedData>, AppError> {
        let data = sqlx::query_as::<_, CachedData>("SELECT * FROM cached_data WHERE uuid = ?")
            .bind(normalize_uuid(uuid))
            .fetch_optional(&self.pool)
            .await?;

        Ok(data)
    }

    /// Case-insensitive lookup by account name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<CachedData>, AppError> {
        let data = sqlx::query_as::<_, CachedData>(
            "SELECT * FROM cached_data WHERE name = ? COLLATE NOCASE ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(data)
    }

    /// Page through all cached rows ordered by id
    pub async fn get_page(&self, request: PageRequest) -> Result<Page<CachedData>, AppError> {
        let content = sqlx::query_as::<_, CachedData>(
            "SELECT * FROM cached_data ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(i64::from(request.limit()))
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = self.count().await?;
        Ok(Page::new(content, request, total))
    }

    /// Page through the rows of one guild ordered by id
    pub async fn get_page_by_guild_id(
        &self,
        guild_id: &str,
        request: PageRequest,
    ) -> Result<Page<CachedData>, AppError> {
        let content = sqlx::query_as::<_, CachedData>(
            "SELECT * FROM cached_data WHERE guild_id = ? ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(guild_id)
        .bind(i64::from(request.limit()))
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cached_data WHERE guild_id = ?")
                .bind(guild_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(Page::new(content, request, total.max(0) as u64))
    }

    pub async fn count(&self) -> Result<u64, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_data")
            .fetch_one(&self.pool)
            .await?;

        Ok(total.max(0) as u64)
    }

    // =========================================================================
    // Existence checks
    // =========================================================================

    pub async fn exists_by_id(&self, id: i64) -> Result<bool, AppError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cached_data WHERE id = ?)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists != 0)
    }

    /// Dashes in `uuid` are ignored, as for every uuid-keyed operation
    pub async fn exists_by_uuid(&self, uuid: &str) -> Result<bool, AppError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cached_data WHERE uuid = ?)")
                .bind(normalize_uuid(uuid))
                .fetch_one(&self.pool)
                .await?;

        Ok(exists != 0)
    }

    pub async fn exists_by_discord_id(&self, discord_id: &str) -> Result<bool, AppError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cached_data WHERE discord_id = ?)")
                .bind(discord_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists != 0)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Delete by primary id, returning the number of rows removed
    pub async fn delete_by_id(&self, id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM cached_data WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_by_uuid(&self, uuid: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM cached_data WHERE uuid = ?")
            .bind(normalize_uuid(uuid))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_by_discord_id(&self, discord_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM cached_data WHERE discord_id = ?")
            .bind(discord_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete rows sharing `uuid` or `discord_id` with a different primary id
    pub async fn delete_conflicting(
        &self,
        id: i64,
        uuid: &str,
        discord_id: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM cached_data WHERE id != ? AND (uuid = ? OR discord_id = ?)",
        )
        .bind(id)
        .bind(normalize_uuid(uuid))
        .bind(discord_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Insert or update by primary id
    ///
    /// # Errors
    /// Returns `AppError::Conflict` when `uuid` or `discord_id` is already
    /// held by another row
    pub async fn upsert(&self, data: &CachedData) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO cached_data (
                id, uuid, discord_id, name, tag, avatar, guild_id, created_at, cached_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                uuid = excluded.uuid,
                discord_id = excluded.discord_id,
                name = excluded.name,
                tag = excluded.tag,
                avatar = excluded.avatar,
                guild_id = excluded.guild_id,
                created_at = excluded.created_at,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(data.id)
        .bind(normalize_uuid(&data.uuid))
        .bind(&data.discord_id)
        .bind(&data.name)
        .bind(&data.tag)
        .bind(&data.avatar)
        .bind(&data.guild_id)
        .bind(data.created_at)
        .bind(data.cached_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }
}
