//! Delta token repository trait and implementation

use crate::error::Result;
use crate::models::{now_rfc3339, DeltaToken};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Delta token repository interface.
///
/// One opaque cursor per drive. The cursor is treated as a black box; it
/// is only ever stored, replayed, or discarded.
#[async_trait]
pub trait DeltaTokenRepository: Send + Sync {
    /// Fetch the stored cursor for a drive
    async fn get(&self, drive_id: &str) -> Result<Option<DeltaToken>>;

    /// Insert or replace the cursor for a drive
    async fn upsert(&self, drive_id: &str, delta_link: &str) -> Result<()>;

    /// Discard the cursor for one drive
    ///
    /// # Returns
    /// `Ok(true)` if a cursor existed
    async fn delete(&self, drive_id: &str) -> Result<bool>;

    /// Discard all cursors, forcing full enumeration on the next run.
    /// Returns the number of cursors removed.
    async fn delete_all(&self) -> Result<u64>;
}

/// SQLite implementation of DeltaTokenRepository
pub struct SqliteDeltaTokenRepository {
    pool: SqlitePool,
}

impl SqliteDeltaTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeltaTokenRepository for SqliteDeltaTokenRepository {
    async fn get(&self, drive_id: &str) -> Result<Option<DeltaToken>> {
        let token = query_as::<_, DeltaToken>("SELECT * FROM delta_tokens WHERE drive_id = ?")
            .bind(drive_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(token)
    }

    async fn upsert(&self, drive_id: &str, delta_link: &str) -> Result<()> {
        query(
            r#"
            INSERT INTO delta_tokens (drive_id, delta_link, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(drive_id) DO UPDATE SET
                delta_link = excluded.delta_link,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(drive_id)
        .bind(delta_link)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, drive_id: &str) -> Result<bool> {
        let result = query("DELETE FROM delta_tokens WHERE drive_id = ?")
            .bind(drive_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = query("DELETE FROM delta_tokens").execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_get_missing_token() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDeltaTokenRepository::new(pool);

        assert!(repo.get("drive-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDeltaTokenRepository::new(pool);

        repo.upsert("drive-1", "https://graph/delta?token=aaa")
            .await
            .unwrap();
        repo.upsert("drive-1", "https://graph/delta?token=bbb")
            .await
            .unwrap();

        let token = repo.get("drive-1").await.unwrap().unwrap();
        assert_eq!(token.delta_link, "https://graph/delta?token=bbb");
    }

    #[tokio::test]
    async fn test_tokens_independent_per_drive() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDeltaTokenRepository::new(pool);

        repo.upsert("drive-1", "link-1").await.unwrap();
        repo.upsert("drive-2", "link-2").await.unwrap();

        assert_eq!(repo.get("drive-1").await.unwrap().unwrap().delta_link, "link-1");
        assert_eq!(repo.get("drive-2").await.unwrap().unwrap().delta_link, "link-2");
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDeltaTokenRepository::new(pool);

        repo.upsert("drive-1", "link-1").await.unwrap();
        repo.upsert("drive-2", "link-2").await.unwrap();

        assert!(repo.delete("drive-1").await.unwrap());
        assert!(!repo.delete("drive-1").await.unwrap());

        assert_eq!(repo.delete_all().await.unwrap(), 1);
        assert!(repo.get("drive-2").await.unwrap().is_none());
    }
}
