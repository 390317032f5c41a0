//! Document repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{now_rfc3339, Document, NewDocument};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Document repository interface for data access operations
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Find a document by its ledger id
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>>;

    /// Find a document by its remote identity. Soft-deleted rows are
    /// included: a re-appearing item must resolve to its original row.
    async fn find_by_natural_key(
        &self,
        sharepoint_item_id: &str,
        sharepoint_drive_id: &str,
    ) -> Result<Option<Document>>;

    /// Insert a new document and return the stored row
    async fn insert(&self, doc: &NewDocument) -> Result<Document>;

    /// Update an existing document in place
    ///
    /// # Errors
    /// Returns `NotFound` if no row with the document's id exists
    async fn update(&self, doc: &Document) -> Result<()>;

    /// Mark a document deleted, keeping the row
    ///
    /// # Returns
    /// - `Ok(true)` if the row was live and is now deleted
    /// - `Ok(false)` if the row was already deleted or does not exist
    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// Count documents that are not soft-deleted
    async fn count_active(&self) -> Result<i64>;

    /// Total size in bytes across non-deleted documents
    async fn total_active_size(&self) -> Result<i64>;
}

/// SQLite implementation of DocumentRepository
pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>> {
        let doc = query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(doc)
    }

    async fn find_by_natural_key(
        &self,
        sharepoint_item_id: &str,
        sharepoint_drive_id: &str,
    ) -> Result<Option<Document>> {
        let doc = query_as::<_, Document>(
            "SELECT * FROM documents WHERE sharepoint_item_id = ? AND sharepoint_drive_id = ?",
        )
        .bind(sharepoint_item_id)
        .bind(sharepoint_drive_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(doc)
    }

    async fn insert(&self, doc: &NewDocument) -> Result<Document> {
        let now = now_rfc3339();

        let result = query(
            r#"
            INSERT INTO documents (
                sharepoint_item_id, sharepoint_drive_id, name, path, mime_type,
                file_size, web_url, created_by, last_modified_by,
                sharepoint_created_at, sharepoint_modified_at, quickxor_hash,
                file_blob_id, is_deleted, synced_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&doc.sharepoint_item_id)
        .bind(&doc.sharepoint_drive_id)
        .bind(&doc.name)
        .bind(&doc.path)
        .bind(&doc.mime_type)
        .bind(doc.file_size)
        .bind(&doc.web_url)
        .bind(&doc.created_by)
        .bind(&doc.last_modified_by)
        .bind(&doc.sharepoint_created_at)
        .bind(&doc.sharepoint_modified_at)
        .bind(&doc.quickxor_hash)
        .bind(doc.file_blob_id)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();

        self.find_by_id(id).await?.ok_or(LibraryError::NotFound {
            entity_type: "Document".to_string(),
            id: id.to_string(),
        })
    }

    async fn update(&self, doc: &Document) -> Result<()> {
        let result = query(
            r#"
            UPDATE documents
            SET name = ?, path = ?, mime_type = ?, file_size = ?, web_url = ?,
                created_by = ?, last_modified_by = ?, sharepoint_created_at = ?,
                sharepoint_modified_at = ?, quickxor_hash = ?, file_blob_id = ?,
                is_deleted = ?, synced_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&doc.name)
        .bind(&doc.path)
        .bind(&doc.mime_type)
        .bind(doc.file_size)
        .bind(&doc.web_url)
        .bind(&doc.created_by)
        .bind(&doc.last_modified_by)
        .bind(&doc.sharepoint_created_at)
        .bind(&doc.sharepoint_modified_at)
        .bind(&doc.quickxor_hash)
        .bind(doc.file_blob_id)
        .bind(doc.is_deleted)
        .bind(&doc.synced_at)
        .bind(now_rfc3339())
        .bind(doc.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Document".to_string(),
                id: doc.id.to_string(),
            });
        }

        Ok(())
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let now = now_rfc3339();

        let result = query(
            "UPDATE documents SET is_deleted = 1, synced_at = ?, updated_at = ? \
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_active(&self) -> Result<i64> {
        let row: (i64,) = query_as("SELECT COUNT(*) FROM documents WHERE is_deleted = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    async fn total_active_size(&self) -> Result<i64> {
        let row: (i64,) = query_as(
            "SELECT COALESCE(SUM(file_size), 0) FROM documents WHERE is_deleted = 0",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn sample_doc(item_id: &str) -> NewDocument {
        NewDocument {
            sharepoint_item_id: item_id.to_string(),
            sharepoint_drive_id: "drive-1".to_string(),
            name: "report.pdf".to_string(),
            path: "/Projects/report.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            file_size: 2048,
            web_url: Some("https://contoso.sharepoint.com/report.pdf".to_string()),
            created_by: Some("Alice".to_string()),
            last_modified_by: Some("Bob".to_string()),
            sharepoint_created_at: Some("2024-01-01T00:00:00Z".to_string()),
            sharepoint_modified_at: Some("2024-02-01T00:00:00Z".to_string()),
            quickxor_hash: None,
            file_blob_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_natural_key() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDocumentRepository::new(pool);

        let inserted = repo.insert(&sample_doc("item-1")).await.unwrap();
        assert!(inserted.id > 0);
        assert!(!inserted.is_deleted);

        let found = repo
            .find_by_natural_key("item-1", "drive-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, inserted.id);
        assert_eq!(found.path, "/Projects/report.pdf");
    }

    #[tokio::test]
    async fn test_natural_key_is_scoped_to_drive() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDocumentRepository::new(pool);

        repo.insert(&sample_doc("item-1")).await.unwrap();

        let missing = repo.find_by_natural_key("item-1", "drive-2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_natural_key_rejected() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDocumentRepository::new(pool);

        repo.insert(&sample_doc("item-1")).await.unwrap();
        let dup = repo.insert(&sample_doc("item-1")).await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_update_document() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDocumentRepository::new(pool);

        let mut doc = repo.insert(&sample_doc("item-1")).await.unwrap();
        doc.path = "/Archive/report.pdf".to_string();
        doc.file_size = 4096;
        repo.update(&doc).await.unwrap();

        let reloaded = repo.find_by_id(doc.id).await.unwrap().unwrap();
        assert_eq!(reloaded.path, "/Archive/report.pdf");
        assert_eq!(reloaded.file_size, 4096);
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDocumentRepository::new(pool.clone());

        let mut doc = repo.insert(&sample_doc("item-1")).await.unwrap();
        doc.id = 9999;

        let err = repo.update(&doc).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row_findable() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDocumentRepository::new(pool);

        let doc = repo.insert(&sample_doc("item-1")).await.unwrap();

        assert!(repo.soft_delete(doc.id).await.unwrap());
        // Second delete is a no-op
        assert!(!repo.soft_delete(doc.id).await.unwrap());

        let found = repo
            .find_by_natural_key("item-1", "drive-1")
            .await
            .unwrap()
            .unwrap();
        assert!(found.is_deleted);
        assert_eq!(repo.count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_active_counts_and_size() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteDocumentRepository::new(pool);

        repo.insert(&sample_doc("item-1")).await.unwrap();
        let second = repo.insert(&sample_doc("item-2")).await.unwrap();
        repo.soft_delete(second.id).await.unwrap();

        assert_eq!(repo.count_active().await.unwrap(), 1);
        assert_eq!(repo.total_active_size().await.unwrap(), 2048);
    }
}
