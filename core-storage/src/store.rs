//! # Content-Addressed Blob Store
//!
//! Bytes are keyed by their SHA-256 hash and written once: storing the
//! same content twice increments the reference count instead of writing
//! a second copy. On-disk layout is a two-level fan-out derived from the
//! hex hash, `ab/cd/abcd…`, which keeps directory sizes bounded for
//! large mirrors.
//!
//! The row in `file_blobs` is the source of truth for refcounts; the
//! file on disk is only ever created when a row is inserted and removed
//! when the count reaches zero.

use crate::error::{Result, StorageError};
use core_library::models::{now_rfc3339, FileBlob};
use sha2::{Digest, Sha256};
use sqlx::{query, query_as, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A discrepancy between the blob table and the on-disk tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// A row exists but the file is missing from disk
    MissingFile { sha256_hash: String },
    /// The file's content no longer hashes to its name
    HashMismatch { sha256_hash: String },
    /// A file on disk has no corresponding row
    OrphanedFile { path: PathBuf },
}

/// Content-addressed blob store backed by the `file_blobs` table and a
/// fan-out directory tree.
pub struct BlobStore {
    pool: SqlitePool,
    blobs_dir: PathBuf,
}

impl BlobStore {
    pub fn new(pool: SqlitePool, blobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            blobs_dir: blobs_dir.into(),
        }
    }

    /// Compute the SHA-256 hex digest of a byte slice
    pub fn hash_content(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// On-disk path for a blob, `<root>/ab/cd/abcd…`
    pub fn blob_path_for(&self, sha256_hash: &str) -> PathBuf {
        self.blobs_dir
            .join(&sha256_hash[0..2])
            .join(&sha256_hash[2..4])
            .join(sha256_hash)
    }

    /// Store content, deduplicating by hash.
    ///
    /// If a blob with the same hash already exists its reference count is
    /// incremented and no bytes are written; the stored MIME type of the
    /// first writer wins. Otherwise the file is written and a new row is
    /// inserted with a reference count of 1.
    pub async fn store(&self, content: &[u8], mime_type: Option<&str>) -> Result<FileBlob> {
        let sha256_hash = Self::hash_content(content);

        let mut tx = self.pool.begin().await?;

        let existing =
            query_as::<_, FileBlob>("SELECT * FROM file_blobs WHERE sha256_hash = ?")
                .bind(&sha256_hash)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(blob) = existing {
            query("UPDATE file_blobs SET reference_count = reference_count + 1 WHERE id = ?")
                .bind(blob.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            debug!(hash = %sha256_hash, refs = blob.reference_count + 1, "Blob deduplicated");

            return Ok(FileBlob {
                reference_count: blob.reference_count + 1,
                ..blob
            });
        }

        let path = self.blob_path_for(&sha256_hash);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        let result = query(
            r#"
            INSERT INTO file_blobs (sha256_hash, file_size, mime_type, reference_count, created_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(&sha256_hash)
        .bind(content.len() as i64)
        .bind(mime_type)
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        tx.commit().await?;

        debug!(hash = %sha256_hash, size = content.len(), "Blob stored");

        self.find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(sha256_hash))
    }

    /// Read a blob's content by row id. Returns `None` if no such blob
    /// exists or its file is missing from disk; `verify()` is the tool
    /// for telling those apart.
    pub async fn read(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let Some(blob) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        self.read_file(&blob.sha256_hash).await
    }

    /// Read a blob's content by its SHA-256 hex digest
    pub async fn read_by_hash(&self, sha256_hash: &str) -> Result<Option<Vec<u8>>> {
        if self.find_by_hash(sha256_hash).await?.is_none() {
            return Ok(None);
        }

        self.read_file(sha256_hash).await
    }

    async fn read_file(&self, sha256_hash: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.blob_path_for(sha256_hash)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(hash = %sha256_hash, "Blob row exists but file is missing");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<FileBlob>> {
        let blob = query_as::<_, FileBlob>("SELECT * FROM file_blobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(blob)
    }

    pub async fn find_by_hash(&self, sha256_hash: &str) -> Result<Option<FileBlob>> {
        let blob = query_as::<_, FileBlob>("SELECT * FROM file_blobs WHERE sha256_hash = ?")
            .bind(sha256_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(blob)
    }

    /// Drop one reference to a blob. When the count reaches zero the row
    /// and the file are removed.
    ///
    /// # Returns
    /// - `Ok(true)` if the blob was fully removed
    /// - `Ok(false)` if references remain
    ///
    /// # Errors
    /// Returns `NotFound` if no row with the given id exists
    pub async fn release(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let blob = query_as::<_, FileBlob>("SELECT * FROM file_blobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        if blob.reference_count > 1 {
            query("UPDATE file_blobs SET reference_count = reference_count - 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            debug!(hash = %blob.sha256_hash, refs = blob.reference_count - 1, "Blob released");
            return Ok(false);
        }

        query("DELETE FROM file_blobs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let path = self.blob_path_for(&blob.sha256_hash);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(hash = %blob.sha256_hash, error = %e, "Failed to remove blob file");
        } else {
            self.prune_empty_parents(&path).await;
        }

        info!(hash = %blob.sha256_hash, "Blob removed");
        Ok(true)
    }

    /// Best-effort removal of fan-out directories left empty after a
    /// blob is deleted. Failures (e.g. a concurrent writer) are ignored.
    async fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.blobs_dir {
                break;
            }
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    /// Check every blob row against the on-disk tree and the tree against
    /// the rows. Read-only: reports issues without repairing anything.
    pub async fn verify(&self) -> Result<Vec<IntegrityIssue>> {
        let mut issues = Vec::new();

        let blobs = query_as::<_, FileBlob>("SELECT * FROM file_blobs")
            .fetch_all(&self.pool)
            .await?;

        let mut known: HashSet<String> = HashSet::with_capacity(blobs.len());

        for blob in &blobs {
            known.insert(blob.sha256_hash.clone());
            let path = self.blob_path_for(&blob.sha256_hash);

            match tokio::fs::read(&path).await {
                Ok(content) => {
                    if Self::hash_content(&content) != blob.sha256_hash {
                        issues.push(IntegrityIssue::HashMismatch {
                            sha256_hash: blob.sha256_hash.clone(),
                        });
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    issues.push(IntegrityIssue::MissingFile {
                        sha256_hash: blob.sha256_hash.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        for path in self.walk_blob_files().await? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if !known.contains(&name) {
                issues.push(IntegrityIssue::OrphanedFile { path });
            }
        }

        if !issues.is_empty() {
            warn!(issues = issues.len(), "Blob store integrity issues found");
        }

        Ok(issues)
    }

    /// Enumerate files in the fixed two-level fan-out. Unexpected entries
    /// at the first two levels are skipped rather than descended into.
    async fn walk_blob_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let Ok(mut level1) = tokio::fs::read_dir(&self.blobs_dir).await else {
            return Ok(files);
        };

        while let Some(entry1) = level1.next_entry().await? {
            if !entry1.file_type().await?.is_dir() {
                continue;
            }
            let mut level2 = tokio::fs::read_dir(entry1.path()).await?;
            while let Some(entry2) = level2.next_entry().await? {
                if !entry2.file_type().await?.is_dir() {
                    continue;
                }
                let mut leaves = tokio::fs::read_dir(entry2.path()).await?;
                while let Some(leaf) = leaves.next_entry().await? {
                    if leaf.file_type().await?.is_file() {
                        files.push(leaf.path());
                    }
                }
            }
        }

        Ok(files)
    }

    /// Number of distinct blobs
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = query_as("SELECT COUNT(*) FROM file_blobs")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    /// Total bytes across distinct blobs (deduplicated size)
    pub async fn total_size(&self) -> Result<i64> {
        let row: (i64,) = query_as("SELECT COALESCE(SUM(file_size), 0) FROM file_blobs")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }
}
