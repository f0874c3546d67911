//! Transfer metadata store.
//!
//! One row per relayed artifact in the `files` table: where it came from,
//! where it lives in the sink and what it is.
//!
//! # Example
//!
//! ```ignore
//! use relay_core::{Database, FileStore};
//!
//! let store = FileStore::new(Database::new_in_memory().await?);
//! for record in store.find_all().await? {
//!     println!("{} -> {}", record.source_url, record.remote_id);
//! }
//! ```

mod error;
mod repository;

pub use error::{StoreDbErrorKind, StoreError};
pub use repository::FileRepository;

use serde::Serialize;
use sqlx::FromRow;
use tracing::instrument;

use crate::db::Database;
use crate::relay::ArtifactDescriptor;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A stored transfer.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FileRecord {
    /// Row id.
    pub id: i64,
    /// URL the bytes were read from.
    pub source_url: String,
    /// Sink artifact id.
    pub remote_id: String,
    /// Browser view link.
    pub view_url: Option<String>,
    /// Direct download link.
    pub download_url: Option<String>,
    /// Content type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Insert time (UTC, `YYYY-MM-DD HH:MM:SS`).
    pub created_at: String,
}

/// Fields needed to insert a [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    /// URL the bytes were read from.
    pub source_url: String,
    /// Sink artifact id.
    pub remote_id: String,
    /// Browser view link.
    pub view_url: Option<String>,
    /// Direct download link.
    pub download_url: Option<String>,
    /// Content type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

impl NewFileRecord {
    /// Builds a record for an artifact relayed from `source_url`.
    pub fn from_artifact(source_url: impl Into<String>, artifact: &ArtifactDescriptor) -> Self {
        Self {
            source_url: source_url.into(),
            remote_id: artifact.remote_id.clone(),
            view_url: artifact.view_url.clone(),
            download_url: artifact.download_url.clone(),
            mime_type: artifact.mime_type.clone(),
            size: artifact.size,
        }
    }
}

/// `SQLite`-backed file record store.
#[derive(Debug, Clone)]
pub struct FileStore {
    db: Database,
}

impl FileStore {
    /// Creates a store over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a record.
    ///
    /// # Errors
    ///
    /// [`StoreError::SizeOutOfRange`] for sizes beyond `i64::MAX`, otherwise
    /// [`StoreError::Database`].
    #[instrument(skip(self, record), fields(source_url = %record.source_url, remote_id = %record.remote_id))]
    pub async fn create(&self, record: &NewFileRecord) -> Result<FileRecord> {
        let size = i64::try_from(record.size).map_err(|_| StoreError::SizeOutOfRange(record.size))?;

        let created = sqlx::query_as::<_, FileRecord>(
            r"INSERT INTO files (source_url, remote_id, view_url, download_url, mime_type, size)
              VALUES (?, ?, ?, ?, ?, ?)
              RETURNING *",
        )
        .bind(&record.source_url)
        .bind(&record.remote_id)
        .bind(&record.view_url)
        .bind(&record.download_url)
        .bind(&record.mime_type)
        .bind(size)
        .fetch_one(self.db.pool())
        .await?;

        Ok(created)
    }

    /// Every record, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(r"SELECT * FROM files ORDER BY id ASC")
            .fetch_all(self.db.pool())
            .await?;
        Ok(records)
    }

    /// Newest record for `source_url`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn find_by_source_url(&self, source_url: &str) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            r"SELECT * FROM files WHERE source_url = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(source_url)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(record)
    }

    /// Deletes the record with `id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::RecordNotFound`] if no row matched.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: i64) -> Result<()> {
        let result = sqlx::query(r"DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(id));
        }
        Ok(())
    }
}
