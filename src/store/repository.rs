//! Repository seam over file record persistence.
//!
//! The batch driver depends on this trait rather than on [`FileStore`], so
//! tests can swap in failing or in-memory stores.

use async_trait::async_trait;

use super::{FileRecord, FileStore, NewFileRecord, Result};

/// Data-access contract for transfer metadata.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Inserts a record and returns it with its id and timestamp.
    async fn create(&self, record: &NewFileRecord) -> Result<FileRecord>;

    /// Every record, oldest first.
    async fn find_all(&self) -> Result<Vec<FileRecord>>;

    /// Newest record for `source_url`, if any.
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<FileRecord>>;

    /// Deletes by id.
    async fn delete_by_id(&self, id: i64) -> Result<()>;
}

#[async_trait]
impl FileRepository for FileStore {
    async fn create(&self, record: &NewFileRecord) -> Result<FileRecord> {
        FileStore::create(self, record).await
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>> {
        FileStore::find_all(self).await
    }

    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<FileRecord>> {
        FileStore::find_by_source_url(self, source_url).await
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        FileStore::delete_by_id(self, id).await
    }
}
