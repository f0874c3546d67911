//! SQLite connection pool and schema bootstrap for the transfer metadata store.
//!
//! File databases run in WAL mode with a busy timeout so concurrent batch
//! tasks can record results without tripping over each other. Migrations are
//! embedded at compile time and applied on every open.
//!
//! # Example
//!
//! ```no_run
//! use relay_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("relay.db")).await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Pool size. SQLite serializes writers, so a handful is plenty.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database bootstrap errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Could not open or configure the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Embedded migrations failed.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The directory holding the database file could not be created.
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        /// Directory that could not be created.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Handle to the metadata database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path` and applies migrations.
    ///
    /// Missing parent directories are created first.
    ///
    /// # Errors
    ///
    /// [`DbError::Directory`], [`DbError::Connection`] or [`DbError::Migration`].
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DbError::Directory {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("database ready");

        Ok(Self { pool })
    }

    /// Opens a private in-memory database (single connection, no WAL).
    ///
    /// # Errors
    ///
    /// [`DbError::Connection`] or [`DbError::Migration`].
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether the journal mode is WAL.
    ///
    /// # Errors
    ///
    /// [`DbError::Connection`] if the pragma query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(mode.eq_ignore_ascii_case("wal"))
    }

    /// Closes every pooled connection.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_new_in_memory_succeeds() {
        let db = Database::new_in_memory().await;
        assert!(db.is_ok(), "Failed to create in-memory database");
    }

    #[tokio::test]
    async fn test_database_migrations_create_files_table() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO files (source_url, remote_id, mime_type, size) VALUES ('https://example.com/a.pdf', 'r1', 'application/pdf', 10)",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_ok(), "files table should exist after migration");
    }

    #[tokio::test]
    async fn test_database_files_created_at_defaults() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO files (source_url, remote_id, mime_type, size) VALUES ('https://example.com/a.pdf', 'r1', 'text/plain', 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let (created_at,): (String,) = sqlx::query_as("SELECT created_at FROM files")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!(!created_at.is_empty());
    }

    #[tokio::test]
    async fn test_database_with_tempfile() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).await;
        assert!(db.is_ok(), "Failed to create database at temp path");

        // Verify WAL mode is enabled for file-based databases
        let db = db.unwrap();
        let is_wal = db.is_wal_enabled().await.unwrap();
        assert!(is_wal, "WAL mode should be enabled for file-based database");
    }

    #[tokio::test]
    async fn test_database_files_rejects_negative_size() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO files (source_url, remote_id, mime_type, size) VALUES ('https://example.com', 'r1', 'text/plain', -1)",
        )
        .execute(db.pool())
        .await;

        assert!(
            result.is_err(),
            "negative size should be rejected by CHECK constraint"
        );
    }

    #[tokio::test]
    async fn test_database_pool_returns_valid_pool() {
        let db = Database::new_in_memory().await.unwrap();
        let pool = db.pool();

        // Verify pool works by running a simple query
        let result: (i64,) = sqlx::query_as("SELECT 1").fetch_one(pool).await.unwrap();

        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_database_creates_missing_parent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("dir").join("relay.db");

        Database::new(&db_path).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_database_close_works() {
        let db = Database::new_in_memory().await.unwrap();
        db.close().await;
            }
}
