//! Durable file access store backed by a local SQLite database

use super::{FileAccessStore, FileSet};
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// One row per (bucket, path); the presence of a row is the membership.
const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS file_access (\
     bucket TEXT NOT NULL, \
     path TEXT NOT NULL, \
     PRIMARY KEY (bucket, path)\
     ) WITHOUT ROWID";

const INSERT_FILE: &str = "INSERT OR IGNORE INTO file_access (bucket, path) VALUES (?, ?)";

const SELECT_FILES: &str = "SELECT path FROM file_access WHERE bucket = ?";

const DELETE_BUCKET: &str = "DELETE FROM file_access WHERE bucket = ?";

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File access store persisted in a single SQLite file.
///
/// A bucket exists exactly when it holds at least one row. Every write runs
/// in one transaction, so a crash never leaves a bucket partially merged.
#[derive(Debug, Clone)]
pub struct SqliteFileStore {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteFileStore {
    /// Open (or create) the database at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        debug!(path = %path.display(), "File access database opened");
        Ok(Self { path, pool })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileAccessStore for SqliteFileStore {
    async fn record_file(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        sqlx::query(INSERT_FILE)
            .bind(bucket)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_files(&self, bucket: &str, paths: &FileSet) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for path in paths {
            sqlx::query(INSERT_FILE)
                .bind(bucket)
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(bucket = %bucket, count = paths.len(), "Merged files into bucket");
        Ok(())
    }

    async fn list_files(&self, bucket: &str) -> Result<FileSet, StoreError> {
        let rows: Vec<String> = sqlx::query_scalar(SELECT_FILES)
            .bind(bucket)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }

        Ok(rows.into_iter().collect())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let result = sqlx::query(DELETE_BUCKET)
            .bind(bucket)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(bucket = %bucket, "Deleted file bucket");
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!(path = %self.path.display(), "File access database closed");
    }
}
