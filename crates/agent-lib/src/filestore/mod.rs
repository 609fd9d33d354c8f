//! Per-container sets of accessed file paths
//!
//! A store maps a bucket key (the container's workload key) to the set of
//! file paths observed for that container. Two backends are provided:
//! - `InMemoryFileStore`: concurrent map, lost on restart
//! - `SqliteFileStore`: durable, every write is a single transaction
//!
//! Both backends share the same contract:
//! - recording creates the bucket on first use and collapses duplicates
//! - `record_files` merges (union) with whatever is already stored
//! - `list_files` on an unknown bucket fails with `StoreError::BucketNotFound`
//! - removing an unknown bucket is not an error
//! - `record_files` with an empty set does not create the bucket

mod memory;
mod sqlite;


pub use memory::InMemoryFileStore;
pub use sqlite::SqliteFileStore;

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Set of distinct file paths recorded for one bucket
pub type FileSet = HashSet<String>;

/// Storage abstraction for accessed-file buckets
#[async_trait]
pub trait FileAccessStore: Send + Sync {
    /// Add a single path to a bucket, creating the bucket if needed
    async fn record_file(&self, bucket: &str, path: &str) -> Result<(), StoreError>;

    /// Merge a set of paths into a bucket
    async fn record_files(&self, bucket: &str, paths: &FileSet) -> Result<(), StoreError>;

    /// Snapshot of the paths currently in a bucket
    async fn list_files(&self, bucket: &str) -> Result<FileSet, StoreError>;

    /// Delete a bucket and all of its entries
    async fn remove_bucket(&self, bucket: &str) -> Result<(), StoreError>;

    /// Release backend resources
    async fn close(&self);
}

/// Which backend to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite(PathBuf),
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite(_) => "sqlite",
        }
    }
}

/// Open the configured file access store
pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn FileAccessStore>, StoreError> {
    match backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory file access store");
            Ok(Arc::new(InMemoryFileStore::new()))
        }
        StoreBackend::Sqlite(path) => {
            tracing::info!(path = %path.display(), "Using SQLite file access store");
            Ok(Arc::new(SqliteFileStore::open(path).await?))
        }
    }
}
