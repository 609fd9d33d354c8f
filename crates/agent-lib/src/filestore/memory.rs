//! In-memory file access store

use super::{FileAccessStore, FileSet};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// File access store backed by a concurrent map.
///
/// Each bucket is locked independently, so containers never contend with
/// each other. No reference into the map is held across an await point.
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    buckets: DashMap<String, FileSet>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Number of buckets currently held
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl FileAccessStore for InMemoryFileStore {
    async fn record_file(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(path.to_string());
        Ok(())
    }

    async fn record_files(&self, bucket: &str, paths: &FileSet) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }

        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .extend(paths.iter().cloned());
        Ok(())
    }

    async fn list_files(&self, bucket: &str) -> Result<FileSet, StoreError> {
        self.buckets
            .get(bucket)
            .map(|files| files.value().clone())
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        if self.buckets.remove(bucket).is_some() {
            debug!(bucket = %bucket, "Deleted file bucket");
        }
        Ok(())
    }

    async fn close(&self) {
        self.buckets.clear();
    }
}
