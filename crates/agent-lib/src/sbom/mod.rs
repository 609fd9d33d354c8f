//! Software inventory (SBOM) collaborator
//!
//! The relevancy manager only talks to inventories through `SbomClient`:
//! fetch the inventory for an image, check it is complete, reduce it to the
//! accessed files and persist the reduced copy. `DirectorySbomStore` is a
//! local-filesystem implementation.

mod directory;

pub use directory::{DirectorySbomClient, DirectorySbomStore, FilteredInventory, Inventory};

use crate::error::SbomError;
use crate::filestore::FileSet;
use crate::models::InstanceId;
use async_trait::async_trait;
use std::sync::Arc;

/// Inventory session for one watched container
#[async_trait]
pub trait SbomClient: Send + Sync {
    /// Whether the inventory has already been fetched by this session
    fn is_inventory_present(&self) -> bool;

    /// Fetch the inventory of an image
    async fn fetch_inventory(&self, image_tag: &str, image_id: &str) -> Result<(), SbomError>;

    /// `SbomError::Incomplete` if the inventory can never be filtered
    async fn validate_completeness(&self) -> Result<(), SbomError>;

    /// Reduce the fetched inventory to the given accessed files
    async fn filter_to_accessed_files(&self, files: &FileSet) -> Result<(), SbomError>;

    /// Store the reduced inventory. Must report `SbomError::AlreadyExists`
    /// when `storage_key` is already taken.
    async fn persist_filtered_inventory(
        &self,
        image_id: &str,
        storage_key: &str,
    ) -> Result<(), SbomError>;

    /// Drop whatever the session holds
    fn release_resources(&self);
}

/// Creates one `SbomClient` per watched container
pub trait SbomClientFactory: Send + Sync {
    fn create_client(&self, parent_wlid: &str, instance_id: &InstanceId) -> Arc<dyn SbomClient>;
}
