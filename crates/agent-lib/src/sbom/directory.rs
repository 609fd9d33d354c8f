//! Filesystem-backed SBOM collaborator
//!
//! Layout under the root directory:
//! - `inventories/<image-key>.json`: full inventory of an image
//! - `filtered/<storage-key>.json`: inventory reduced to accessed files
//!
//! Filtered inventories are written with create-new semantics, so a second
//! writer for the same storage key gets `SbomError::AlreadyExists`.

use super::{SbomClient, SbomClientFactory};
use crate::error::SbomError;
use crate::filestore::FileSet;
use crate::models::InstanceId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const INVENTORIES_DIR: &str = "inventories";
const FILTERED_DIR: &str = "filtered";

/// Full inventory of an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub image_id: String,
    /// False when the scanner could not catalogue the whole image
    #[serde(default = "default_complete")]
    pub complete: bool,
    pub files: Vec<String>,
}

fn default_complete() -> bool {
    true
}

/// Inventory reduced to the files a container accessed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredInventory {
    pub image_id: String,
    pub parent_wlid: String,
    pub instance_id: String,
    pub generated_at: i64,
    pub files: Vec<String>,
}

/// File name used for an image ID
fn image_key(image_id: &str) -> String {
    image_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Factory handing out directory-backed SBOM clients
#[derive(Debug, Clone)]
pub struct DirectorySbomStore {
    root: PathBuf,
}

impl DirectorySbomStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the inventory for `image_id`
    pub fn inventory_path(&self, image_id: &str) -> PathBuf {
        self.root
            .join(INVENTORIES_DIR)
            .join(format!("{}.json", image_key(image_id)))
    }

    /// Path of the filtered inventory stored under `storage_key`
    pub fn filtered_path(&self, storage_key: &str) -> PathBuf {
        self.root
            .join(FILTERED_DIR)
            .join(format!("{}.json", image_key(storage_key)))
    }

    /// Write an inventory for `image_id`, replacing any previous one
    pub async fn put_inventory(&self, inventory: &Inventory) -> Result<(), SbomError> {
        let path = self.inventory_path(&inventory.image_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, serde_json::to_vec_pretty(inventory)?).await?;
        Ok(())
    }
}

impl SbomClientFactory for DirectorySbomStore {
    fn create_client(&self, parent_wlid: &str, instance_id: &InstanceId) -> Arc<dyn SbomClient> {
        Arc::new(DirectorySbomClient::new(
            self.clone(),
            parent_wlid.to_string(),
            instance_id.clone(),
        ))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    inventory: Option<Inventory>,
    filtered: Option<Vec<String>>,
}

/// SBOM session for one container, backed by `DirectorySbomStore`
#[derive(Debug)]
pub struct DirectorySbomClient {
    store: DirectorySbomStore,
    parent_wlid: String,
    instance_id: InstanceId,
    state: RwLock<SessionState>,
}

impl DirectorySbomClient {
    pub fn new(store: DirectorySbomStore, parent_wlid: String, instance_id: InstanceId) -> Self {
        Self {
            store,
            parent_wlid,
            instance_id,
            state: RwLock::new(SessionState::default()),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[async_trait]
impl SbomClient for DirectorySbomClient {
    fn is_inventory_present(&self) -> bool {
        self.with_state(|state| state.inventory.is_some())
    }

    async fn fetch_inventory(&self, image_tag: &str, image_id: &str) -> Result<(), SbomError> {
        let path = self.store.inventory_path(image_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SbomError::NotFound(format!("{image_tag} ({image_id})")));
            }
            Err(e) => return Err(e.into()),
        };

        let inventory: Inventory = serde_json::from_slice(&bytes)?;
        debug!(
            image_tag = %image_tag,
            image_id = %image_id,
            files = inventory.files.len(),
            "Fetched SBOM"
        );
        self.with_state_mut(|state| state.inventory = Some(inventory));
        Ok(())
    }

    async fn validate_completeness(&self) -> Result<(), SbomError> {
        self.with_state(|state| match &state.inventory {
            None => Err(SbomError::Other("SBOM has not been fetched".to_string())),
            Some(inventory) if !inventory.complete => {
                Err(SbomError::Incomplete(inventory.image_id.clone()))
            }
            Some(_) => Ok(()),
        })
    }

    async fn filter_to_accessed_files(&self, files: &FileSet) -> Result<(), SbomError> {
        self.with_state_mut(|state| -> Result<(), SbomError> {
            let inventory = state
                .inventory
                .as_ref()
                .ok_or_else(|| SbomError::Other("SBOM has not been fetched".to_string()))?;

            let mut relevant: Vec<String> = inventory
                .files
                .iter()
                .filter(|f| files.contains(*f))
                .cloned()
                .collect();
            relevant.sort();
            relevant.dedup();

            state.filtered = Some(relevant);
            Ok(())
        })
    }

    async fn persist_filtered_inventory(
        &self,
        image_id: &str,
        storage_key: &str,
    ) -> Result<(), SbomError> {
        let files = self
            .with_state(|state| state.filtered.clone())
            .ok_or_else(|| SbomError::Other("SBOM has not been filtered".to_string()))?;

        let document = FilteredInventory {
            image_id: image_id.to_string(),
            parent_wlid: self.parent_wlid.clone(),
            instance_id: self.instance_id.to_string(),
            generated_at: chrono::Utc::now().timestamp(),
            files,
        };

        let path = self.store.filtered_path(storage_key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SbomError::AlreadyExists(storage_key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(&serde_json::to_vec_pretty(&document)?).await?;
        file.sync_all().await?;

        debug!(
            storage_key = %storage_key,
            files = document.files.len(),
            "Filtered SBOM written"
        );
        Ok(())
    }

    fn release_resources(&self) {
        self.with_state_mut(|state| *state = SessionState::default());
    }
}
