//! Registry of containers under relevancy monitoring

use super::watched::WatchedContainer;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Concurrent map of runtime container ID -> watch state.
///
/// After registration only the container's monitor task mutates its entry;
/// the one exception is termination, which removes the entry concurrently.
/// Every caller therefore treats a missing entry as "already gone".
#[derive(Default)]
pub struct ContainerStateRegistry {
    containers: DashMap<String, Arc<WatchedContainer>>,
}

impl ContainerStateRegistry {
    pub fn new() -> Self {
        Self {
            containers: DashMap::new(),
        }
    }

    /// Store a container unless one with the same ID is already registered.
    /// Returns `false` when the ID was taken.
    pub fn register(&self, watched: Arc<WatchedContainer>) -> bool {
        match self.containers.entry(watched.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(container_id = %watched.id(), "Registering container");
                slot.insert(watched);
                true
            }
        }
    }

    /// Load a container's watch state
    pub fn get(&self, container_id: &str) -> Option<Arc<WatchedContainer>> {
        self.containers.get(container_id).map(|r| r.value().clone())
    }

    /// Load and delete a container's watch state
    pub fn unregister(&self, container_id: &str) -> Option<Arc<WatchedContainer>> {
        let removed = self.containers.remove(container_id).map(|(_, v)| v);
        if removed.is_some() {
            debug!(container_id = %container_id, "Unregistering container");
        }
        removed
    }

    /// Delete the entry only if it is still this exact watch state
    pub fn unregister_if_same(&self, watched: &Arc<WatchedContainer>) -> bool {
        self.containers
            .remove_if(watched.id(), |_, current| Arc::ptr_eq(current, watched))
            .is_some()
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.containers.contains_key(container_id)
    }

    /// IDs of all registered containers
    pub fn ids(&self) -> Vec<String> {
        self.containers.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
