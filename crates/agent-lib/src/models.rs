//! Core data models for the relevancy agent

use serde::{Deserialize, Serialize};
use std::fmt;

/// A running container as reported by the container watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Runtime identifier, unique per container instance
    pub id: String,
    pub namespace: String,
    pub pod_name: String,
    /// Container name inside the pod spec
    pub name: String,
}

impl Container {
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            name: name.into(),
        }
    }

    /// Logical container slot this instance belongs to
    pub fn workload_key(&self) -> WorkloadKey {
        WorkloadKey::new(&self.namespace, &self.pod_name, &self.name)
    }
}

/// Composite `namespace/pod/container` key.
///
/// Stable across restarts of the same logical container and used as the
/// file access bucket name for every store operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadKey(String);

impl WorkloadKey {
    pub fn new(namespace: &str, pod_name: &str, container_name: &str) -> Self {
        Self([namespace, pod_name, container_name].join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WorkloadKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of a single pod container, used to key its filtered inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceId {
    pub namespace: String,
    pub kind: String,
    pub name: String,
    pub container_name: String,
}

/// Maximum length of a Kubernetes object name
const MAX_SLUG_LEN: usize = 253;

impl InstanceId {
    /// Storage key for the filtered inventory of this instance.
    ///
    /// Lowercased `kind-name-container`; characters outside `[a-z0-9.-]`
    /// become `-`.
    pub fn slug(&self) -> Result<String, crate::error::K8sError> {
        if self.kind.is_empty() || self.name.is_empty() || self.container_name.is_empty() {
            return Err(crate::error::K8sError::InvalidIdentity(format!(
                "instance id has empty parts: {self}"
            )));
        }

        let slug: String = format!("{}-{}-{}", self.kind, self.name, self.container_name)
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '-'
                }
            })
            .collect();

        if slug.len() > MAX_SLUG_LEN {
            return Err(crate::error::K8sError::InvalidIdentity(format!(
                "slug exceeds {MAX_SLUG_LEN} characters: {slug}"
            )));
        }

        Ok(slug)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "namespace-{}/kind-{}/name-{}/containerName-{}",
            self.namespace, self.kind, self.name, self.container_name
        )
    }
}

/// Image and workload identity resolved for a watched container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerIdentity {
    pub image_id: String,
    pub image_tag: String,
    pub parent_wlid: String,
    pub instance_id: InstanceId,
}
