//! Kubernetes workload resolution
//!
//! The API lookups themselves live behind `WorkloadResolver`; this module
//! turns a resolved pod into the image and identity fields a watched
//! container needs before its inventory can be fetched.

use crate::error::K8sError;
use crate::models::{ContainerIdentity, InstanceId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Owner reference of a Kubernetes object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    pub controller: bool,
}

/// Container declared in a pod spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
}

/// Runtime status of a pod container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub image_id: String,
}

/// The subset of a Kubernetes workload object the agent reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub owner_references: Vec<OwnerReference>,
    /// Regular (non-init) containers, pods only
    pub containers: Vec<ContainerSpec>,
    /// Populated once the kubelet reports status, pods only
    pub container_statuses: Vec<ContainerStatus>,
}

impl Workload {
    /// Controlling owner, falling back to the first owner listed
    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owner_references
            .iter()
            .find(|owner| owner.controller)
            .or_else(|| self.owner_references.first())
    }

    /// Workload ID of this object within `cluster`
    pub fn generate_wlid(&self, cluster: &str) -> String {
        format!(
            "wlid://cluster-{}/namespace-{}/{}-{}",
            cluster,
            self.namespace,
            self.kind.to_lowercase(),
            self.name
        )
    }
}

/// Kubernetes lookups required by the relevancy manager
#[async_trait]
pub trait WorkloadResolver: Send + Sync {
    /// Fetch a workload object by kind and name
    async fn resolve_workload(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<Workload, K8sError>;

    /// Walk owner references from a pod up to its top-most controller.
    /// Returns `(kind, name)`; a bare pod is its own parent.
    async fn resolve_parent_workload(&self, pod: &Workload) -> Result<(String, String), K8sError>;
}

/// Check that a workload ID has the `wlid://cluster-<c>/namespace-<ns>/<kind>-<name>` shape
pub fn validate_wlid(wlid: &str) -> Result<(), K8sError> {
    let invalid = || K8sError::InvalidIdentity(format!("malformed wlid: {wlid}"));

    let rest = wlid.strip_prefix("wlid://").ok_or_else(invalid)?;
    let parts: Vec<&str> = rest.split('/').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let cluster = parts[0].strip_prefix("cluster-").ok_or_else(invalid)?;
    let namespace = parts[1].strip_prefix("namespace-").ok_or_else(invalid)?;
    let (kind, name) = parts[2].split_once('-').ok_or_else(invalid)?;

    if [cluster, namespace, kind, name].iter().any(|p| p.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// Derive the image and identity fields for `container_name` in `pod`.
///
/// Returns `Ok(None)` when the pod does not (yet) describe the container
/// fully: init containers, or a status the kubelet has not reported.
pub async fn resolve_container_identity(
    resolver: &dyn WorkloadResolver,
    cluster: &str,
    pod: &Workload,
    container_name: &str,
) -> Result<Option<ContainerIdentity>, K8sError> {
    let (kind, name) = resolver.resolve_parent_workload(pod).await?;
    let parent = resolver
        .resolve_workload(&pod.namespace, &kind, &name)
        .await?;

    let parent_wlid = parent.generate_wlid(cluster);
    validate_wlid(&parent_wlid)?;

    let image_tag = pod
        .containers
        .iter()
        .find(|c| c.name == container_name)
        .map(|c| c.image.clone())
        .unwrap_or_default();

    let image_id = pod
        .container_statuses
        .iter()
        .find(|s| s.name == container_name)
        .map(|s| s.image_id.clone())
        .unwrap_or_default();

    let (instance_kind, instance_name) = match pod.controller() {
        Some(owner) => (owner.kind.clone(), owner.name.clone()),
        None => (pod.kind.clone(), pod.name.clone()),
    };
    let instance_id = InstanceId {
        namespace: pod.namespace.clone(),
        kind: instance_kind,
        name: instance_name,
        container_name: container_name.to_string(),
    };

    debug!(
        image_id = %image_id,
        image_tag = %image_tag,
        parent_wlid = %parent_wlid,
        instance_id = %instance_id,
        "Parsed pod data"
    );

    if image_id.is_empty() || image_tag.is_empty() {
        return Ok(None);
    }

    Ok(Some(ContainerIdentity {
        image_id,
        image_tag,
        parent_wlid,
        instance_id,
    }))
}
