//! Kubernetes workload resolver backed by kube-rs

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use relevancy_lib::error::K8sError;
use relevancy_lib::k8s::{
    ContainerSpec, ContainerStatus, OwnerReference, Workload, WorkloadResolver,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Owner chains deeper than this are cut off (Pod -> ReplicaSet -> Deployment is 2)
const MAX_OWNER_DEPTH: usize = 5;

/// Resolves workloads through the Kubernetes API
pub struct KubeWorkloadResolver {
    client: Client,
}

impl KubeWorkloadResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// In-cluster config, falling back to the local kubeconfig
    pub async fn try_default() -> Result<Self, K8sError> {
        let client = Client::try_default()
            .await
            .map_err(|e| K8sError::Api(e.to_string()))?;
        Ok(Self::new(client))
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<K, K8sError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => K8sError::NotFound {
                kind: K::kind(&Default::default()).to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            other => K8sError::Api(other.to_string()),
        })
    }
}

#[async_trait]
impl WorkloadResolver for KubeWorkloadResolver {
    async fn resolve_workload(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<Workload, K8sError> {
        let workload = match kind {
            "Pod" => pod_to_workload(&self.get::<Pod>(namespace, name).await?),
            "ReplicaSet" => object_to_workload(&self.get::<ReplicaSet>(namespace, name).await?),
            "Deployment" => object_to_workload(&self.get::<Deployment>(namespace, name).await?),
            "StatefulSet" => object_to_workload(&self.get::<StatefulSet>(namespace, name).await?),
            "DaemonSet" => object_to_workload(&self.get::<DaemonSet>(namespace, name).await?),
            "Job" => object_to_workload(&self.get::<Job>(namespace, name).await?),
            "CronJob" => object_to_workload(&self.get::<CronJob>(namespace, name).await?),
            other => {
                return Err(K8sError::Api(format!("unsupported workload kind {other}")));
            }
        };
        Ok(workload)
    }

    async fn resolve_parent_workload(&self, pod: &Workload) -> Result<(String, String), K8sError> {
        let Some(owner) = pod.controller() else {
            return Ok((pod.kind.clone(), pod.name.clone()));
        };

        let mut current = (owner.kind.clone(), owner.name.clone());
        for _ in 0..MAX_OWNER_DEPTH {
            if !is_supported_kind(&current.0) {
                break;
            }
            let workload = self
                .resolve_workload(&pod.namespace, &current.0, &current.1)
                .await?;
            match workload.controller() {
                Some(parent) => current = (parent.kind.clone(), parent.name.clone()),
                None => break,
            }
        }

        debug!(kind = %current.0, name = %current.1, pod = %pod.name, "Resolved parent workload");
        Ok(current)
    }
}

fn is_supported_kind(kind: &str) -> bool {
    matches!(
        kind,
        "ReplicaSet" | "Deployment" | "StatefulSet" | "DaemonSet" | "Job" | "CronJob"
    )
}

fn owner_references<K: Resource>(object: &K) -> Vec<OwnerReference> {
    object
        .meta()
        .owner_references
        .iter()
        .flatten()
        .map(|owner| OwnerReference {
            kind: owner.kind.clone(),
            name: owner.name.clone(),
            controller: owner.controller.unwrap_or(false),
        })
        .collect()
}

/// Metadata-only view of a workload object
fn object_to_workload<K>(object: &K) -> Workload
where
    K: Resource,
    <K as Resource>::DynamicType: Default,
{
    let meta = object.meta();
    Workload {
        kind: K::kind(&Default::default()).to_string(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        owner_references: owner_references(object),
        ..Default::default()
    }
}

pub fn pod_to_workload(pod: &Pod) -> Workload {
    let mut workload = object_to_workload(pod);

    if let Some(spec) = &pod.spec {
        workload.containers = spec
            .containers
            .iter()
            .map(|c| ContainerSpec {
                name: c.name.clone(),
                image: c.image.clone().unwrap_or_default(),
            })
            .collect();
    }

    workload.container_statuses = pod
        .status
        .iter()
        .flat_map(|status| status.container_statuses.iter().flatten())
        .map(|s| ContainerStatus {
            name: s.name.clone(),
            image_id: s.image_id.clone(),
        })
        .collect();

    workload
}

/// Resolver used when no Kubernetes client could be created.
/// Every lookup fails, so no container ever gets an SBOM.
pub struct UnavailableResolver;

#[async_trait]
impl WorkloadResolver for UnavailableResolver {
    async fn resolve_workload(
        &self,
        _namespace: &str,
        _kind: &str,
        _name: &str,
    ) -> Result<Workload, K8sError> {
        Err(K8sError::Api("kubernetes client unavailable".to_string()))
    }

    async fn resolve_parent_workload(&self, _pod: &Workload) -> Result<(String, String), K8sError> {
        Err(K8sError::Api("kubernetes client unavailable".to_string()))
    }
}
