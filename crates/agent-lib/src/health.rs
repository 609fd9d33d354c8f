//! Liveness and readiness state of the relevancy agent

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Parts of the agent that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    FileStore,
    RelevancyManager,
    KubernetesApi,
}

impl Component {
    pub const ALL: [Component; 3] = [
        Component::FileStore,
        Component::RelevancyManager,
        Component::KubernetesApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::FileStore => "file_store",
            Component::RelevancyManager => "relevancy_manager",
            Component::KubernetesApi => "kubernetes_api",
        }
    }

    /// Without the Kubernetes API no SBOM is acquired, but file accesses are
    /// still recorded, so only the store and the manager gate readiness.
    pub fn is_critical(&self) -> bool {
        !matches!(self, Component::KubernetesApi)
    }
}

/// Ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the component entered its current status
    pub since: DateTime<Utc>,
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub store_backend: String,
    pub watched_containers: usize,
    pub components: BTreeMap<Component, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

struct HealthState {
    ready: bool,
    components: BTreeMap<Component, ComponentHealth>,
}

/// Shared health state. Every component starts healthy; the agent starts not ready.
#[derive(Clone)]
pub struct HealthRegistry {
    store_backend: Arc<str>,
    state: Arc<RwLock<HealthState>>,
}

impl HealthRegistry {
    pub fn new(store_backend: &str) -> Self {
        let now = Utc::now();
        let components = Component::ALL
            .into_iter()
            .map(|component| {
                let health = ComponentHealth {
                    status: ComponentStatus::Healthy,
                    message: None,
                    since: now,
                };
                (component, health)
            })
            .collect();

        Self {
            store_backend: Arc::from(store_backend),
            state: Arc::new(RwLock::new(HealthState {
                ready: false,
                components,
            })),
        }
    }

    /// Record a component's status. `since` only moves when the status changes.
    pub async fn set_status(
        &self,
        component: Component,
        status: ComponentStatus,
        message: Option<String>,
    ) {
        let mut state = self.state.write().await;
        let health = state
            .components
            .entry(component)
            .or_insert_with(|| ComponentHealth {
                status,
                message: None,
                since: Utc::now(),
            });

        if health.status != status {
            match status {
                ComponentStatus::Healthy => info!(component = component.as_str(), "Component recovered"),
                _ => warn!(
                    component = component.as_str(),
                    status = ?status,
                    message = message.as_deref().unwrap_or_default(),
                    "Component health changed"
                ),
            }
            health.status = status;
            health.since = Utc::now();
        }
        health.message = message;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    /// Snapshot for `/healthz`; overall status is the worst component status
    pub async fn health(&self, watched_containers: usize) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        HealthResponse {
            status,
            store_backend: self.store_backend.to_string(),
            watched_containers,
            components: state.components.clone(),
        }
    }

    /// Ready once initialized, as long as no critical component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        if !state.ready {
            return ReadinessResponse {
                ready: false,
                reason: Some("Agent not yet initialized".to_string()),
            };
        }

        let failed = state.components.iter().find(|(component, health)| {
            component.is_critical() && health.status == ComponentStatus::Unhealthy
        });

        ReadinessResponse {
            ready: failed.is_none(),
            reason: failed.map(|(component, _)| {
                format!("Critical component {} unhealthy", component.as_str())
            }),
        }
    }
}
