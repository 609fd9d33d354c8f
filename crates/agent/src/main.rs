//! Relevancy Agent - runtime SBOM relevancy for Kubernetes containers
//!
//! This binary runs as a DaemonSet on each Kubernetes node, records the
//! files each container accesses and reduces container SBOMs to them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use relevancy_agent::{api, config::AgentConfig, k8s};
use relevancy_lib::{
    filestore::open_store,
    health::{Component, ComponentStatus, HealthRegistry},
    k8s::WorkloadResolver,
    models::Container,
    observability::{AgentMetrics, StructuredLogger},
    relevancy::{ContainerHandler, RelevancyManagerBuilder},
    sbom::DirectorySbomStore,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The container watcher lives outside this process; unregistration is logged only
struct LoggingContainerHandler;

#[async_trait]
impl ContainerHandler for LoggingContainerHandler {
    async fn unregister_container(&self, container: &Container) {
        info!(
            container_id = %container.id,
            k8s_workload = %container.workload_key(),
            "Container unregistered from watcher"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting relevancy-agent");

    let config = AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        cluster_name = %config.cluster_name,
        file_store = %config.file_store,
        "Agent configured"
    );

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let backend = config.store_backend()?;
    let health_registry = HealthRegistry::new(backend.name());
    let store = open_store(&backend)
        .await
        .context("Failed to open file access store")?;

    let resolver: Arc<dyn WorkloadResolver> = match k8s::KubeWorkloadResolver::try_default().await {
        Ok(resolver) => Arc::new(resolver),
        Err(e) => {
            warn!(error = %e, "Kubernetes client unavailable, SBOMs will not be acquired");
            health_registry
                .set_status(
                    Component::KubernetesApi,
                    ComponentStatus::Unhealthy,
                    Some(e.to_string()),
                )
                .await;
            Arc::new(k8s::UnavailableResolver)
        }
    };

    let manager = RelevancyManagerBuilder::new()
        .config(config.relevancy_config())
        .store(store.clone())
        .workload_resolver(resolver)
        .sbom_factory(Arc::new(DirectorySbomStore::new(config.sbom_dir.clone())))
        .observer(Arc::new(metrics.clone()))
        .build()?;
    manager.set_container_handler(Arc::new(LoggingContainerHandler));
    manager.start();

    logger.log_startup(AGENT_VERSION, backend.name());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        manager.clone(),
    ));

    // Mark agent as ready after initialization
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    manager.shutdown().await;
    store.close().await;
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
