//! Agent library for runtime SBOM relevancy
//!
//! This crate provides the core functionality for:
//! - Recording the files each container accesses (memory and SQLite stores)
//! - Per-container monitoring and SBOM finalization
//! - Workload identity resolution contracts
//! - A directory-backed SBOM collaborator
//! - Health checks and observability

pub mod error;
pub mod filestore;
pub mod health;
pub mod k8s;
pub mod models;
pub mod observability;
pub mod relevancy;
pub mod sbom;

pub use error::{AcquisitionError, K8sError, MonitorExit, SbomError, StoreError};
pub use filestore::{open_store, FileAccessStore, FileSet, StoreBackend};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use relevancy::{ContainerHandler, RelevancyConfig, RelevancyManager, RelevancyManagerBuilder};
