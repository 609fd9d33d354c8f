//! Observability infrastructure for the relevancy agent
//!
//! Provides:
//! - Prometheus metrics (containers monitored, file accesses, SBOM acquisition, finalize jobs)
//! - Structured JSON logging with tracing

use crate::error::MonitorExit;
use crate::models::Container;
use crate::relevancy::{FinalizeOutcome, RelevancyObserver};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

/// Histogram buckets for finalize latency (in seconds)
const FINALIZE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    containers_monitored: IntGauge,
    file_accesses_recorded: IntCounter,
    sbom_acquisitions: IntCounter,
    sbom_acquisition_failures: IntCounter,
    finalize_started: IntCounter,
    finalize_outcomes: IntCounterVec,
    finalize_latency_seconds: Histogram,
    monitor_exits: IntCounterVec,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            containers_monitored: register_int_gauge!(
                "relevancy_agent_containers_monitored",
                "Number of containers currently being monitored"
            )
            .expect("Failed to register containers_monitored"),

            file_accesses_recorded: register_int_counter!(
                "relevancy_agent_file_accesses_recorded_total",
                "Total number of file accesses recorded"
            )
            .expect("Failed to register file_accesses_recorded"),

            sbom_acquisitions: register_int_counter!(
                "relevancy_agent_sbom_acquisitions_total",
                "Total number of SBOM acquisition attempts"
            )
            .expect("Failed to register sbom_acquisitions"),

            sbom_acquisition_failures: register_int_counter!(
                "relevancy_agent_sbom_acquisition_failures_total",
                "Total number of failed SBOM acquisition attempts"
            )
            .expect("Failed to register sbom_acquisition_failures"),

            finalize_started: register_int_counter!(
                "relevancy_agent_finalize_started_total",
                "Total number of finalize jobs started"
            )
            .expect("Failed to register finalize_started"),

            finalize_outcomes: register_int_counter_vec!(
                "relevancy_agent_finalize_outcomes_total",
                "Finalize jobs by outcome",
                &["outcome"]
            )
            .expect("Failed to register finalize_outcomes"),

            finalize_latency_seconds: register_histogram!(
                "relevancy_agent_finalize_latency_seconds",
                "Time spent filtering and storing an SBOM",
                FINALIZE_BUCKETS.to_vec()
            )
            .expect("Failed to register finalize_latency_seconds"),

            monitor_exits: register_int_counter_vec!(
                "relevancy_agent_monitor_exits_total",
                "Container monitor loops stopped, by reason",
                &["reason"]
            )
            .expect("Failed to register monitor_exits"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn containers_monitored(&self) -> i64 {
        self.inner().containers_monitored.get()
    }

    pub fn file_accesses_recorded(&self) -> u64 {
        self.inner().file_accesses_recorded.get()
    }

    pub fn finalize_outcome_count(&self, outcome: FinalizeOutcome) -> u64 {
        self.inner()
            .finalize_outcomes
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    pub fn monitor_exit_count(&self, reason: Option<MonitorExit>) -> u64 {
        self.inner()
            .monitor_exits
            .with_label_values(&[exit_label(reason)])
            .get()
    }
}

fn exit_label(reason: Option<MonitorExit>) -> &'static str {
    reason.map_or("deadline", |r| r.as_str())
}

impl RelevancyObserver for AgentMetrics {
    fn on_monitoring_started(&self, _container_id: &str) {
        self.inner().containers_monitored.inc();
    }

    fn on_monitoring_stopped(&self, _container_id: &str, reason: Option<MonitorExit>) {
        let inner = self.inner();
        inner.containers_monitored.dec();
        inner
            .monitor_exits
            .with_label_values(&[exit_label(reason)])
            .inc();
    }

    fn on_acquisition_started(&self, _container_id: &str) {
        self.inner().sbom_acquisitions.inc();
    }

    fn on_acquisition_finished(&self, _container_id: &str, success: bool) {
        if !success {
            self.inner().sbom_acquisition_failures.inc();
        }
    }

    fn on_finalize_started(&self, _container_id: &str) {
        self.inner().finalize_started.inc();
    }

    fn on_finalize_finished(&self, _container_id: &str, outcome: FinalizeOutcome, elapsed: Duration) {
        let inner = self.inner();
        inner
            .finalize_outcomes
            .with_label_values(&[outcome.as_str()])
            .inc();
        inner.finalize_latency_seconds.observe(elapsed.as_secs_f64());
    }

    fn on_file_recorded(&self) {
        self.inner().file_accesses_recorded.inc();
    }
}

/// Structured logger for agent events
///
/// Emits one `event = "..."` record per significant lifecycle event.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_monitoring_started(&self, container: &Container) {
        info!(
            event = "monitoring_started",
            node = %self.node_name,
            container_id = %container.id,
            namespace = %container.namespace,
            pod_name = %container.pod_name,
            container_name = %container.name,
            "Container monitoring started"
        );
    }

    /// `reason` is `None` when the maximum monitoring time elapsed
    pub fn log_monitoring_stopped(&self, container: &Container, reason: Option<&str>) {
        info!(
            event = "monitoring_stopped",
            node = %self.node_name,
            container_id = %container.id,
            namespace = %container.namespace,
            pod_name = %container.pod_name,
            container_name = %container.name,
            reason = reason.unwrap_or("deadline"),
            "Container monitoring stopped"
        );
    }

    pub fn log_filtered_sbom_stored(
        &self,
        container: &Container,
        image_id: &str,
        storage_key: &str,
        accessed_files: usize,
    ) {
        info!(
            event = "filtered_sbom_stored",
            node = %self.node_name,
            container_id = %container.id,
            namespace = %container.namespace,
            pod_name = %container.pod_name,
            image_id = %image_id,
            storage_key = %storage_key,
            accessed_files = accessed_files,
            "Stored filtered SBOM"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, file_store: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            file_store = %file_store,
            "Relevancy agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Relevancy agent shutting down"
        );
    }
}
