//! Instrumentation hooks around relevancy manager boundaries

use crate::error::MonitorExit;
use std::time::Duration;

/// Result of one finalize job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Filtered SBOM persisted
    Stored,
    /// Filtered SBOM was already persisted under the same key
    AlreadyStored,
    /// No file access recorded yet
    NoFiles,
    /// Filtering or persisting failed; file set merged back for the next tick
    Retry,
    /// File set could not be read
    Failed,
    /// Container had no SBOM session
    Skipped,
}

impl FinalizeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizeOutcome::Stored => "stored",
            FinalizeOutcome::AlreadyStored => "already_stored",
            FinalizeOutcome::NoFiles => "no_files",
            FinalizeOutcome::Retry => "retry",
            FinalizeOutcome::Failed => "failed",
            FinalizeOutcome::Skipped => "skipped",
        }
    }

    /// Whether finalization for the container is done
    pub fn is_complete(&self) -> bool {
        matches!(self, FinalizeOutcome::Stored | FinalizeOutcome::AlreadyStored)
    }
}

/// Hooks invoked by the relevancy manager. All methods default to no-ops.
pub trait RelevancyObserver: Send + Sync {
    fn on_monitoring_started(&self, _container_id: &str) {}

    /// `reason` is `None` when the monitoring deadline elapsed
    fn on_monitoring_stopped(&self, _container_id: &str, _reason: Option<MonitorExit>) {}

    fn on_acquisition_started(&self, _container_id: &str) {}

    fn on_acquisition_finished(&self, _container_id: &str, _success: bool) {}

    fn on_finalize_started(&self, _container_id: &str) {}

    fn on_finalize_finished(&self, _container_id: &str, _outcome: FinalizeOutcome, _elapsed: Duration) {}

    fn on_file_recorded(&self) {}
}

/// Observer that ignores every hook
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RelevancyObserver for NoopObserver {}
