//! Relevancy manager
//!
//! One monitor task per watched container wakes up every update period and
//! queues a finalize request. A single drain task turns queued requests into
//! finalize jobs on the worker pool once the container's SBOM is ready. A
//! finalize job reduces the SBOM to the files the container accessed and
//! persists it; when that fails the accessed files are merged back into the
//! store so the next tick retries with everything recorded so far.

use super::observer::{FinalizeOutcome, NoopObserver, RelevancyObserver};
use super::pool::FinalizationPool;
use super::registry::ContainerStateRegistry;
use super::watched::{ContainerMonitor, InventoryState, MonitorSignals, WatchedContainer};
use crate::error::{AcquisitionError, MonitorExit};
use crate::filestore::{FileAccessStore, FileSet};
use crate::k8s::{resolve_container_identity, WorkloadResolver};
use crate::models::{Container, WorkloadKey};
use crate::observability::StructuredLogger;
use crate::sbom::SbomClientFactory;
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep, sleep_until, timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Configuration for the relevancy manager
#[derive(Debug, Clone)]
pub struct RelevancyConfig {
    /// Interval between finalize attempts per container (default: 60 seconds)
    pub update_data_period: Duration,
    /// Maximum time a container is monitored (default: 6 hours)
    pub max_sniffing_time: Duration,
    /// Whether ticks queue finalize jobs at all
    pub enable_relevancy: bool,
    /// Number of finalize workers
    pub finalize_workers: usize,
    /// Capacity of the pending finalize queue
    pub pending_queue_capacity: usize,
    /// Capacity of the worker pool's job queue
    pub worker_queue_capacity: usize,
    /// Bounds of the randomized delay before retrying SBOM acquisition
    pub acquisition_delay_min: Duration,
    pub acquisition_delay_max: Duration,
    /// How long a queued finalize request waits for the SBOM to be ready
    pub inventory_wait_timeout: Duration,
    pub cluster_name: String,
    pub node_name: String,
}

impl Default for RelevancyConfig {
    fn default() -> Self {
        Self {
            update_data_period: Duration::from_secs(60),
            max_sniffing_time: Duration::from_secs(6 * 60 * 60),
            enable_relevancy: true,
            finalize_workers: 4,
            pending_queue_capacity: 50,
            worker_queue_capacity: 256,
            acquisition_delay_min: Duration::from_secs(2),
            acquisition_delay_max: Duration::from_secs(10),
            inventory_wait_timeout: Duration::from_secs(30),
            cluster_name: "default".to_string(),
            node_name: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// Periodic tick: refresh the filtered SBOM used for CVE relevancy
    RelevantCves,
}

/// Request queued by a container's monitor task on every tick
#[derive(Debug, Clone)]
pub struct PendingFinalization {
    pub container_id: String,
    pub reason: FinalizeReason,
}

/// Callback into the container watcher
#[async_trait]
pub trait ContainerHandler: Send + Sync {
    /// Called once when a container's monitor loop exits
    async fn unregister_container(&self, container: &Container);
}

/// Drives per-container relevancy monitoring. Cheap to clone.
#[derive(Clone)]
pub struct RelevancyManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: RelevancyConfig,
    store: Arc<dyn FileAccessStore>,
    resolver: Arc<dyn WorkloadResolver>,
    sbom_factory: Arc<dyn SbomClientFactory>,
    observer: Arc<dyn RelevancyObserver>,
    logger: StructuredLogger,
    registry: ContainerStateRegistry,
    pool: FinalizationPool,
    pending_tx: mpsc::Sender<PendingFinalization>,
    pending_rx: Mutex<Option<mpsc::Receiver<PendingFinalization>>>,
    container_handler: RwLock<Option<Arc<dyn ContainerHandler>>>,
    cancel: CancellationToken,
    monitors: TaskTracker,
}

impl RelevancyManager {
    /// Create a manager; must be called within a tokio runtime
    pub fn new(
        config: RelevancyConfig,
        store: Arc<dyn FileAccessStore>,
        resolver: Arc<dyn WorkloadResolver>,
        sbom_factory: Arc<dyn SbomClientFactory>,
        observer: Arc<dyn RelevancyObserver>,
    ) -> Self {
        let (pending_tx, pending_rx) = mpsc::channel(config.pending_queue_capacity.max(1));
        let pool = FinalizationPool::new(config.finalize_workers, config.worker_queue_capacity);
        let logger = StructuredLogger::new(config.node_name.clone());

        Self {
            inner: Arc::new(ManagerInner {
                config,
                store,
                resolver,
                sbom_factory,
                observer,
                logger,
                registry: ContainerStateRegistry::new(),
                pool,
                pending_tx,
                pending_rx: Mutex::new(Some(pending_rx)),
                container_handler: RwLock::new(None),
                cancel: CancellationToken::new(),
                monitors: TaskTracker::new(),
            }),
        }
    }

    pub fn config(&self) -> &RelevancyConfig {
        &self.inner.config
    }

    /// Number of containers currently monitored
    pub fn watched_containers(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_watching(&self, container_id: &str) -> bool {
        self.inner.registry.contains(container_id)
    }

    /// Install the callback invoked when a container's monitoring ends
    pub fn set_container_handler(&self, handler: Arc<dyn ContainerHandler>) {
        *self
            .inner
            .container_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn container_handler(&self) -> Option<Arc<dyn ContainerHandler>> {
        self.inner
            .container_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Launch the pending action drain loop. Only the first call has an effect.
    pub fn start(&self) {
        let pending_rx = self
            .inner
            .pending_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(pending_rx) = pending_rx else {
            warn!("Relevancy manager already started");
            return;
        };

        let config = &self.inner.config;
        info!(
            enable_relevancy = config.enable_relevancy,
            update_data_period_secs = config.update_data_period.as_secs(),
            max_sniffing_time_secs = config.max_sniffing_time.as_secs(),
            finalize_workers = config.finalize_workers,
            "Starting relevancy manager"
        );

        let manager = self.clone();
        tokio::spawn(
            async move { manager.run_pending_actions(pending_rx).await }
                .instrument(info_span!("pending_actions")),
        );
    }

    /// Stop every monitor loop and the drain loop, then drain the worker pool
    pub async fn shutdown(&self) {
        info!(
            containers = ?self.inner.registry.ids(),
            "Shutting down relevancy manager"
        );
        self.inner.cancel.cancel();
        self.inner.monitors.close();
        self.inner.monitors.wait().await;
        self.inner.pool.shutdown().await;
        info!("Relevancy manager stopped");
    }

    /// Start monitoring a container; no-op if it is already monitored
    pub fn report_container_started(&self, container: Container) {
        let span = info_span!(
            "container_started",
            container_id = %container.id,
            k8s_workload = %container.workload_key()
        );
        let _enter = span.enter();

        if self.inner.cancel.is_cancelled() {
            debug!("Relevancy manager is shutting down, ignoring container");
            return;
        }

        let (watched, signals) = WatchedContainer::new(container);
        if !self.inner.registry.register(Arc::clone(&watched)) {
            debug!("Container already exists in memory");
            return;
        }

        info!("New container has loaded - start monitoring it");
        let manager = self.clone();
        self.inner.monitors.spawn(
            async move { manager.start_relevancy_process(watched, signals).await }
                .instrument(span.clone()),
        );
    }

    /// Stop monitoring a container; no-op if it is not monitored
    pub async fn report_container_terminated(&self, container: &Container) {
        let span = info_span!(
            "container_terminated",
            container_id = %container.id,
            k8s_workload = %container.workload_key()
        );

        async {
            let Some(watched) = self.inner.registry.unregister(&container.id) else {
                debug!("Container not found in memory");
                return;
            };

            if let Err(e) = self.inner.store.remove_bucket(watched.workload_key().as_str()).await {
                error!(error = %e, "Failed to remove container bucket");
            }

            if !watched.signal_terminated() {
                debug!("Termination signal already pending");
            }
        }
        .instrument(span)
        .await
    }

    /// Record a file opened inside a container
    pub async fn report_file_access(
        &self,
        namespace: &str,
        pod_name: &str,
        container_name: &str,
        path: &str,
    ) {
        if path.is_empty() {
            return;
        }

        let key = WorkloadKey::new(namespace, pod_name, container_name);
        match self.inner.store.record_file(key.as_str(), path).await {
            Ok(()) => self.inner.observer.on_file_recorded(),
            Err(e) => error!(
                k8s_workload = %key,
                path = %path,
                error = %e,
                "Failed to record file access"
            ),
        }
    }

    async fn start_relevancy_process(&self, watched: Arc<WatchedContainer>, signals: MonitorSignals) {
        self.inner.observer.on_monitoring_started(watched.id());
        self.inner.logger.log_monitoring_started(watched.container());

        let mut monitor = ContainerMonitor::new(signals, self.inner.config.update_data_period);
        let exit = self.monitor_container(&watched, &mut monitor).await.err();
        match exit {
            Some(reason) => info!(reason = %reason, "Stop monitoring container"),
            None => info!("Stop monitoring container - after monitoring time"),
        }

        if let Some(handler) = self.container_handler() {
            handler.unregister_container(watched.container()).await;
        }

        self.delete_resources(&watched, monitor, exit).await;
    }

    /// Loop until the monitoring deadline or an early exit signal.
    /// Acquisition and waiting are both bounded by the deadline.
    async fn monitor_container(
        &self,
        watched: &Arc<WatchedContainer>,
        monitor: &mut ContainerMonitor,
    ) -> Result<(), MonitorExit> {
        let deadline = Instant::now() + self.inner.config.max_sniffing_time;

        while Instant::now() < deadline {
            self.acquire_sbom(watched, deadline).await;
            self.wait_for_ticks(watched, monitor, deadline).await?;
        }
        Ok(())
    }

    async fn wait_for_ticks(
        &self,
        watched: &Arc<WatchedContainer>,
        monitor: &mut ContainerMonitor,
        deadline: Instant,
    ) -> Result<(), MonitorExit> {
        let exit = tokio::select! {
            _ = monitor.ticker.tick() => {
                if self.inner.config.enable_relevancy {
                    self.queue_finalize(watched.id());
                }
                None
            }
            Some(()) = monitor.signals.terminated.recv() => Some(MonitorExit::Terminated),
            Some(err) = monitor.signals.inventory_validated.recv() => {
                debug!(error = %err, "SBOM can never be filtered");
                Some(MonitorExit::SbomIncomplete)
            }
            _ = sleep_until(deadline) => None,
            _ = self.inner.cancel.cancelled() => Some(MonitorExit::Shutdown),
        };

        match exit {
            Some(reason) => {
                monitor.ticker.stop();
                Err(reason)
            }
            None => Ok(()),
        }
    }

    fn queue_finalize(&self, container_id: &str) {
        let action = PendingFinalization {
            container_id: container_id.to_string(),
            reason: FinalizeReason::RelevantCves,
        };

        match self.inner.pending_tx.try_send(action) {
            Ok(()) => debug!("Queued finalize request"),
            Err(TrySendError::Full(_)) => {
                warn!("Pending finalize queue is full, skipping tick")
            }
            Err(TrySendError::Closed(_)) => debug!("Pending finalize queue is closed"),
        }
    }

    /// Make sure the container has an SBOM session with a fetched inventory
    async fn acquire_sbom(&self, watched: &Arc<WatchedContainer>, deadline: Instant) {
        let span = info_span!("acquire_sbom");

        async {
            if !self.inner.registry.contains(watched.id()) {
                return;
            }
            if watched.has_inventory() {
                watched.set_inventory_state(InventoryState::Ready);
                return;
            }

            // Finalize requests queued from now on wait for this attempt
            watched.set_inventory_state(InventoryState::Pending);

            self.inner.observer.on_acquisition_started(watched.id());
            let result = match timeout_at(deadline, self.acquire_with_retry(watched)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Monitoring deadline reached during SBOM acquisition");
                    None
                }
            };
            self.inner
                .observer
                .on_acquisition_finished(watched.id(), matches!(result, Some(Ok(()))));

            match result {
                Some(Ok(())) => {
                    debug!("SBOM is ready");
                    watched.set_inventory_state(InventoryState::Ready);
                }
                Some(Err(e)) => {
                    match e {
                        AcquisitionError::IncompleteIdentity => {
                            debug!("Container identity is incomplete, skipping this cycle")
                        }
                        _ => warn!(error = %e, "Failed to get SBOM"),
                    }
                    watched.set_inventory_state(InventoryState::Unavailable(e.to_string()));
                }
                None => debug!("Container is no longer monitored, abandoning SBOM acquisition"),
            }
        }
        .instrument(span)
        .await
    }

    /// Two attempts separated by a random delay. `None` when the container
    /// went away or the manager shut down in between.
    async fn acquire_with_retry(
        &self,
        watched: &WatchedContainer,
    ) -> Option<Result<(), AcquisitionError>> {
        let first = match self.try_acquire_sbom(watched).await {
            Ok(()) => return Some(Ok(())),
            Err(e) => e,
        };

        let config = &self.inner.config;
        let delay = random_delay(config.acquisition_delay_min, config.acquisition_delay_max);
        debug!(
            error = %first,
            delay_ms = delay.as_millis() as u64,
            "SBOM not available yet, retrying after delay"
        );

        tokio::select! {
            _ = sleep(delay) => {}
            _ = self.inner.cancel.cancelled() => return None,
        }

        if !self.inner.registry.contains(watched.id()) {
            return None;
        }
        if watched.has_inventory() {
            return Some(Ok(()));
        }
        Some(self.try_acquire_sbom(watched).await)
    }

    async fn try_acquire_sbom(&self, watched: &WatchedContainer) -> Result<(), AcquisitionError> {
        let container = watched.container();
        let resolver = self.inner.resolver.as_ref();

        let pod = resolver
            .resolve_workload(&container.namespace, "Pod", &container.pod_name)
            .await?;
        let identity = resolve_container_identity(
            resolver,
            &self.inner.config.cluster_name,
            &pod,
            &container.name,
        )
        .await?
        .ok_or(AcquisitionError::IncompleteIdentity)?;

        let sbom = self
            .inner
            .sbom_factory
            .create_client(&identity.parent_wlid, &identity.instance_id);
        let fetched = sbom
            .fetch_inventory(&identity.image_tag, &identity.image_id)
            .await;

        watched.set_identity(identity);
        if let Some(previous) = watched.replace_sbom(sbom) {
            previous.release_resources();
        }

        fetched.map_err(AcquisitionError::from)
    }

    async fn run_pending_actions(&self, mut pending_rx: mpsc::Receiver<PendingFinalization>) {
        info!("Pending action loop started");

        loop {
            let action = tokio::select! {
                action = pending_rx.recv() => action,
                _ = self.inner.cancel.cancelled() => None,
            };
            let Some(action) = action else { break };
            self.process_pending_action(action).await;
        }

        info!("Pending action loop stopped");
    }

    async fn process_pending_action(&self, action: PendingFinalization) {
        let Some(watched) = self.inner.registry.get(&action.container_id) else {
            warn!(
                container_id = %action.container_id,
                "Failed to get container data, skipping pending action"
            );
            return;
        };

        if !self.inner.config.enable_relevancy {
            return;
        }

        match action.reason {
            FinalizeReason::RelevantCves => self.schedule_finalize(watched).await,
        }
    }

    async fn schedule_finalize(&self, watched: Arc<WatchedContainer>) {
        match self.wait_for_inventory(&watched).await {
            InventoryState::Ready => {}
            InventoryState::Pending => {
                debug!(container_id = %watched.id(), "Timed out waiting for SBOM");
                return;
            }
            InventoryState::Unavailable(reason) => {
                debug!(container_id = %watched.id(), reason = %reason, "SBOM unavailable, skipping finalize");
                return;
            }
        }

        if watched.sbom().is_none() {
            debug!(container_id = %watched.id(), "SBOM client not created yet");
            return;
        }

        let Some(guard) = watched.try_begin_finalize() else {
            debug!(container_id = %watched.id(), "Finalize already in flight, skipping");
            return;
        };

        let manager = self.clone();
        let job = async move {
            let _guard = guard;
            manager.run_finalize(watched).await;
        }
        .boxed();

        if let Err(e) = self.inner.pool.submit(job).await {
            warn!(error = %e, "Failed to submit finalize job");
        }
    }

    /// Wait for the result of the current acquisition attempt.
    /// Returns `Pending` on timeout.
    async fn wait_for_inventory(&self, watched: &WatchedContainer) -> InventoryState {
        let mut rx = watched.subscribe_inventory();
        let ready = rx.wait_for(|state| *state != InventoryState::Pending);

        let state = match timeout(self.inner.config.inventory_wait_timeout, ready).await {
            Ok(Ok(state)) => (*state).clone(),
            _ => InventoryState::Pending,
        };
        state
    }

    async fn run_finalize(&self, watched: Arc<WatchedContainer>) {
        let span = info_span!(
            "finalize",
            container_id = %watched.id(),
            k8s_workload = %watched.workload_key()
        );

        async {
            let started = Instant::now();
            self.inner.observer.on_finalize_started(watched.id());

            let outcome = self.handle_relevancy(&watched).await;

            self.inner
                .observer
                .on_finalize_finished(watched.id(), outcome, started.elapsed());
            debug!(outcome = outcome.as_str(), "Finalize finished");
        }
        .instrument(span)
        .await
    }

    /// Filter the container's SBOM down to its accessed files and persist it
    async fn handle_relevancy(&self, watched: &WatchedContainer) -> FinalizeOutcome {
        let Some(sbom) = watched.sbom() else {
            return FinalizeOutcome::Skipped;
        };
        let bucket = watched.workload_key().as_str();

        let files = match self.inner.store.list_files(bucket).await {
            Ok(files) => files,
            Err(e) if e.is_bucket_not_found() => {
                debug!("No file access recorded yet");
                return FinalizeOutcome::NoFiles;
            }
            Err(e) => {
                warn!(error = %e, "Failed to get file list");
                return FinalizeOutcome::Failed;
            }
        };

        if let Err(e) = sbom.validate_completeness().await {
            info!(error = %e, "SBOM is incomplete");
            if e.is_incomplete() {
                watched.signal_incomplete(e);
            }
        }

        if let Err(e) = sbom.filter_to_accessed_files(&files).await {
            warn!(error = %e, files = files.len(), "Failed to filter SBOM");
            self.merge_back(watched, &files).await;
            return FinalizeOutcome::Retry;
        }

        let Some(identity) = watched.identity() else {
            warn!("Container identity missing after SBOM was fetched");
            self.merge_back(watched, &files).await;
            return FinalizeOutcome::Retry;
        };
        let storage_key = match identity.instance_id.slug() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Failed to derive SBOM storage key");
                self.merge_back(watched, &files).await;
                return FinalizeOutcome::Retry;
            }
        };

        match sbom
            .persist_filtered_inventory(&identity.image_id, &storage_key)
            .await
        {
            Ok(()) => {
                self.inner.logger.log_filtered_sbom_stored(
                    watched.container(),
                    &identity.image_id,
                    &storage_key,
                    files.len(),
                );
                FinalizeOutcome::Stored
            }
            Err(e) if e.is_already_exists() => {
                debug!(storage_key = %storage_key, "Filtered SBOM already stored");
                FinalizeOutcome::AlreadyStored
            }
            Err(e) => {
                error!(error = %e, storage_key = %storage_key, "Failed to store filtered SBOM");
                self.merge_back(watched, &files).await;
                FinalizeOutcome::Retry
            }
        }
    }

    /// Return a file set read by a failed finalize job to the store
    async fn merge_back(&self, watched: &WatchedContainer, files: &FileSet) {
        if !self.inner.registry.contains(watched.id()) {
            debug!("Container no longer monitored, dropping file set");
            return;
        }

        if let Err(e) = self
            .inner
            .store
            .record_files(watched.workload_key().as_str(), files)
            .await
        {
            error!(error = %e, files = files.len(), "Failed to merge file set back into store");
        }
    }

    /// Teardown. Consumes the monitor, so it runs once per container.
    /// A shutdown keeps the bucket; every other exit removes it.
    async fn delete_resources(
        &self,
        watched: &Arc<WatchedContainer>,
        mut monitor: ContainerMonitor,
        reason: Option<MonitorExit>,
    ) {
        monitor.ticker.stop();

        if let Some(sbom) = watched.take_sbom() {
            sbom.release_resources();
        }

        self.inner.registry.unregister_if_same(watched);

        // The container is still running; its recorded files outlive the agent
        if matches!(reason, Some(MonitorExit::Shutdown)) {
            debug!("Keeping container bucket across shutdown");
        } else if let Err(e) = self
            .inner
            .store
            .remove_bucket(watched.workload_key().as_str())
            .await
        {
            error!(error = %e, "Failed to remove container bucket");
        }

        self.inner.observer.on_monitoring_stopped(watched.id(), reason);
        self.inner
            .logger
            .log_monitoring_stopped(watched.container(), reason.map(|r| r.as_str()));
    }
}

/// Builder for the relevancy manager
pub struct RelevancyManagerBuilder {
    store: Option<Arc<dyn FileAccessStore>>,
    resolver: Option<Arc<dyn WorkloadResolver>>,
    sbom_factory: Option<Arc<dyn SbomClientFactory>>,
    observer: Arc<dyn RelevancyObserver>,
    config: RelevancyConfig,
}

impl RelevancyManagerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            resolver: None,
            sbom_factory: None,
            observer: Arc::new(NoopObserver),
            config: RelevancyConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: RelevancyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn FileAccessStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn workload_resolver(mut self, resolver: Arc<dyn WorkloadResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn sbom_factory(mut self, factory: Arc<dyn SbomClientFactory>) -> Self {
        self.sbom_factory = Some(factory);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RelevancyObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn update_data_period(mut self, period: Duration) -> Self {
        self.config.update_data_period = period;
        self
    }

    pub fn max_sniffing_time(mut self, max: Duration) -> Self {
        self.config.max_sniffing_time = max;
        self
    }

    pub fn enable_relevancy(mut self, enabled: bool) -> Self {
        self.config.enable_relevancy = enabled;
        self
    }

    pub fn finalize_workers(mut self, workers: usize) -> Self {
        self.config.finalize_workers = workers;
        self
    }

    pub fn acquisition_delay(mut self, min: Duration, max: Duration) -> Self {
        self.config.acquisition_delay_min = min;
        self.config.acquisition_delay_max = max;
        self
    }

    pub fn inventory_wait_timeout(mut self, wait: Duration) -> Self {
        self.config.inventory_wait_timeout = wait;
        self
    }

    /// Build the manager; must be called within a tokio runtime
    pub fn build(self) -> Result<RelevancyManager> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("File access store is required"))?;
        let resolver = self
            .resolver
            .ok_or_else(|| anyhow::anyhow!("Workload resolver is required"))?;
        let sbom_factory = self
            .sbom_factory
            .ok_or_else(|| anyhow::anyhow!("SBOM client factory is required"))?;

        if self.config.update_data_period.is_zero() {
            anyhow::bail!("Update data period must be positive");
        }
        if self.config.acquisition_delay_min > self.config.acquisition_delay_max {
            anyhow::bail!("Acquisition delay minimum exceeds maximum");
        }

        Ok(RelevancyManager::new(
            self.config,
            store,
            resolver,
            sbom_factory,
            self.observer,
        ))
    }
}

impl Default for RelevancyManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Random duration in `[min, max]`
fn random_delay(min: Duration, max: Duration) -> Duration {
    let spread = max.saturating_sub(min).as_millis() as u64;
    min + Duration::from_millis(rand_jitter(spread + 1))
}

/// Generate a random value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_delay_within_bounds() {
        let min = Duration::from_secs(2);
        let max = Duration::from_secs(10);
        for _ in 0..100 {
            let delay = random_delay(min, max);
            assert!(delay >= min && delay <= max);
        }
    }

    #[test]
    fn test_random_delay_zero_spread() {
        assert_eq!(random_delay(Duration::ZERO, Duration::ZERO), Duration::ZERO);
        let fixed = Duration::from_secs(3);
        assert_eq!(random_delay(fixed, fixed), fixed);
    }

    #[test]
    fn test_rand_jitter() {
        assert!(rand_jitter(1000) < 1000);
        assert_eq!(rand_jitter(0), 0);
    }

    #[test]
    fn test_default_config() {
        let config = RelevancyConfig::default();
        assert_eq!(config.update_data_period, Duration::from_secs(60));
        assert_eq!(config.pending_queue_capacity, 50);
        assert!(config.enable_relevancy);
    }
}
