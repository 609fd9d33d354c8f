//! Tests for the relevancy manager

use super::*;
use crate::error::{K8sError, MonitorExit, SbomError, StoreError};
use crate::filestore::{FileAccessStore, FileSet, InMemoryFileStore};
use crate::k8s::{ContainerSpec, ContainerStatus, OwnerReference, Workload, WorkloadResolver};
use crate::models::{Container, InstanceId};
use crate::sbom::{SbomClient, SbomClientFactory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

const STORAGE_KEY: &str = "replicaset-nginx-7d9f-nginx";

/// Resolves every pod as a replica of the `nginx` deployment
struct MockResolver {
    available: AtomicBool,
    latency: Mutex<Duration>,
    calls: AtomicUsize,
}

impl MockResolver {
    fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            latency: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WorkloadResolver for MockResolver {
    async fn resolve_workload(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<Workload, K8sError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            sleep(latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(K8sError::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        let mut workload = Workload {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            ..Default::default()
        };
        if kind == "Pod" {
            workload.owner_references = vec![OwnerReference {
                kind: "ReplicaSet".to_string(),
                name: "nginx-7d9f".to_string(),
                controller: true,
            }];
            workload.containers = vec![ContainerSpec {
                name: "nginx".to_string(),
                image: "nginx:1.25".to_string(),
            }];
            workload.container_statuses = vec![ContainerStatus {
                name: "nginx".to_string(),
                image_id: "docker.io/library/nginx@sha256:abc".to_string(),
            }];
        }
        Ok(workload)
    }

    async fn resolve_parent_workload(&self, _pod: &Workload) -> Result<(String, String), K8sError> {
        Ok(("Deployment".to_string(), "nginx".to_string()))
    }
}

/// Behaviour shared by every client a `MockSbomFactory` creates
#[derive(Default)]
struct SbomBehaviour {
    filter_failures: AtomicUsize,
    persist_failures: AtomicUsize,
    incomplete: AtomicBool,
    filter_delay: Mutex<Duration>,
    persisted: Mutex<HashMap<String, FileSet>>,
    clients_created: AtomicUsize,
    released: AtomicUsize,
}

impl SbomBehaviour {
    fn persisted(&self, key: &str) -> Option<FileSet> {
        self.persisted.lock().unwrap().get(key).cloned()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

struct MockSbomFactory(Arc<SbomBehaviour>);

impl SbomClientFactory for MockSbomFactory {
    fn create_client(&self, _parent_wlid: &str, _instance_id: &InstanceId) -> Arc<dyn SbomClient> {
        self.0.clients_created.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockSbomClient {
            behaviour: self.0.clone(),
            fetched: AtomicBool::new(false),
            filtered: Mutex::new(None),
        })
    }
}

struct MockSbomClient {
    behaviour: Arc<SbomBehaviour>,
    fetched: AtomicBool,
    filtered: Mutex<Option<FileSet>>,
}

#[async_trait]
impl SbomClient for MockSbomClient {
    fn is_inventory_present(&self) -> bool {
        self.fetched.load(Ordering::SeqCst)
    }

    async fn fetch_inventory(&self, _image_tag: &str, _image_id: &str) -> Result<(), SbomError> {
        self.fetched.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn validate_completeness(&self) -> Result<(), SbomError> {
        if self.behaviour.incomplete.load(Ordering::SeqCst) {
            return Err(SbomError::Incomplete("sha256:abc".to_string()));
        }
        Ok(())
    }

    async fn filter_to_accessed_files(&self, files: &FileSet) -> Result<(), SbomError> {
        let delay = *self.behaviour.filter_delay.lock().unwrap();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if take_one(&self.behaviour.filter_failures) {
            return Err(SbomError::Other("filter failed".to_string()));
        }
        *self.filtered.lock().unwrap() = Some(files.clone());
        Ok(())
    }

    async fn persist_filtered_inventory(
        &self,
        _image_id: &str,
        storage_key: &str,
    ) -> Result<(), SbomError> {
        if take_one(&self.behaviour.persist_failures) {
            return Err(SbomError::Other("storage unavailable".to_string()));
        }

        let mut persisted = self.behaviour.persisted.lock().unwrap();
        if persisted.contains_key(storage_key) {
            return Err(SbomError::AlreadyExists(storage_key.to_string()));
        }
        let files = self.filtered.lock().unwrap().clone().unwrap_or_default();
        persisted.insert(storage_key.to_string(), files);
        Ok(())
    }

    fn release_resources(&self) {
        self.behaviour.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingObserver {
    started: AtomicUsize,
    stopped: Mutex<Vec<(String, Option<MonitorExit>)>>,
    outcomes: Mutex<Vec<(String, FinalizeOutcome)>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: AtomicUsize,
    finalize_started: AtomicUsize,
}

impl RecordingObserver {
    fn stopped(&self) -> Vec<(String, Option<MonitorExit>)> {
        self.stopped.lock().unwrap().clone()
    }

    fn outcomes_for(&self, container_id: &str) -> Vec<FinalizeOutcome> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == container_id)
            .map(|(_, outcome)| *outcome)
            .collect()
    }
}

impl RelevancyObserver for RecordingObserver {
    fn on_monitoring_started(&self, _container_id: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_monitoring_stopped(&self, container_id: &str, reason: Option<MonitorExit>) {
        self.stopped
            .lock()
            .unwrap()
            .push((container_id.to_string(), reason));
    }

    fn on_finalize_started(&self, container_id: &str) {
        self.finalize_started.fetch_add(1, Ordering::SeqCst);
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(container_id.to_string()).or_default();
        *count += 1;
        self.max_in_flight.fetch_max(*count, Ordering::SeqCst);
    }

    fn on_finalize_finished(&self, container_id: &str, outcome: FinalizeOutcome, _elapsed: Duration) {
        if let Some(count) = self.in_flight.lock().unwrap().get_mut(container_id) {
            *count -= 1;
        }
        self.outcomes
            .lock()
            .unwrap()
            .push((container_id.to_string(), outcome));
    }
}

/// In-memory store that counts bucket removals and merges
#[derive(Default)]
struct CountingStore {
    inner: InMemoryFileStore,
    removals: Mutex<HashMap<String, usize>>,
    merges: AtomicUsize,
}

impl CountingStore {
    fn removals(&self, bucket: &str) -> usize {
        self.removals
            .lock()
            .unwrap()
            .get(bucket)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl FileAccessStore for CountingStore {
    async fn record_file(&self, bucket: &str, path: &str) -> Result<(), StoreError> {
        self.inner.record_file(bucket, path).await
    }

    async fn record_files(&self, bucket: &str, paths: &FileSet) -> Result<(), StoreError> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        self.inner.record_files(bucket, paths).await
    }

    async fn list_files(&self, bucket: &str) -> Result<FileSet, StoreError> {
        self.inner.list_files(bucket).await
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        *self
            .removals
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default() += 1;
        self.inner.remove_bucket(bucket).await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

#[derive(Default)]
struct RecordingHandler {
    unregistered: Mutex<Vec<String>>,
}

#[async_trait]
impl ContainerHandler for RecordingHandler {
    async fn unregister_container(&self, container: &Container) {
        self.unregistered.lock().unwrap().push(container.id.clone());
    }
}

struct Harness {
    manager: RelevancyManager,
    store: Arc<CountingStore>,
    resolver: Arc<MockResolver>,
    sbom: Arc<SbomBehaviour>,
    observer: Arc<RecordingObserver>,
    handler: Arc<RecordingHandler>,
}

fn test_config() -> RelevancyConfig {
    RelevancyConfig {
        update_data_period: Duration::from_secs(1),
        max_sniffing_time: Duration::from_secs(10),
        finalize_workers: 2,
        worker_queue_capacity: 16,
        acquisition_delay_min: Duration::from_millis(100),
        acquisition_delay_max: Duration::from_millis(200),
        inventory_wait_timeout: Duration::from_millis(500),
        cluster_name: "test-cluster".to_string(),
        ..Default::default()
    }
}

fn harness(config: RelevancyConfig, resolver_available: bool) -> Harness {
    let store = Arc::new(CountingStore::default());
    let resolver = Arc::new(MockResolver::new(resolver_available));
    let sbom = Arc::new(SbomBehaviour::default());
    let observer = Arc::new(RecordingObserver::default());
    let handler = Arc::new(RecordingHandler::default());

    let manager = RelevancyManagerBuilder::new()
        .config(config)
        .store(store.clone())
        .workload_resolver(resolver.clone())
        .sbom_factory(Arc::new(MockSbomFactory(sbom.clone())))
        .observer(observer.clone())
        .build()
        .unwrap();
    manager.set_container_handler(handler.clone());
    manager.start();

    Harness {
        manager,
        store,
        resolver,
        sbom,
        observer,
        handler,
    }
}

fn nginx_container(id: &str, pod_name: &str) -> Container {
    Container::new(id, "default", pod_name, "nginx")
}

async fn record(manager: &RelevancyManager, pod_name: &str, paths: &[&str]) {
    for path in paths {
        manager
            .report_file_access("default", pod_name, "nginx", path)
            .await;
    }
}

fn file_set(paths: &[&str]) -> FileSet {
    paths.iter().map(|p| p.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_container_registered_once() {
    let h = harness(test_config(), true);
    let container = nginx_container("c1", "nginx-7d9f-aaaaa");

    h.manager.report_container_started(container.clone());
    h.manager.report_container_started(container);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(h.manager.watched_containers(), 1);
    assert_eq!(h.observer.started.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_file_accesses_recorded_under_workload_key() {
    let h = harness(test_config(), true);

    record(
        &h.manager,
        "nginx-7d9f-aaaaa",
        &["/usr/bin/nginx", "/etc/nginx/nginx.conf", "/usr/bin/nginx", ""],
    )
    .await;

    let files = h
        .store
        .list_files("default/nginx-7d9f-aaaaa/nginx")
        .await
        .unwrap();
    assert_eq!(files, file_set(&["/usr/bin/nginx", "/etc/nginx/nginx.conf"]));
}

#[tokio::test(start_paused = true)]
async fn test_empty_path_creates_no_bucket() {
    let h = harness(test_config(), true);

    record(&h.manager, "nginx-7d9f-aaaaa", &[""]).await;

    let err = h
        .store
        .list_files("default/nginx-7d9f-aaaaa/nginx")
        .await
        .unwrap_err();
    assert!(err.is_bucket_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_finalize_stores_filtered_sbom() {
    let h = harness(test_config(), true);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    record(
        &h.manager,
        "nginx-7d9f-aaaaa",
        &["/usr/bin/nginx", "/etc/nginx/nginx.conf"],
    )
    .await;

    sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.observer.outcomes_for("c1"), vec![FinalizeOutcome::Stored]);
    assert_eq!(
        h.sbom.persisted(STORAGE_KEY).unwrap(),
        file_set(&["/usr/bin/nginx", "/etc/nginx/nginx.conf"])
    );

    // Later ticks find the filtered SBOM already stored
    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        h.observer.outcomes_for("c1"),
        vec![FinalizeOutcome::Stored, FinalizeOutcome::AlreadyStored]
    );
    assert_eq!(h.sbom.clients_created.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_finalize_merges_files_back() {
    let h = harness(test_config(), true);
    h.sbom.filter_failures.store(1, Ordering::SeqCst);
    h.sbom.persist_failures.store(1, Ordering::SeqCst);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx", "/lib/libc.so.6"]).await;

    // Filter failure at the first tick
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.observer.outcomes_for("c1"), vec![FinalizeOutcome::Retry]);
    assert_eq!(h.store.merges.load(Ordering::SeqCst), 1);

    record(&h.manager, "nginx-7d9f-aaaaa", &["/etc/nginx/nginx.conf"]).await;

    // Persist failure at the second tick
    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.merges.load(Ordering::SeqCst), 2);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        h.observer.outcomes_for("c1"),
        vec![
            FinalizeOutcome::Retry,
            FinalizeOutcome::Retry,
            FinalizeOutcome::Stored
        ]
    );
    assert_eq!(
        h.sbom.persisted(STORAGE_KEY).unwrap(),
        file_set(&["/usr/bin/nginx", "/lib/libc.so.6", "/etc/nginx/nginx.conf"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_replicas_sharing_storage_key() {
    let h = harness(test_config(), true);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    h.manager
        .report_container_started(nginx_container("c2", "nginx-7d9f-bbbbb"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx"]).await;
    record(&h.manager, "nginx-7d9f-bbbbb", &["/usr/bin/nginx"]).await;

    sleep(Duration::from_millis(1500)).await;

    let mut outcomes = h.observer.outcomes_for("c1");
    outcomes.extend(h.observer.outcomes_for("c2"));
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.contains(&FinalizeOutcome::Stored));
    assert!(outcomes.contains(&FinalizeOutcome::AlreadyStored));
    assert_eq!(h.store.merges.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_single_finalize_in_flight_per_container() {
    let h = harness(test_config(), true);
    *h.sbom.filter_delay.lock().unwrap() = Duration::from_millis(3500);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx"]).await;

    // Job started at 1s runs until 4.5s; ticks at 2s, 3s and 4s are skipped
    sleep(Duration::from_millis(6500)).await;

    assert_eq!(h.observer.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.observer.finalize_started.load(Ordering::SeqCst), 2);
}

async fn run_until_deadline_without_sbom(enable_relevancy: bool) {
    let config = RelevancyConfig {
        enable_relevancy,
        ..test_config()
    };
    let h = harness(config, false);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx"]).await;

    sleep(Duration::from_secs(5)).await;
    assert!(h.manager.is_watching("c1"));

    sleep(Duration::from_secs(6)).await;

    assert!(!h.manager.is_watching("c1"));
    assert_eq!(h.observer.stopped(), vec![("c1".to_string(), None)]);
    assert_eq!(h.store.removals("default/nginx-7d9f-aaaaa/nginx"), 1);
    assert_eq!(*h.handler.unregistered.lock().unwrap(), vec!["c1".to_string()]);
    assert_eq!(h.observer.finalize_started.load(Ordering::SeqCst), 0);
    assert_eq!(h.sbom.clients_created.load(Ordering::SeqCst), 0);
    assert!(h.resolver.calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_container_torn_down_at_deadline() {
    run_until_deadline_without_sbom(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_relevancy_disabled_still_torn_down_at_deadline() {
    run_until_deadline_without_sbom(false).await;
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_sbom_acquisition() {
    let config = RelevancyConfig {
        max_sniffing_time: Duration::from_secs(1),
        acquisition_delay_min: Duration::from_secs(5),
        acquisition_delay_max: Duration::from_secs(5),
        enable_relevancy: false,
        ..test_config()
    };
    let h = harness(config, false);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    sleep(Duration::from_millis(900)).await;
    assert!(h.manager.is_watching("c1"));

    // Teardown happens at the deadline, not after the 5s retry delay
    sleep(Duration::from_millis(200)).await;
    assert!(!h.manager.is_watching("c1"));
    assert_eq!(h.observer.stopped(), vec![("c1".to_string(), None)]);
    assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_finalize_waits_for_current_acquisition() {
    let h = harness(test_config(), false);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx"]).await;

    // Both attempts of the first cycle fail
    sleep(Duration::from_millis(500)).await;
    assert_eq!(h.sbom.clients_created.load(Ordering::SeqCst), 0);

    // The cycle after the first tick succeeds after two 200ms lookups
    *h.resolver.latency.lock().unwrap() = Duration::from_millis(200);
    h.resolver.available.store(true, Ordering::SeqCst);

    sleep(Duration::from_millis(1400)).await;
    assert_eq!(h.observer.outcomes_for("c1"), vec![FinalizeOutcome::Stored]);
    assert_eq!(
        h.sbom.persisted(STORAGE_KEY).unwrap(),
        file_set(&["/usr/bin/nginx"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_instances_sharing_workload_key_keep_recorded_files() {
    let h = harness(test_config(), true);
    h.sbom.filter_failures.store(1, Ordering::SeqCst);

    // A restart whose termination was never reported
    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    h.manager
        .report_container_started(nginx_container("c1-restart", "nginx-7d9f-aaaaa"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx", "/lib/libc.so.6"]).await;

    sleep(Duration::from_millis(1500)).await;

    let mut outcomes = h.observer.outcomes_for("c1");
    outcomes.extend(h.observer.outcomes_for("c1-restart"));
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.contains(&FinalizeOutcome::Retry));
    assert!(outcomes.contains(&FinalizeOutcome::Stored));
    assert_eq!(
        h.store
            .list_files("default/nginx-7d9f-aaaaa/nginx")
            .await
            .unwrap(),
        file_set(&["/usr/bin/nginx", "/lib/libc.so.6"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_termination_tears_down_once() {
    let h = harness(test_config(), true);
    let container = nginx_container("c1", "nginx-7d9f-aaaaa");

    h.manager.report_container_started(container.clone());
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx"]).await;
    sleep(Duration::from_millis(500)).await;

    h.manager.report_container_terminated(&container).await;
    h.manager.report_container_terminated(&container).await;
    sleep(Duration::from_millis(100)).await;

    assert!(!h.manager.is_watching("c1"));
    assert_eq!(
        h.observer.stopped(),
        vec![("c1".to_string(), Some(MonitorExit::Terminated))]
    );
    assert_eq!(*h.handler.unregistered.lock().unwrap(), vec!["c1".to_string()]);
    assert_eq!(h.sbom.released.load(Ordering::SeqCst), 1);
    assert!(h
        .store
        .list_files("default/nginx-7d9f-aaaaa/nginx")
        .await
        .unwrap_err()
        .is_bucket_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_terminate_unknown_container_is_noop() {
    let h = harness(test_config(), true);

    h.manager
        .report_container_terminated(&nginx_container("missing", "nginx-7d9f-aaaaa"))
        .await;

    assert_eq!(h.store.removals("default/nginx-7d9f-aaaaa/nginx"), 0);
    assert!(h.observer.stopped().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_sbom_stops_monitoring() {
    let h = harness(test_config(), true);
    h.sbom.incomplete.store(true, Ordering::SeqCst);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx"]).await;

    sleep(Duration::from_millis(1500)).await;

    assert!(!h.manager.is_watching("c1"));
    assert_eq!(
        h.observer.stopped(),
        vec![("c1".to_string(), Some(MonitorExit::SbomIncomplete))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_init_container_gets_no_sbom() {
    let h = harness(test_config(), true);

    h.manager
        .report_container_started(Container::new("c1", "default", "nginx-7d9f-aaaaa", "init-perms"));
    sleep(Duration::from_millis(1500)).await;

    assert!(h.manager.is_watching("c1"));
    assert_eq!(h.sbom.clients_created.load(Ordering::SeqCst), 0);
    assert_eq!(h.observer.finalize_started.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_restarted_container_monitored_again() {
    let h = harness(test_config(), true);
    let first = nginx_container("c1", "nginx-7d9f-aaaaa");

    h.manager.report_container_started(first.clone());
    sleep(Duration::from_millis(100)).await;
    h.manager.report_container_terminated(&first).await;
    sleep(Duration::from_millis(100)).await;

    h.manager
        .report_container_started(nginx_container("c1-restart", "nginx-7d9f-aaaaa"));
    sleep(Duration::from_millis(100)).await;

    assert!(!h.manager.is_watching("c1"));
    assert!(h.manager.is_watching("c1-restart"));
    assert_eq!(h.observer.started.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_monitors() {
    let h = harness(test_config(), true);

    h.manager
        .report_container_started(nginx_container("c1", "nginx-7d9f-aaaaa"));
    h.manager
        .report_container_started(nginx_container("c2", "nginx-7d9f-bbbbb"));
    record(&h.manager, "nginx-7d9f-aaaaa", &["/usr/bin/nginx"]).await;
    sleep(Duration::from_millis(500)).await;

    h.manager.shutdown().await;

    // Running containers keep their recorded files across an agent restart
    assert_eq!(h.store.removals("default/nginx-7d9f-aaaaa/nginx"), 0);
    assert_eq!(h.store.removals("default/nginx-7d9f-bbbbb/nginx"), 0);
    assert_eq!(
        h.store
            .list_files("default/nginx-7d9f-aaaaa/nginx")
            .await
            .unwrap(),
        file_set(&["/usr/bin/nginx"])
    );
    assert_eq!(h.sbom.released.load(Ordering::SeqCst), 2);

    assert_eq!(h.manager.watched_containers(), 0);
    let stopped = h.observer.stopped();
    assert_eq!(stopped.len(), 2);
    assert!(stopped
        .iter()
        .all(|(_, reason)| *reason == Some(MonitorExit::Shutdown)));
    assert_eq!(h.handler.unregistered.lock().unwrap().len(), 2);

    h.manager
        .report_container_started(nginx_container("c3", "nginx-7d9f-ccccc"));
    assert!(!h.manager.is_watching("c3"));
}

#[tokio::test]
async fn test_builder_requires_collaborators() {
    let result = RelevancyManagerBuilder::new()
        .workload_resolver(Arc::new(MockResolver::new(true)))
        .build();
    assert!(result.is_err());

    let result = RelevancyManagerBuilder::new()
        .store(Arc::new(InMemoryFileStore::new()))
        .workload_resolver(Arc::new(MockResolver::new(true)))
        .sbom_factory(Arc::new(MockSbomFactory(Arc::default())))
        .acquisition_delay(Duration::from_secs(5), Duration::from_secs(1))
        .build();
    assert!(result.is_err());

    let result = RelevancyManagerBuilder::new()
        .store(Arc::new(InMemoryFileStore::new()))
        .workload_resolver(Arc::new(MockResolver::new(true)))
        .sbom_factory(Arc::new(MockSbomFactory(Arc::default())))
        .update_data_period(Duration::from_secs(5))
        .build();
    assert!(result.is_ok());
}
