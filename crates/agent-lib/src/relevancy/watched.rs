//! Per-container watch state and the signals that drive its monitor task

use crate::error::SbomError;
use crate::models::{Container, ContainerIdentity, WorkloadKey};
use crate::sbom::SbomClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

const SIGNAL_CAPACITY: usize = 10;

/// Whether a container's inventory can be used by finalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryState {
    /// No acquisition attempt has finished yet
    Pending,
    Ready,
    /// Last acquisition attempt failed
    Unavailable(String),
}

/// Shared state of one watched container.
///
/// The receiving ends of its signals are owned by the monitor task
/// (`MonitorSignals`), so they are never shared.
pub struct WatchedContainer {
    container: Container,
    workload_key: WorkloadKey,
    identity: RwLock<Option<ContainerIdentity>>,
    sbom: RwLock<Option<Arc<dyn SbomClient>>>,
    inventory_state: watch::Sender<InventoryState>,
    terminated: mpsc::Sender<()>,
    inventory_validated: mpsc::Sender<SbomError>,
    finalize_in_flight: AtomicBool,
}

/// Receiving ends of a watched container's signals
pub(crate) struct MonitorSignals {
    pub terminated: mpsc::Receiver<()>,
    pub inventory_validated: mpsc::Receiver<SbomError>,
}

impl WatchedContainer {
    pub(crate) fn new(container: Container) -> (Arc<Self>, MonitorSignals) {
        let (terminated_tx, terminated_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (validated_tx, validated_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (state_tx, _) = watch::channel(InventoryState::Pending);

        let watched = Arc::new(Self {
            workload_key: container.workload_key(),
            container,
            identity: RwLock::new(None),
            sbom: RwLock::new(None),
            inventory_state: state_tx,
            terminated: terminated_tx,
            inventory_validated: validated_tx,
            finalize_in_flight: AtomicBool::new(false),
        });

        let signals = MonitorSignals {
            terminated: terminated_rx,
            inventory_validated: validated_rx,
        };
        (watched, signals)
    }

    pub fn id(&self) -> &str {
        &self.container.id
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn workload_key(&self) -> &WorkloadKey {
        &self.workload_key
    }

    pub fn identity(&self) -> Option<ContainerIdentity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_identity(&self, identity: ContainerIdentity) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    pub fn sbom(&self) -> Option<Arc<dyn SbomClient>> {
        self.sbom.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Attach a new SBOM session, returning the one it replaces
    pub(crate) fn replace_sbom(&self, client: Arc<dyn SbomClient>) -> Option<Arc<dyn SbomClient>> {
        self.sbom
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(client)
    }

    pub(crate) fn take_sbom(&self) -> Option<Arc<dyn SbomClient>> {
        self.sbom.write().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Whether an SBOM session exists and has fetched its inventory
    pub fn has_inventory(&self) -> bool {
        self.sbom().is_some_and(|sbom| sbom.is_inventory_present())
    }

    pub fn inventory_state(&self) -> InventoryState {
        self.inventory_state.borrow().clone()
    }

    pub(crate) fn set_inventory_state(&self, state: InventoryState) {
        self.inventory_state.send_replace(state);
    }

    pub(crate) fn subscribe_inventory(&self) -> watch::Receiver<InventoryState> {
        self.inventory_state.subscribe()
    }

    /// Non-blocking; a full signal buffer drops the signal
    pub(crate) fn signal_terminated(&self) -> bool {
        self.terminated.try_send(()).is_ok()
    }

    /// Non-blocking; a full signal buffer drops the signal
    pub(crate) fn signal_incomplete(&self, err: SbomError) -> bool {
        self.inventory_validated.try_send(err).is_ok()
    }

    /// Claim the container's single finalize slot.
    /// The slot is released when the returned guard drops.
    ///
    /// The slot belongs to this container instance while the bucket belongs
    /// to its workload key. Two live instances of one slot (a restart whose
    /// termination was never reported) can finalize the same bucket at once;
    /// merge-back is a union, so no recorded path is lost.
    pub(crate) fn try_begin_finalize(self: &Arc<Self>) -> Option<FinalizeGuard> {
        self.finalize_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FinalizeGuard(Arc::clone(self)))
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalize_in_flight.load(Ordering::Acquire)
    }
}

pub(crate) struct FinalizeGuard(Arc<WatchedContainer>);

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        self.0.finalize_in_flight.store(false, Ordering::Release);
    }
}

/// Periodic timer of one monitor task
pub(crate) struct Ticker(Option<Interval>);

impl Ticker {
    /// First tick fires one full period after start
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self(Some(interval))
    }

    /// Wait for the next tick; never resolves once the timer is stopped
    pub async fn tick(&mut self) {
        match self.0.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Returns `false` if the timer was already stopped
    pub fn stop(&mut self) -> bool {
        self.0.take().is_some()
    }
}

/// State owned by a container's monitor task
pub(crate) struct ContainerMonitor {
    pub ticker: Ticker,
    pub signals: MonitorSignals,
}

impl ContainerMonitor {
    pub fn new(signals: MonitorSignals, period: Duration) -> Self {
        Self {
            ticker: Ticker::new(period),
            signals,
        }
    }
}
