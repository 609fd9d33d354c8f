//! Runtime relevancy of container SBOMs
//!
//! Watches containers from start to termination (or a maximum monitoring
//! time), and periodically reduces each container's SBOM to the files it
//! actually accessed.

mod manager;
mod observer;
mod pool;
mod registry;
mod watched;

#[cfg(test)]
mod tests;

pub use manager::{
    ContainerHandler, FinalizeReason, PendingFinalization, RelevancyConfig, RelevancyManager,
    RelevancyManagerBuilder,
};
pub use observer::{FinalizeOutcome, NoopObserver, RelevancyObserver};
pub use pool::{FinalizationPool, FinalizeJob};
pub use registry::ContainerStateRegistry;
pub use watched::{InventoryState, WatchedContainer};
