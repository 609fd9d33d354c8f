//! Bounded worker pool that runs finalize jobs

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub type FinalizeJob = BoxFuture<'static, ()>;

/// Fixed number of workers pulling jobs from a bounded queue.
/// `submit` waits while the queue is full.
pub struct FinalizationPool {
    sender: Mutex<Option<mpsc::Sender<FinalizeJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl FinalizationPool {
    /// Spawns the workers on the current runtime
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<FinalizeJob>(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { break };
                        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                            error!(worker, "Finalize job panicked");
                        }
                    }
                    debug!(worker, "Finalize worker stopped");
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    pub async fn submit(&self, job: FinalizeJob) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| anyhow!("Finalization pool is closed"))?;

        sender
            .send(job)
            .await
            .map_err(|_| anyhow!("Finalization pool is closed"))
    }

    /// Stop accepting jobs, drain the queue and wait for the workers
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Finalize worker failed");
            }
        }
    }
}
