use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use triplock_core::clock::Clock;
use triplock_core::models::{LockStatus, LockUpdate};
use triplock_core::store::{LockStore, StoreError};
use triplock_core::supplier::SupplierRegistry;

/// What one sweep pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub purged: u64,
    pub supplier_failures: usize,
}

/// Background convergence loop: expires overdue locks and garbage-collects
/// terminal records past the retention window. Nothing else depends on it
/// for correctness; it bounds how stale an unattended lock can get.
pub struct ExpirySweeper {
    store: Arc<dyn LockStore>,
    suppliers: SupplierRegistry,
    clock: Arc<dyn Clock>,
    interval: StdDuration,
    retention: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn LockStore>,
        suppliers: SupplierRegistry,
        clock: Arc<dyn Clock>,
        interval: StdDuration,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            suppliers,
            clock,
            interval,
            retention,
        }
    }

    /// One sweep pass: expire overdue active locks, then purge aged
    /// terminal records
    pub async fn run_once(&self) -> Result<SweepReport, StoreError> {
        let now = self.clock.now();
        let overdue = self.store.expired_active(now).await?;

        let mut report = SweepReport::default();
        for lock in &overdue {
            // Give the hold back first; the local flip happens regardless
            let supplier = self.suppliers.client_for(lock.item_type);
            if let Err(e) = supplier.release_hold(&lock.supplier_reference).await {
                warn!(lock_id = %lock.id, "Supplier release failed during sweep: {}", e);
                report.supplier_failures += 1;
            }

            let update = LockUpdate::transition_to(LockStatus::Expired, now);
            match self.store.update(lock.id, LockStatus::Active, update).await {
                Ok(Some(_)) => report.expired += 1,
                Ok(None) => {
                    debug!(lock_id = %lock.id, "Lock already terminal before sweep write");
                }
                Err(e) => {
                    error!(lock_id = %lock.id, "Failed to expire lock during sweep: {}", e);
                }
            }
        }

        let cutoff = now - self.retention;
        report.purged = self.store.purge_terminal_before(cutoff).await?;

        if report.expired > 0 || report.purged > 0 {
            info!(
                expired = report.expired,
                purged = report.purged,
                "Sweep completed"
            );
        }
        Ok(report)
    }

    /// Start the recurring sweep task; the returned handle stops it
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("Sweep pass failed: {}", e);
                        }
                    }
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            info!("Expiry sweeper stopping");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Controls a running sweeper task
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for the task to finish
    pub async fn shutdown(self) {
        // A closed channel means the task already exited; join either way
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Sweeper task join failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
