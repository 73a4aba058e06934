use std::sync::atomic::{AtomicU64, Ordering};

use handlewatch_schema::{StatusKind, StatusRecord, Target};
use tokio::sync::{Mutex, RwLock};
use tracing::error;

use crate::{debounce, KeyLocks, StatusFile, StatusSnapshot, StoreError, Transition};

/// Shared, durable map of per-target debounce state.
///
/// Both the monitoring cycle and the command surface hold the same instance.
/// Memory is authoritative: when a save fails the transition still stands and
/// the failure is logged and counted.
pub struct StatusBook {
    records: RwLock<StatusSnapshot>,
    locks: KeyLocks,
    file: StatusFile,
    save_lock: Mutex<()>,
    persist_failures: AtomicU64,
}

impl StatusBook {
    pub fn open(file: StatusFile) -> Result<Self, StoreError> {
        let records = file.load()?;
        Ok(Self {
            records: RwLock::new(records),
            locks: KeyLocks::new(),
            file,
            save_lock: Mutex::new(()),
            persist_failures: AtomicU64::new(0),
        })
    }

    pub async fn get(&self, target: &Target) -> Option<StatusRecord> {
        self.records.read().await.get(target).copied()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    /// Releases per-target lock slots that no caller holds.
    pub async fn prune_locks(&self) {
        self.locks.cleanup_unused().await;
    }

    #[cfg(test)]
    pub(crate) async fn lock_slots(&self) -> usize {
        self.locks.len().await
    }

    /// Feeds one observation through the debounce machine, persisting the
    /// snapshot whenever the stored record changes.
    pub async fn observe(&self, target: &Target, observed: StatusKind) -> Transition {
        let _guard = self.locks.acquire(target.as_str()).await;

        let current = self.get(target).await;
        let transition = debounce(current, observed);
        if transition.mutates() {
            self.records
                .write()
                .await
                .insert(target.clone(), transition.record());
            self.persist().await;
        }
        transition
    }

    async fn persist(&self) -> bool {
        // Snapshot under the save lock so an older snapshot never lands last.
        let _save = self.save_lock.lock().await;
        let snapshot = self.records.read().await.clone();
        match self.file.save(&snapshot).await {
            Ok(()) => true,
            Err(err) => {
                self.persist_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    path = %self.file.path().display(),
                    "status snapshot NOT persisted, in-memory state remains authoritative: {err}"
                );
                false
            }
        }
    }
}
