//! Per-key mutual exclusion for read-then-write sequences.
//!
//! Each target (status records) or subscriber (watchlists) gets its own lock so
//! a command and a monitoring cycle touching the same key are serialized while
//! unrelated keys proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct KeyLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Releases the key when dropped.
pub type KeyGuard = OwnedMutexGuard<()>;

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn acquire(&self, key: &str) -> KeyGuard {
        self.slot(key).await.lock_owned().await
    }

    /// Drops slots nobody holds or waits on.
    pub async fn cleanup_unused(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use handlewatch_schema::StatusKind;
    use tokio::sync::RwLock;

    const WAIT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn read_then_write_on_one_target_is_serialized() {
        // Each task reads the record, yields, then writes it back one longer.
        let locks = KeyLocks::new();
        let records: Arc<RwLock<HashMap<String, Vec<StatusKind>>>> = Arc::default();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let records = records.clone();
                tokio::spawn(async move {
                    let _guard = locks.acquire("alice").await;
                    let mut history = records
                        .read()
                        .await
                        .get("alice")
                        .cloned()
                        .unwrap_or_default();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    history.push(StatusKind::Active);
                    records.write().await.insert("alice".into(), history);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(records.read().await["alice"].len(), 8);
    }

    #[tokio::test]
    async fn held_key_blocks_only_itself() {
        let locks = KeyLocks::new();
        let _held = locks.acquire("alice").await;

        assert!(tokio::time::timeout(WAIT, locks.acquire("bob")).await.is_ok());
        assert!(tokio::time::timeout(WAIT, locks.acquire("alice")).await.is_err());
    }

    #[tokio::test]
    async fn cleanup_keeps_held_slots() {
        let locks = KeyLocks::new();
        let _held = locks.acquire("alice").await;
        drop(locks.acquire("bob").await);
        assert_eq!(locks.len().await, 2);

        locks.cleanup_unused().await;
        assert_eq!(locks.len().await, 1);
    }
}
