use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use handlewatch_schema::{SubscriberId, Target};
use tokio::sync::{Mutex, RwLock};
use tracing::error;

use crate::{KeyLocks, StoreError, WatchlistFile, WatchlistSnapshot};

/// Subscriber ↔ target relations. Callers pass already-normalized targets.
#[async_trait]
pub trait WatchRegistry: Send + Sync {
    async fn get_all(&self) -> WatchlistSnapshot;
    /// Returns `false` if the target was already watched.
    async fn add(&self, subscriber: &SubscriberId, target: &Target) -> bool;
    /// Returns `false` if the target was not watched.
    async fn remove(&self, subscriber: &SubscriberId, target: &Target) -> bool;
    async fn list(&self, subscriber: &SubscriberId) -> Vec<Target>;

    /// Snapshot saves that failed since startup.
    fn persist_failures(&self) -> u64 {
        0
    }
}

/// Inverts a watchlist snapshot into target → subscribers, each target once,
/// in first-seen order.
pub fn invert_watchlists(watchlists: &WatchlistSnapshot) -> Vec<(Target, Vec<SubscriberId>)> {
    let mut order: Vec<(Target, Vec<SubscriberId>)> = Vec::new();
    let mut index: HashMap<&Target, usize> = HashMap::new();

    for (subscriber, targets) in watchlists {
        for target in targets {
            match index.get(target) {
                Some(&pos) => order[pos].1.push(subscriber.clone()),
                None => {
                    index.insert(target, order.len());
                    order.push((target.clone(), vec![subscriber.clone()]));
                }
            }
        }
    }
    order
}

/// Watch registry backed by a JSON snapshot file.
pub struct JsonWatchRegistry {
    entries: RwLock<WatchlistSnapshot>,
    locks: KeyLocks,
    file: WatchlistFile,
    save_lock: Mutex<()>,
    persist_failures: AtomicU64,
}

impl JsonWatchRegistry {
    pub fn open(file: WatchlistFile) -> Result<Self, StoreError> {
        let entries = file.load()?;
        Ok(Self {
            entries: RwLock::new(entries),
            locks: KeyLocks::new(),
            file,
            save_lock: Mutex::new(()),
            persist_failures: AtomicU64::new(0),
        })
    }

    pub async fn subscriber_count(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn persist(&self) {
        let _save = self.save_lock.lock().await;
        let snapshot = self.entries.read().await.clone();
        if let Err(err) = self.file.save(&snapshot).await {
            self.persist_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                path = %self.file.path().display(),
                "watchlist snapshot NOT persisted, in-memory state remains authoritative: {err}"
            );
        }
    }
}

#[async_trait]
impl WatchRegistry for JsonWatchRegistry {
    async fn get_all(&self) -> WatchlistSnapshot {
        self.entries.read().await.clone()
    }

    async fn add(&self, subscriber: &SubscriberId, target: &Target) -> bool {
        let _guard = self.locks.acquire(subscriber.as_str()).await;
        {
            let mut entries = self.entries.write().await;
            let targets = entries.entry(subscriber.clone()).or_default();
            if targets.contains(target) {
                return false;
            }
            targets.push(target.clone());
        }
        self.persist().await;
        true
    }

    async fn remove(&self, subscriber: &SubscriberId, target: &Target) -> bool {
        let guard = self.locks.acquire(subscriber.as_str()).await;
        let emptied = {
            let mut entries = self.entries.write().await;
            let Some(targets) = entries.get_mut(subscriber) else {
                return false;
            };
            let before = targets.len();
            targets.retain(|t| t != target);
            if targets.len() == before {
                return false;
            }
            let emptied = targets.is_empty();
            if emptied {
                entries.remove(subscriber);
            }
            emptied
        };
        self.persist().await;
        drop(guard);
        if emptied {
            self.locks.cleanup_unused().await;
        }
        true
    }

    async fn list(&self, subscriber: &SubscriberId) -> Vec<Target> {
        self.entries
            .read()
            .await
            .get(subscriber)
            .cloned()
            .unwrap_or_default()
    }

    fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn target(name: &str) -> Target {
        Target::parse(name).unwrap()
    }

    fn watchlists_from<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a [&'a str])>,
    ) -> WatchlistSnapshot {
        let mut snapshot = BTreeMap::new();
        for (subscriber, names) in pairs {
            let targets = names.iter().map(|name| target(name)).collect();
            snapshot.insert(SubscriberId::new(subscriber), targets);
        }
        snapshot
    }

    #[test]
    fn invert_dedupes_shared_targets() {
        let watchlists = watchlists_from([
            ("1", &["alice", "bob"][..]),
            ("2", &["bob", "carol"][..]),
        ]);

        let inverted = invert_watchlists(&watchlists);
        let names: Vec<&str> = inverted.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(
            inverted[1].1,
            vec![SubscriberId::new("1"), SubscriberId::new("2")]
        );
    }

    #[tokio::test]
    async fn add_is_idempotent_and_persisted() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry = JsonWatchRegistry::open(WatchlistFile::new(temp.path())).unwrap();
        let chat = SubscriberId::from(42);

        assert!(registry.add(&chat, &target("alice")).await);
        assert!(!registry.add(&chat, &target("alice")).await);
        assert!(registry.add(&chat, &target("bob")).await);

        let reopened = JsonWatchRegistry::open(WatchlistFile::new(temp.path())).unwrap();
        assert_eq!(
            reopened.list(&chat).await,
            vec![target("alice"), target("bob")]
        );
    }

    #[tokio::test]
    async fn concurrent_adds_of_one_target_keep_a_single_entry() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry =
            Arc::new(JsonWatchRegistry::open(WatchlistFile::new(temp.path())).unwrap());
        let chat = SubscriberId::from(42);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let chat = chat.clone();
                tokio::spawn(async move { registry.add(&chat, &target("alice")).await })
            })
            .collect();

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() {
                added += 1;
            }
        }
        assert_eq!(added, 1);
        assert_eq!(registry.list(&chat).await, vec![target("alice")]);

        let reopened = JsonWatchRegistry::open(WatchlistFile::new(temp.path())).unwrap();
        assert_eq!(reopened.list(&chat).await, vec![target("alice")]);
    }

    #[tokio::test]
    async fn save_failure_is_counted_and_memory_kept() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("blocked.json");
        let registry = JsonWatchRegistry::open(WatchlistFile::at(&path)).unwrap();
        // A directory in place of the snapshot makes every rename fail.
        std::fs::create_dir_all(&path).unwrap();
        let chat = SubscriberId::from(42);

        assert!(registry.add(&chat, &target("alice")).await);
        assert!(registry.add(&chat, &target("bob")).await);
        assert!(registry.remove(&chat, &target("alice")).await);

        assert_eq!(WatchRegistry::persist_failures(&registry), 3);
        assert_eq!(registry.list(&chat).await, vec![target("bob")]);
    }

    #[tokio::test]
    async fn removing_the_last_target_releases_the_subscriber_lock() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry = JsonWatchRegistry::open(WatchlistFile::new(temp.path())).unwrap();
        let chat = SubscriberId::from(7);

        registry.add(&chat, &target("alice")).await;
        assert_eq!(registry.locks.len().await, 1);
        registry.remove(&chat, &target("alice")).await;
        assert_eq!(registry.locks.len().await, 0);
    }

    #[tokio::test]
    async fn remove_absent_is_noop() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry = JsonWatchRegistry::open(WatchlistFile::new(temp.path())).unwrap();
        let chat = SubscriberId::from(7);

        assert!(!registry.remove(&chat, &target("alice")).await);
        registry.add(&chat, &target("alice")).await;
        assert!(registry.remove(&chat, &target("alice")).await);
        assert!(!registry.remove(&chat, &target("alice")).await);
        assert!(registry.list(&chat).await.is_empty());
        assert_eq!(registry.subscriber_count().await, 0);
    }
}
