//! Client-side query cache.
//!
//! The cache maps a query key to the last known result. Writers either
//! overwrite an entry (optimistically or after a confirmed read) or mark it
//! stale so the next reader refetches it. Views observe entries through
//! [`InMemoryQueryCache::subscribe`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Port for the query cache consumed by the reconciler and task details
pub trait QueryCache<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    /// Overwrites an entry and marks it fresh
    fn set(&self, key: K, value: V);

    /// Marks an entry stale, keeping the value for display until it is refetched
    fn invalidate(&self, key: &K);

    fn is_stale(&self, key: &K) -> bool;
}

struct Entry<V> {
    sender: watch::Sender<Option<V>>,
    stale: bool,
}

impl<V> Entry<V> {
    fn empty() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender,
            stale: true,
        }
    }
}

/// Process-local cache with a watch channel per key
pub struct InMemoryQueryCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for InMemoryQueryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> InMemoryQueryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every value written under `key`, optimistic or confirmed
    pub fn subscribe(&self, key: &K) -> watch::Receiver<Option<V>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(key.clone())
            .or_insert_with(Entry::empty)
            .sender
            .subscribe()
    }

    pub fn remove(&self, key: &K) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.sender.send_replace(None);
            entry.stale = true;
        }
    }
}

impl<K, V> QueryCache<K, V> for InMemoryQueryCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).and_then(|e| e.sender.borrow().clone())
    }

    fn set(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key).or_insert_with(Entry::empty);
        entry.sender.send_replace(Some(value));
        entry.stale = false;
    }

    fn invalidate(&self, key: &K) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.stale = true;
        }
    }

    fn is_stale(&self, key: &K) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|e| e.stale).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let cache: InMemoryQueryCache<&str, u32> = InMemoryQueryCache::new();
        assert_eq!(cache.get(&"board"), None);
        assert!(cache.is_stale(&"board"));

        cache.set("board", 7);

        assert_eq!(cache.get(&"board"), Some(7));
        assert!(!cache.is_stale(&"board"));
    }

    #[test]
    fn test_invalidate_keeps_value() {
        let cache: InMemoryQueryCache<&str, u32> = InMemoryQueryCache::new();
        cache.set("board", 1);

        cache.invalidate(&"board");

        assert!(cache.is_stale(&"board"));
        assert_eq!(cache.get(&"board"), Some(1));
    }

    #[test]
    fn test_subscriber_sees_every_write() {
        let cache: InMemoryQueryCache<&str, u32> = InMemoryQueryCache::new();
        let mut rx = cache.subscribe(&"board");
        assert_eq!(*rx.borrow(), None);

        cache.set("board", 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(1));

        cache.remove(&"board");
        assert_eq!(*rx.borrow_and_update(), None);
        assert_eq!(cache.get(&"board"), None);
    }
}
