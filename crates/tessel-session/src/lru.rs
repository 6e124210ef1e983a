//! Recency index used to find idle sessions without scanning the session map.
//!
//! This is not a bounded cache: nothing is ever evicted by size. Entries are
//! only removed when the caller asks, typically after [`LruIndex::find_expired_items`]
//! reported them.

use std::borrow::Borrow;
use std::hash::Hash;

use lru::LruCache;
use parking_lot::Mutex;

/// Recency-ordered index. Front = least recently touched.
///
/// The index has its own lock so recency can be refreshed by callers that
/// only hold a shared lock on the structure that owns it.
pub struct LruIndex<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V> LruIndex<K, V> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
        }
    }

    /// Insert at the back, or overwrite the value and move to the back if present.
    pub fn put(&self, key: K, value: V) {
        self.entries.lock().put(key, value);
    }

    /// Like [`put`](Self::put), but the value is computed while the index is locked.
    ///
    /// Pass a clock read here so concurrent touches land in the order their
    /// timestamps were taken.
    pub fn put_with<F>(&self, key: K, value: F)
    where
        F: FnOnce() -> V,
    {
        let mut entries = self.entries.lock();
        entries.put(key, value());
    }

    /// Remove the given keys. Absent keys are ignored.
    pub fn remove<'a, Q, I>(&self, keys: I)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.pop(key);
        }
    }

    /// Collect the keys whose value satisfies `is_expired`, front to back.
    ///
    /// Every entry is evaluated; the scan does not stop at the first entry
    /// that is still live.
    pub fn find_expired_items<F>(&self, mut is_expired: F) -> Vec<K>
    where
        K: Clone,
        F: FnMut(&V) -> bool,
    {
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|(_, value)| is_expired(*value))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// All keys, front (least recent) to back.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.entries
            .lock()
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Value recorded for `key`, without changing its position.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.entries.lock().peek(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<K: Hash + Eq, V> Default for LruIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for LruIndex<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_map().entries(entries.iter().rev()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};

    fn expired_after(limit: TimeDelta) -> impl FnMut(&DateTime<Utc>) -> bool {
        move |touched| Utc::now() - *touched > limit
    }

    #[test]
    fn test_put_moves_to_back() {
        let lru = LruIndex::new();
        let t1 = Utc::now() - TimeDelta::seconds(10);
        let t2 = Utc::now() - TimeDelta::seconds(5);
        let t3 = Utc::now();

        lru.put("a", t1);
        lru.put("b", t2);
        lru.put("a", t3);

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.keys(), vec!["b", "a"]);
        assert_eq!(lru.peek("a"), Some(t3));
    }

    #[test]
    fn test_removed_key_never_reported() {
        let lru = LruIndex::new();
        let old = Utc::now() - TimeDelta::seconds(60);
        lru.put("a".to_string(), old);
        lru.put("b".to_string(), old);

        lru.remove(["a"]);

        let expired = lru.find_expired_items(expired_after(TimeDelta::seconds(5)));
        assert_eq!(expired, vec!["b".to_string()]);
        assert!(!lru.contains("a"));
    }

    #[test]
    fn test_remove_ignores_absent_keys() {
        let lru = LruIndex::new();
        lru.put("a".to_string(), 1);
        lru.remove(["missing", "a", "a"]);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_find_expired_items_scenario() {
        let lru = LruIndex::new();
        let old = Utc::now() - TimeDelta::seconds(5);

        for i in 1..=5 {
            lru.put(format!("sessionid{}", i), old);
        }
        for i in 6..=9 {
            lru.put(format!("sessionid{}", i), Utc::now());
        }
        assert_eq!(lru.len(), 9);

        lru.put("sessionid3".to_string(), Utc::now());
        lru.put("sessionid1".to_string(), Utc::now());
        lru.put("sessionid4".to_string(), Utc::now());

        let keys = lru.find_expired_items(expired_after(TimeDelta::seconds(5)));
        assert_eq!(keys, vec!["sessionid2".to_string(), "sessionid5".to_string()]);

        lru.remove(keys.iter().map(String::as_str));
        assert_eq!(lru.len(), 7);
    }

    #[test]
    fn test_scan_does_not_stop_at_first_live_entry() {
        // Values out of time order: a live entry sits in front of an expired one.
        let lru = LruIndex::new();
        lru.put("live", 1);
        lru.put("dead", 100);

        let keys = lru.find_expired_items(|v| *v > 50);
        assert_eq!(keys, vec!["dead"]);
    }

    #[test]
    fn test_concurrent_put_with_keeps_values_ordered() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU64, Ordering};

        let lru = Arc::new(LruIndex::new());
        let clock = Arc::new(AtomicU64::new(0));

        let threads: Vec<_> = (0..8)
            .map(|t| {
                let lru = lru.clone();
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for i in 0..500u64 {
                        let key: u64 = t * 1000 + i % 16;
                        lru.put_with(key, || clock.fetch_add(1, Ordering::SeqCst));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let values: Vec<u64> = lru
            .keys()
            .iter()
            .map(|k| lru.peek(k).unwrap())
            .collect();
        assert_eq!(values.len(), 8 * 16);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_clear() {
        let lru = LruIndex::new();
        lru.put(1, ());
        lru.put(2, ());
        lru.clear();
        assert!(lru.is_empty());
        assert!(lru.keys().is_empty());
    }
}
