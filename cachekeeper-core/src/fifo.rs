use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use parking_lot::Mutex;
use tracing::debug;

use crate::implementation::{
    numeric_option, parse_options, CacheImplementation, ImplementationKind, COUNT_UNSUPPORTED,
};
use crate::utils::{enforce_bound, remove_from_order, shrink_to};
use crate::CacheEntry;

/// First-in-first-out store that also counts reads per key.
///
/// Reads do not change the eviction order; the oldest written key is evicted
/// first (re-writing a key makes it the newest). Because every entry carries a
/// hit counter, [`get_count`](CacheImplementation::get_count) is supported
/// unless the store is configured with `count_hits=false`.
///
/// # Examples
///
/// ```
/// use cachekeeper_core::{CacheImplementation, FifoImplementation};
///
/// let store = FifoImplementation::new(2);
/// store.put("a", 1);
/// store.put("b", 2);
/// store.get(&"a");
/// store.get(&"a");
/// assert_eq!(store.get_count(&"a"), 2);
///
/// store.put("c", 3);
/// assert_eq!(store.get(&"a"), None);
/// ```
pub struct FifoImplementation<K, V> {
    state: Mutex<FifoState<K, V>>,
}

struct FifoState<K, V> {
    map: HashMap<K, CacheEntry<V>>,
    order: VecDeque<K>,
    max_size: usize,
    count_hits: bool,
}

impl<K, V> FifoState<K, V>
where
    K: Hash + Eq + Clone,
{
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.map.insert(key.clone(), CacheEntry::new(value));
        if previous.is_some() {
            remove_from_order(&mut self.order, &key);
        }
        self.order.push_back(key);
        enforce_bound(&mut self.map, &mut self.order, self.max_size);
        previous.map(|entry| entry.value)
    }
}

impl<K, V> FifoImplementation<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(FifoState {
                map: HashMap::new(),
                order: VecDeque::new(),
                max_size,
                count_hits: true,
            }),
        }
    }
}

impl<K, V> CacheImplementation<K, V> for FifoImplementation<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let count_hits = state.count_hits;
        state.map.get_mut(key).map(|entry| {
            if count_hits {
                entry.record_hit();
            }
            entry.value.clone()
        })
    }

    fn put(&self, key: K, value: V) -> Option<V> {
        self.state.lock().insert(key, value)
    }

    fn put_all(&self, entries: Vec<(K, V)>) {
        let mut state = self.state.lock();
        for (key, value) in entries {
            state.insert(key, value);
        }
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let removed = state.map.remove(key);
        if removed.is_some() {
            remove_from_order(&mut state.order, key);
        }
        removed.map(|entry| entry.value)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.state.lock().map.contains_key(key)
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.map.clear();
        state.order.clear();
    }

    fn size(&self) -> usize {
        self.state.lock().map.len()
    }

    fn set_max_size(&self, max_size: usize) {
        let mut state = self.state.lock();
        state.max_size = max_size;
        let FifoState { map, order, .. } = &mut *state;
        let evicted = shrink_to(map, order, max_size);
        if evicted > 0 {
            debug!(evicted, max_size, "fifo store shrunk");
        }
    }

    fn max_size(&self) -> usize {
        self.state.lock().max_size
    }

    fn get_count(&self, key: &K) -> i64 {
        let state = self.state.lock();
        if !state.count_hits {
            return COUNT_UNSUPPORTED;
        }
        state
            .map
            .get(key)
            .map_or(0, |entry| i64::try_from(entry.hits).unwrap_or(i64::MAX))
    }

    fn config(&self, options: &str) {
        for (name, value) in parse_options(options) {
            match name {
                "initial_capacity" => {
                    if let Some(capacity) = numeric_option(ImplementationKind::Fifo, name, value) {
                        let mut state = self.state.lock();
                        let additional = capacity.saturating_sub(state.map.len());
                        state.map.reserve(additional);
                        state.order.reserve(additional);
                    }
                }
                "count_hits" => match value.parse::<bool>() {
                    Ok(count_hits) => self.state.lock().count_hits = count_hits,
                    Err(_) => debug!(value, "ignoring malformed count_hits option"),
                },
                _ => debug!(option = name, "fifo store ignores unknown option"),
            }
        }
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(&K, &V)) {
        let state = self.state.lock();
        for (key, entry) in state.map.iter() {
            visit(key, &entry.value);
        }
    }

    fn kind(&self) -> ImplementationKind {
        ImplementationKind::Fifo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction_ignores_reads() {
        let store = FifoImplementation::new(2);
        store.put("k1", 1);
        store.put("k2", 2);
        store.get(&"k1");
        store.put("k3", 3);

        assert_eq!(store.get(&"k1"), None);
        assert_eq!(store.get(&"k2"), Some(2));
        assert_eq!(store.get(&"k3"), Some(3));
    }

    #[test]
    fn test_rewrite_makes_key_newest() {
        let store = FifoImplementation::new(2);
        store.put(1, "a");
        store.put(2, "b");
        assert_eq!(store.put(1, "c"), Some("a"));
        store.put(3, "d");

        assert_eq!(store.get(&2), None);
        assert_eq!(store.get(&1), Some("c"));
    }

    #[test]
    fn test_get_count_tracks_hits() {
        let store = FifoImplementation::new(4);
        store.put(7, 7);
        assert_eq!(store.get_count(&7), 0);
        store.get(&7);
        store.get(&7);
        store.get(&7);
        assert_eq!(store.get_count(&7), 3);
        assert_eq!(store.get_count(&8), 0);

        // a new write starts counting again
        store.put(7, 8);
        assert_eq!(store.get_count(&7), 0);
    }

    #[test]
    fn test_count_hits_can_be_disabled() {
        let store = FifoImplementation::new(4);
        store.config("count_hits=false");
        store.put(1, 1);
        store.get(&1);
        assert_eq!(store.get_count(&1), COUNT_UNSUPPORTED);

        store.config("count_hits=maybe");
        assert_eq!(store.get_count(&1), COUNT_UNSUPPORTED);
    }

    #[test]
    fn test_shrink_keeps_newest() {
        let store = FifoImplementation::new(10);
        for i in 0..10 {
            store.put(i, i);
        }
        store.set_max_size(3);
        assert_eq!(store.size(), 3);
        for i in 7..10 {
            assert!(store.contains_key(&i));
        }
    }
}
