use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use parking_lot::Mutex;
use tracing::debug;

use crate::implementation::{numeric_option, parse_options, CacheImplementation, ImplementationKind};
use crate::utils::{enforce_bound, move_key_to_end, remove_from_order, shrink_to};

/// Least-recently-used store, the default backing store of every cache.
///
/// Entries live in a `HashMap`; a `VecDeque` keeps the keys in access order
/// with the least recently used key at the front. Every successful `get` or
/// `put` moves its key to the back, and an insertion past the bound evicts from
/// the front.
///
/// The map and the queue sit behind one `parking_lot::Mutex`, so recency
/// updates never interleave with iteration or eviction.
///
/// `get_count` is not supported and always returns `-1`.
///
/// # Examples
///
/// ```
/// use cachekeeper_core::{CacheImplementation, LruImplementation};
///
/// let store = LruImplementation::new(2);
/// store.put("a", 1);
/// store.put("b", 2);
/// store.get(&"a");
/// store.put("c", 3);
///
/// assert_eq!(store.get(&"b"), None);
/// assert_eq!(store.get(&"a"), Some(1));
/// assert_eq!(store.get(&"c"), Some(3));
/// ```
pub struct LruImplementation<K, V> {
    state: Mutex<LruState<K, V>>,
}

struct LruState<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
    max_size: usize,
}

impl<K, V> LruState<K, V>
where
    K: Hash + Eq + Clone,
{
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.map.insert(key.clone(), value);
        if previous.is_some() {
            move_key_to_end(&mut self.order, &key);
        } else {
            self.order.push_back(key);
        }
        enforce_bound(&mut self.map, &mut self.order, self.max_size);
        previous
    }
}

impl<K, V> LruImplementation<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(LruState {
                map: HashMap::new(),
                order: VecDeque::new(),
                max_size,
            }),
        }
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.state.lock().order.iter().cloned().collect()
    }
}

impl<K, V> CacheImplementation<K, V> for LruImplementation<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let value = state.map.get(key).cloned();
        if value.is_some() {
            move_key_to_end(&mut state.order, key);
        }
        value
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
        removed
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
        let LruState { map, order, .. } = &mut *state;
        let evicted = shrink_to(map, order, max_size);
        if evicted > 0 {
            debug!(evicted, max_size, "lru store shrunk");
        }
    }

    fn max_size(&self) -> usize {
        self.state.lock().max_size
    }

    fn config(&self, options: &str) {
        for (name, value) in parse_options(options) {
            match name {
                "initial_capacity" => {
                    if let Some(capacity) = numeric_option(ImplementationKind::Lru, name, value) {
                        let mut state = self.state.lock();
                        let additional = capacity.saturating_sub(state.map.len());
                        state.map.reserve(additional);
                        state.order.reserve(additional);
                    }
                }
                _ => debug!(option = name, "lru store ignores unknown option"),
            }
        }
    }

    fn for_each_entry(&self, visit: &mut dyn FnMut(&K, &V)) {
        let state = self.state.lock();
        for (key, value) in state.map.iter() {
            visit(key, value);
        }
    }

    fn kind(&self) -> ImplementationKind {
        ImplementationKind::Lru
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implementation::COUNT_UNSUPPORTED;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_put_get() {
        let store = LruImplementation::new(10);
        assert_eq!(store.put("key1".to_string(), 100), None);
        assert_eq!(store.get(&"key1".to_string()), Some(100));
        assert_eq!(store.put("key1".to_string(), 200), Some(100));
        assert_eq!(store.get(&"key1".to_string()), Some(200));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_lru_eviction_order() {
        let store = LruImplementation::new(3);
        store.put("a", 1);
        store.put("b", 2);
        store.put("c", 3);
        store.get(&"a");
        store.put("d", 4);

        assert!(!store.contains_key(&"b"));
        assert_eq!(store.keys_by_recency(), vec!["c", "a", "d"]);
    }

    #[test]
    fn test_put_refreshes_recency() {
        let store = LruImplementation::new(2);
        store.put(1, "one");
        store.put(2, "two");
        store.put(1, "uno");
        store.put(3, "three");

        assert_eq!(store.get(&1), Some("uno"));
        assert_eq!(store.get(&2), None);
    }

    #[test]
    fn test_miss_does_not_change_order() {
        let store = LruImplementation::new(2);
        store.put(1, 1);
        store.put(2, 2);
        assert_eq!(store.get(&9), None);
        assert_eq!(store.keys_by_recency(), vec![1, 2]);
    }

    #[test]
    fn test_shrink_keeps_most_recent() {
        let store = LruImplementation::new(5);
        for i in 0..5 {
            store.put(i, i);
        }
        store.get(&0);
        store.set_max_size(2);

        assert_eq!(store.size(), 2);
        assert_eq!(store.max_size(), 2);
        assert_eq!(store.keys_by_recency(), vec![4, 0]);
    }

    #[test]
    fn test_zero_bound_holds_nothing() {
        let store = LruImplementation::new(0);
        store.put("k", 1);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_put_all_respects_bound() {
        let store = LruImplementation::new(3);
        store.put_all((0..20).map(|i| (i, i)).collect());
        assert_eq!(store.size(), 3);
        assert_eq!(store.keys_by_recency(), vec![17, 18, 19]);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = LruImplementation::new(3);
        store.put(1, 1);
        store.put(2, 2);
        assert_eq!(store.remove(&1), Some(1));
        assert_eq!(store.remove(&1), None);
        assert_eq!(store.keys_by_recency(), vec![2]);

        store.clear();
        assert_eq!(store.size(), 0);
        assert!(store.keys_by_recency().is_empty());
    }

    #[test]
    fn test_get_count_unsupported() {
        let store = LruImplementation::new(3);
        store.put(1, 1);
        store.get(&1);
        assert_eq!(store.get_count(&1), COUNT_UNSUPPORTED);
    }

    #[test]
    fn test_config_ignores_unknown_options() {
        let store: LruImplementation<u32, u32> = LruImplementation::new(3);
        store.config("initial_capacity=16,bogus=1,initial_capacity=abc");
        assert_eq!(store.max_size(), 3);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_for_each_entry_visits_all() {
        let store = LruImplementation::new(10);
        for i in 0..4u64 {
            store.put(i, i * 10);
        }
        let mut sum = 0;
        store.for_each_entry(&mut |_, v| sum += *v);
        assert_eq!(sum, 60);
    }

    #[test]
    fn test_concurrent_puts_keep_bound() {
        let store = Arc::new(LruImplementation::new(50));
        let mut handles = vec![];

        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    store.put(t * 1000 + i, i);
                    store.get(&(t * 1000 + i / 2));
                    assert!(store.size() <= 50);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.size(), 50);
        assert_eq!(store.keys_by_recency().len(), 50);
    }
}
