//! Order-queue helpers shared by the bounded stores.
//!
//! Both stores keep a `HashMap` with the entries and a `VecDeque` with the keys
//! in eviction order (front = next victim). These helpers keep the two in step.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use tracing::warn;

/// Largest overage `enforce_bound` repairs entry by entry.
///
/// Anything beyond is treated as a corrupted store and cleared outright, which
/// bounds the cost of the repair. A single put can only overshoot by one.
pub const MAX_REPAIRABLE_OVERAGE: usize = 10;

/// Moves a key to the back of the order queue (most recently used).
///
/// Keys that are not in the queue leave it unchanged.
///
/// # Examples
///
/// ```
/// use std::collections::VecDeque;
/// use cachekeeper_core::utils::move_key_to_end;
///
/// let mut order = VecDeque::from(vec!["a", "b", "c"]);
/// move_key_to_end(&mut order, &"a");
/// assert_eq!(order, VecDeque::from(vec!["b", "c", "a"]));
///
/// move_key_to_end(&mut order, &"z");
/// assert_eq!(order.len(), 3);
/// ```
pub fn move_key_to_end<K: PartialEq>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(found) = order.remove(pos) {
            order.push_back(found);
        }
    }
}

/// Removes a key from the order queue. Returns `true` if it was present.
pub fn remove_from_order<K: PartialEq>(order: &mut VecDeque<K>, key: &K) -> bool {
    match order.iter().position(|k| k == key) {
        Some(pos) => order.remove(pos).is_some(),
        None => false,
    }
}

/// Pops keys from the front of the queue until one that is still mapped has
/// been removed from the map.
///
/// Orphaned keys (queued but no longer mapped) are discarded on the way.
/// Returns `false` once the queue is exhausted without removing anything.
pub fn evict_front<K, E>(map: &mut HashMap<K, E>, order: &mut VecDeque<K>) -> bool
where
    K: Hash + Eq,
{
    while let Some(key) = order.pop_front() {
        if map.remove(&key).is_some() {
            return true;
        }
    }
    false
}

/// Evicts from the front until the map holds at most `max_size` entries.
///
/// Returns the number of entries evicted. If the queue runs dry while the map
/// is still too large the two structures disagree; the map is then cleared so
/// that the size bound holds no matter what.
pub fn shrink_to<K, E>(map: &mut HashMap<K, E>, order: &mut VecDeque<K>, max_size: usize) -> usize
where
    K: Hash + Eq,
{
    let before = map.len();
    while map.len() > max_size {
        if !evict_front(map, order) {
            warn!(
                entries = map.len(),
                max_size, "order queue exhausted before reaching the size bound, clearing store"
            );
            map.clear();
            order.clear();
            break;
        }
    }
    before - map.len()
}

/// Restores `map.len() <= max_size` after an insertion.
///
/// One entry over the bound is removed with a single explicit eviction. Up to
/// [`MAX_REPAIRABLE_OVERAGE`] entries are evicted one by one. A larger overage
/// clears the whole store.
///
/// Returns the number of entries removed.
pub fn enforce_bound<K, E>(map: &mut HashMap<K, E>, order: &mut VecDeque<K>, max_size: usize) -> usize
where
    K: Hash + Eq,
{
    let overage = map.len().saturating_sub(max_size);
    match overage {
        0 => 0,
        1 => {
            if evict_front(map, order) {
                1
            } else {
                shrink_to(map, order, max_size)
            }
        }
        n if n <= MAX_REPAIRABLE_OVERAGE => shrink_to(map, order, max_size),
        n => {
            warn!(
                overage = n,
                max_size, "store is far beyond its size bound, resetting it"
            );
            let removed = map.len();
            map.clear();
            order.clear();
            removed
        }
    }
}
