//! Behavior of a single cache: eviction, activity, counters and reconfiguration.

use cachekeeper::{Cache, CacheImplementation, ImplementationKind, LruImplementation};
use std::sync::Arc;
use std::thread;

fn key(s: &str) -> String {
    s.to_string()
}

#[test]
fn test_lru_scenario_evicts_least_recently_used() {
    let cache: Cache<String, u32> = Cache::new("scenario", "", 3);
    cache.put(key("a"), 1);
    cache.put(key("b"), 2);
    cache.put(key("c"), 3);
    assert_eq!(cache.get(&key("a")), Some(1));
    cache.put(key("d"), 4);

    assert!(cache.contains(&key("a")));
    assert!(!cache.contains(&key("b")));
    assert!(cache.contains(&key("c")));
    assert!(cache.contains(&key("d")));
    assert_eq!(cache.size(), 3);
}

#[test]
fn test_size_never_exceeds_bound_under_random_traffic() {
    let mut rng = fastrand::Rng::with_seed(7);
    let cache: Cache<u32, u32> = Cache::new("random", "", 16);

    for step in 0..5_000 {
        let k = rng.u32(0..64);
        match rng.u8(0..10) {
            0 => {
                cache.remove(&k);
            }
            1 if step % 500 == 0 => {
                cache.set_max_size(rng.i64(1..32)).unwrap();
            }
            2..=5 => {
                cache.get(&k);
            }
            _ => {
                cache.put(k, step);
            }
        }
        assert!(cache.size() <= cache.max_size());
    }
}

#[test]
fn test_read_your_write() {
    let cache: Cache<u32, String> = Cache::new("ryw", "", 100);
    for i in 0..50 {
        cache.put(i, format!("v{i}"));
    }
    cache.put(10, "updated".to_string());

    assert_eq!(cache.get(&10), Some("updated".to_string()));
    for i in (0..50).filter(|i| *i != 10) {
        assert_eq!(cache.get(&i), Some(format!("v{i}")));
    }
}

#[test]
fn test_deactivation_empties_cache_until_repopulated() {
    let cache: Cache<u32, u32> = Cache::new("toggle", "", 10);
    for i in 0..5 {
        cache.put(i, i);
    }

    cache.set_active(false);
    assert_eq!(cache.size(), 0);
    for i in 0..5 {
        assert_eq!(cache.get(&i), None);
    }

    cache.set_active(true);
    assert_eq!(cache.size(), 0);
    cache.put(1, 10);
    assert_eq!(cache.get(&1), Some(10));
}

#[test]
fn test_ratio_progression() {
    let cache: Cache<u32, u32> = Cache::new("ratio", "", 10);
    assert!(cache.ratio().is_nan());

    cache.put(1, 1);
    cache.get(&1);
    assert_eq!(cache.ratio(), 1.0);

    cache.get(&2);
    assert_eq!(cache.ratio(), 0.5);

    cache.reset();
    assert!(cache.ratio().is_nan());
    assert_eq!(cache.stats().puts(), 0);
}

#[test]
fn test_shrink_keeps_most_recently_used() {
    let cache: Cache<u32, u32> = Cache::new("shrink", "", 10);
    for i in 0..10 {
        cache.put(i, i);
    }
    // touch the low keys so they become the most recently used
    for i in 0..4 {
        cache.get(&i);
    }

    cache.set_max_size(4).unwrap();
    assert_eq!(cache.size(), 4);
    for i in 0..4 {
        assert!(cache.contains(&i), "key {i} should survive the shrink");
    }
}

#[test]
fn test_large_shrink_is_not_treated_as_corruption() {
    let cache: Cache<u32, u32> = Cache::new("big-shrink", "", 100);
    for i in 0..100 {
        cache.put(i, i);
    }
    cache.set_max_size(5).unwrap();
    assert_eq!(cache.size(), 5);
    for i in 95..100 {
        assert!(cache.contains(&i));
    }
}

#[test]
fn test_implementation_swap_keeps_bound_and_drops_entries() {
    let cache: Cache<u32, u32> = Cache::new("swap", "", 3);
    cache.put(1, 1);
    cache.put(2, 2);

    cache.set_implementation("FifoImplementation", "").unwrap();
    assert_eq!(cache.implementation_kind(), ImplementationKind::Fifo);
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.max_size(), 3);

    cache.put(1, 1);
    cache.put(2, 2);
    cache.put(3, 3);
    cache.get(&1);
    cache.put(4, 4);
    // FIFO ignores the read of 1
    assert!(!cache.contains(&1));

    cache.set_implementation("LRU", "").unwrap();
    assert_eq!(cache.implementation_kind(), ImplementationKind::Lru);
}

#[test]
fn test_get_count_depends_on_implementation() {
    let cache: Cache<u32, u32> = Cache::new("counts", "", 3);
    cache.put(1, 1);
    cache.get(&1);
    assert_eq!(cache.get_count(&1), -1);

    cache.set_implementation("fifo", "").unwrap();
    cache.put(1, 1);
    cache.get(&1);
    cache.get(&1);
    assert_eq!(cache.get_count(&1), 2);
}

#[test]
fn test_store_can_be_used_directly() {
    let store: Arc<dyn CacheImplementation<u32, u32>> = Arc::new(LruImplementation::new(2));
    store.put(1, 1);
    store.put(2, 2);
    store.get(&1);
    store.put(3, 3);

    let mut keys = Vec::new();
    store.for_each_entry(&mut |k, _| keys.push(*k));
    keys.sort();
    assert_eq!(keys, vec![1, 3]);
}

#[test]
fn test_concurrent_readers_and_writers_respect_bound() {
    let cache = Arc::new(Cache::<u64, u64>::new("concurrent", "", 50));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..1_000u64 {
                    let k = (t * 1_000 + i) % 200;
                    if i % 3 == 0 {
                        cache.get(&k);
                    } else {
                        cache.put(k, i);
                    }
                    assert!(cache.size() <= cache.max_size());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(cache.size() <= 50);
}

#[test]
fn test_concurrent_implementation_swaps() {
    let cache = Arc::new(Cache::<u32, u32>::new("swapping", "", 20));

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for i in 0..2_000 {
                cache.put(i % 40, i);
                cache.get(&(i % 7));
            }
        })
    };

    for round in 0..20 {
        let kind = if round % 2 == 0 { "fifo" } else { "lru" };
        cache.set_implementation(kind, "").unwrap();
    }
    writer.join().unwrap();

    assert!(cache.size() <= 20);
    assert_eq!(cache.max_size(), 20);
}
