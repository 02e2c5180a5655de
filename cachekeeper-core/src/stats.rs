use std::sync::atomic::{AtomicU64, Ordering};

/// Hit, miss and put counters of a single cache.
///
/// Counters use `Relaxed` atomics. They are diagnostics only: a `reset()`
/// racing with concurrent traffic may lose or keep a handful of increments.
///
/// # Examples
///
/// ```
/// use cachekeeper_core::CacheStats;
///
/// let stats = CacheStats::new();
/// assert!(stats.ratio().is_nan());
///
/// stats.record_hit();
/// stats.record_miss();
/// stats.record_put();
///
/// assert_eq!(stats.total_accesses(), 2);
/// assert_eq!(stats.puts(), 1);
/// assert_eq!(stats.ratio(), 0.5);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
}

impl CacheStats {
    /// Creates a new `CacheStats` instance with zero counters.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of lookups that found a value.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of lookups that found nothing.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the number of values handed to the backing store.
    #[inline]
    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_accesses(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Returns `hits / (hits + misses)`.
    ///
    /// A cache that has never been read yields `NaN` (0/0), which tells an
    /// operator "no data" rather than "always missing".
    ///
    /// ```
    /// use cachekeeper_core::CacheStats;
    ///
    /// let stats = CacheStats::new();
    /// stats.record_hit();
    /// assert_eq!(stats.ratio(), 1.0);
    /// ```
    #[inline]
    pub fn ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = self.total_accesses() as f64;
        hits / total
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.puts.store(0, Ordering::Relaxed);
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            puts: AtomicU64::new(self.puts()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.puts(), 0);
        assert_eq!(stats.total_accesses(), 0);
    }

    #[test]
    fn test_ratio_without_accesses_is_nan() {
        let stats = CacheStats::new();
        assert!(stats.ratio().is_nan());

        // puts do not count as accesses
        stats.record_put();
        assert!(stats.ratio().is_nan());
    }

    #[test]
    fn test_ratio() {
        let stats = CacheStats::new();
        stats.record_hit();
        assert_eq!(stats.ratio(), 1.0);

        stats.record_miss();
        assert_eq!(stats.ratio(), 0.5);

        stats.record_miss();
        assert!((stats.ratio() - 0.3333).abs() < 0.001);
    }

    #[test]
    fn test_reset() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_put();

        stats.reset();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.puts(), 0);
        assert!(stats.ratio().is_nan());
    }

    #[test]
    fn test_clone_is_independent() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_put();

        let cloned = stats.clone();
        stats.record_hit();

        assert_eq!(stats.hits(), 2);
        assert_eq!(cloned.hits(), 1);
        assert_eq!(cloned.puts(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(CacheStats::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let stats_clone = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    stats_clone.record_hit();
                    stats_clone.record_put();
                }
                for _ in 0..50 {
                    stats_clone.record_miss();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.hits(), 800);
        assert_eq!(stats.puts(), 800);
        assert_eq!(stats.misses(), 400);
    }
}
