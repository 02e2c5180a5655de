/// Stored value together with the number of times it has been read.
///
/// Used by stores that track per-key hit counts (see
/// `CacheImplementation::get_count`).
///
/// # Examples
///
/// ```
/// use cachekeeper_core::CacheEntry;
///
/// let mut entry = CacheEntry::new(42);
/// assert_eq!(entry.hits, 0);
///
/// entry.record_hit();
/// assert_eq!(entry.hits, 1);
/// ```
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub hits: u64,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that has not been read yet.
    pub fn new(value: V) -> Self {
        Self { value, hits: 0 }
    }

    pub fn record_hit(&mut self) {
        self.hits = self.hits.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_saturate() {
        let mut entry = CacheEntry::new("data");
        entry.hits = u64::MAX;
        entry.record_hit();
        assert_eq!(entry.hits, u64::MAX);
    }
}
