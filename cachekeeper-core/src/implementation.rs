//! Backing stores of a [`Cache`](crate::Cache).
//!
//! A cache delegates storage to exactly one [`CacheImplementation`] at a time.
//! The implementation owns the entries, the size bound and the eviction order;
//! the cache façade only adds policy checks and statistics on top.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::fifo::FifoImplementation;
use crate::lru::LruImplementation;

/// Returned by [`CacheImplementation::get_count`] when the store does not
/// track per-key hit counts.
pub const COUNT_UNSUPPORTED: i64 = -1;

/// Key/value store contract behind a cache.
///
/// Every method is safe to call concurrently. Each store guards its entries
/// with a single lock; structural changes (including recency bookkeeping) are
/// mutually exclusive with [`for_each_entry`](CacheImplementation::for_each_entry),
/// which is the only way to iterate the entries.
///
/// After any completed `put`, `put_all` or `set_max_size`, `size() <= max_size()`.
pub trait CacheImplementation<K, V>: Send + Sync {
    /// Returns a clone of the value stored under `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores `value` under `key`, returning the value it replaced.
    fn put(&self, key: K, value: V) -> Option<V>;

    /// Stores several entries while holding the store lock once.
    fn put_all(&self, entries: Vec<(K, V)>) {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    fn remove(&self, key: &K) -> Option<V>;

    /// Returns `true` if `key` is stored. Does not count as an access.
    fn contains_key(&self, key: &K) -> bool;

    fn clear(&self);

    fn size(&self) -> usize;

    /// Changes the size bound, evicting down to it before returning.
    fn set_max_size(&self, max_size: usize);

    fn max_size(&self) -> usize;

    /// Hit count of `key`, or [`COUNT_UNSUPPORTED`].
    fn get_count(&self, _key: &K) -> i64 {
        COUNT_UNSUPPORTED
    }

    /// Applies free-form options (`name=value` pairs separated by commas).
    /// Options a store does not understand are ignored.
    fn config(&self, options: &str);

    /// Visits every entry while holding the store lock.
    ///
    /// The visitor must not call back into the same store.
    fn for_each_entry(&self, visit: &mut dyn FnMut(&K, &V));

    fn kind(&self) -> ImplementationKind;
}

/// Type identifier of a store, as used in configuration documents.
///
/// # Examples
///
/// ```
/// use cachekeeper_core::ImplementationKind;
///
/// let kind: ImplementationKind = "LRU".parse().unwrap();
/// assert_eq!(kind, ImplementationKind::Lru);
///
/// let kind: ImplementationKind = "FifoImplementation".parse().unwrap();
/// assert_eq!(kind, ImplementationKind::Fifo);
///
/// assert!("random".parse::<ImplementationKind>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ImplementationKind {
    #[default]
    Lru,
    Fifo,
}

impl ImplementationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImplementationKind::Lru => "lru",
            ImplementationKind::Fifo => "fifo",
        }
    }

    /// Creates an empty store of this kind bounded to `max_size` entries.
    pub fn create<K, V>(self, max_size: usize) -> Arc<dyn CacheImplementation<K, V>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self {
            ImplementationKind::Lru => Arc::new(LruImplementation::new(max_size)),
            ImplementationKind::Fifo => Arc::new(FifoImplementation::new(max_size)),
        }
    }
}

impl FromStr for ImplementationKind {
    type Err = CacheError;

    fn from_str(s: &str) -> CacheResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "lru" | "lruimplementation" => Ok(ImplementationKind::Lru),
            "fifo" | "fifoimplementation" => Ok(ImplementationKind::Fifo),
            _ => Err(CacheError::UnknownImplementation(s.to_string())),
        }
    }
}

impl fmt::Display for ImplementationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits an option string into trimmed `(name, value)` pairs.
///
/// Segments without `=` yield an empty value; empty segments are skipped.
///
/// ```
/// use cachekeeper_core::implementation::parse_options;
///
/// let options: Vec<_> = parse_options("initial_capacity=64, count_hits=false,,flag").collect();
/// assert_eq!(
///     options,
///     vec![("initial_capacity", "64"), ("count_hits", "false"), ("flag", "")]
/// );
/// ```
pub fn parse_options(options: &str) -> impl Iterator<Item = (&str, &str)> {
    options
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (segment, ""),
        })
}

/// Parses a numeric option value, logging and skipping malformed ones.
pub(crate) fn numeric_option(kind: ImplementationKind, name: &str, value: &str) -> Option<usize> {
    match value.parse::<usize>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            debug!(implementation = %kind, option = name, value, error = %err, "ignoring malformed option");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_display() {
        for kind in [ImplementationKind::Lru, ImplementationKind::Fifo] {
            assert_eq!(kind.to_string().parse::<ImplementationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = "weak-hash".parse::<ImplementationKind>().unwrap_err();
        assert!(matches!(err, CacheError::UnknownImplementation(name) if name == "weak-hash"));
    }

    #[test]
    fn test_create_respects_bound() {
        let store = ImplementationKind::Fifo.create::<u32, u32>(7);
        assert_eq!(store.max_size(), 7);
        assert_eq!(store.kind(), ImplementationKind::Fifo);
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn test_numeric_option() {
        assert_eq!(numeric_option(ImplementationKind::Lru, "n", "12"), Some(12));
        assert_eq!(numeric_option(ImplementationKind::Lru, "n", "-3"), None);
    }
}
