//! Byte-payload cache with an entry-size ceiling.

use crate::{Cache, CacheBuilder, ImplementationKind};

/// Type identifier of blob caches.
pub const BLOB_CACHE_TYPE: &str = "BlobCache";

/// Default ceiling on a single blob, in bytes.
pub const DEFAULT_MAX_BLOB_SIZE: i64 = 64 * 1024;

/// A cache of raw bytes keyed by string.
///
/// Blobs larger than [`Cache::max_entry_size`] are silently not stored.
pub type BlobCache = Cache<String, Vec<u8>>;

#[allow(clippy::ptr_arg)]
fn blob_len(blob: &Vec<u8>) -> usize {
    blob.len()
}

/// Builder preset for a [`BlobCache`]: LRU, type `BlobCache`, 64 KiB ceiling.
pub fn blob_cache_builder(name: &str) -> CacheBuilder<String, Vec<u8>> {
    CacheBuilder::new(name)
        .cache_type(BLOB_CACHE_TYPE)
        .implementation(ImplementationKind::Lru)
        .entry_size_ceiling(DEFAULT_MAX_BLOB_SIZE, blob_len)
}

/// Creates an active [`BlobCache`].
///
/// ```
/// use cachekeeper_core::blob::{blob_cache, DEFAULT_MAX_BLOB_SIZE};
///
/// let blobs = blob_cache("BlobCache", "Stored documents", 100);
/// assert_eq!(blobs.max_entry_size(), DEFAULT_MAX_BLOB_SIZE);
///
/// blobs.put("tiny".to_string(), vec![1, 2, 3]);
/// blobs.put("huge".to_string(), vec![0; 1 << 20]);
/// assert!(blobs.contains(&"tiny".to_string()));
/// assert!(!blobs.contains(&"huge".to_string()));
/// ```
pub fn blob_cache(name: &str, description: &str, max_size: usize) -> BlobCache {
    blob_cache_builder(name)
        .description(description)
        .max_size(max_size)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheSettings;

    #[test]
    fn test_blob_at_ceiling_is_stored() {
        let blobs = blob_cache("b", "", 4);
        blobs.set_max_entry_size(8).unwrap();
        blobs.put("exact".to_string(), vec![0; 8]);
        blobs.put("over".to_string(), vec![0; 9]);
        assert!(blobs.contains(&"exact".to_string()));
        assert!(!blobs.contains(&"over".to_string()));
        assert_eq!(blobs.stats().puts(), 1);
    }

    #[test]
    fn test_oversized_put_keeps_previous_value() {
        let blobs = blob_cache("b", "", 4);
        blobs.set_max_entry_size(4).unwrap();
        blobs.put("k".to_string(), vec![1]);
        assert_eq!(blobs.put("k".to_string(), vec![0; 10]), None);
        assert_eq!(blobs.get(&"k".to_string()), Some(vec![1]));
    }

    #[test]
    fn test_configuration_sets_ceiling() {
        let blobs = blob_cache("b", "", 4);
        blobs
            .configure(&CacheSettings::new(4).max_entry_size("1024"))
            .unwrap();
        assert_eq!(blobs.max_entry_size(), 1024);
        assert_eq!(blobs.cache_type(), BLOB_CACHE_TYPE);
    }
}
