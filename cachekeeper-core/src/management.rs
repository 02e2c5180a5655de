//! Management and introspection surface.
//!
//! Every cache registered with a [`CacheManager`](crate::CacheManager) is
//! exposed to an operator tool through the object-safe [`ManagedCache`] trait
//! and published on a [`MonitoringSurface`] under an object name such as
//! `cachekeeper:type=BlobCache,machine=node-1,name=BlobCache`.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde::Serialize;

use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult};
use crate::{CacheManager, ImplementationKind};

/// Domain of every object name published by this crate.
pub const OBJECT_NAME_DOMAIN: &str = "cachekeeper";

/// Type-erased operator view of a cache.
pub trait ManagedCache: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Type identifier used for filtering, such as `Cache` or `BlobCache`.
    fn cache_type(&self) -> &str;
    fn implementation_kind(&self) -> ImplementationKind;

    fn size(&self) -> usize;
    fn max_size(&self) -> usize;
    fn hits(&self) -> u64;
    fn misses(&self) -> u64;
    fn puts(&self) -> u64;
    fn ratio(&self) -> f64;
    fn byte_size(&self) -> usize;
    fn cheap_byte_size(&self) -> usize;
    fn is_active(&self) -> bool;
    fn max_entry_size(&self) -> i64;

    fn clear(&self);
    /// Zeroes the hit, miss and put counters.
    fn reset(&self);
    fn set_active(&self, active: bool);
    fn set_max_size(&self, max_size: i64) -> CacheResult<()>;
    fn set_max_entry_size(&self, max_entry_size: i64) -> CacheResult<()>;
    fn configure(&self, settings: &CacheSettings) -> CacheResult<()>;

    /// Upcast used to recover the concrete `Cache<K, V>`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Snapshot of every readable attribute. Computes the deep byte size, so
    /// it iterates the whole store.
    fn report(&self) -> CacheReport {
        CacheReport {
            name: self.name().to_string(),
            description: self.description().to_string(),
            cache_type: self.cache_type().to_string(),
            implementation: self.implementation_kind().to_string(),
            size: self.size(),
            max_size: self.max_size(),
            hits: self.hits(),
            misses: self.misses(),
            puts: self.puts(),
            ratio: self.ratio(),
            byte_size: self.byte_size(),
            active: self.is_active(),
            max_entry_size: self.max_entry_size(),
        }
    }
}

impl fmt::Debug for dyn ManagedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedCache")
            .field("name", &self.name())
            .field("cache_type", &self.cache_type())
            .field("size", &self.size())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Serializable snapshot of a cache, see [`ManagedCache::report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheReport {
    pub name: String,
    pub description: String,
    pub cache_type: String,
    pub implementation: String,
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    /// `NaN` (serialized as `null` in JSON) until the cache has been read.
    pub ratio: f64,
    pub byte_size: usize,
    pub active: bool,
    pub max_entry_size: i64,
}

/// Something published on a [`MonitoringSurface`].
#[derive(Clone)]
pub enum MonitoredObject {
    Cache(Arc<dyn ManagedCache>),
    /// The manager is only referenced, the surface never keeps it alive.
    Manager(Weak<CacheManager>),
}

impl fmt::Debug for MonitoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoredObject::Cache(cache) => f.debug_tuple("Cache").field(&cache.name()).finish(),
            MonitoredObject::Manager(_) => f.write_str("Manager"),
        }
    }
}

/// External operator surface the manager publishes caches on.
///
/// Failures are reported as [`CacheError::Monitoring`]; the manager logs them
/// and carries on.
pub trait MonitoringSurface: Send + Sync {
    fn register(&self, object_name: &str, object: MonitoredObject) -> CacheResult<()>;
    fn unregister(&self, object_name: &str) -> CacheResult<()>;
}

/// Object name of a cache.
///
/// ```
/// use cachekeeper_core::management::cache_object_name;
///
/// assert_eq!(
///     cache_object_name("BlobCache", "node-1", "BlobCache"),
///     "cachekeeper:type=BlobCache,machine=node-1,name=BlobCache"
/// );
/// ```
pub fn cache_object_name(cache_type: &str, machine: &str, name: &str) -> String {
    format!("{OBJECT_NAME_DOMAIN}:type={cache_type},machine={machine},name={name}")
}

/// Object name of the manager itself.
pub fn manager_object_name(machine: &str) -> String {
    format!("{OBJECT_NAME_DOMAIN}:type=CacheManager,machine={machine}")
}

/// In-process [`MonitoringSurface`] keeping registrations in a concurrent map.
///
/// Registering an object name twice fails, like a real registry would.
#[derive(Default)]
pub struct InMemoryMonitor {
    objects: DashMap<String, MonitoredObject>,
}

impl InMemoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered object names, sorted.
    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, object_name: &str) -> bool {
        self.objects.contains_key(object_name)
    }

    pub fn cache(&self, object_name: &str) -> Option<Arc<dyn ManagedCache>> {
        match self.objects.get(object_name).as_deref() {
            Some(MonitoredObject::Cache(cache)) => Some(Arc::clone(cache)),
            _ => None,
        }
    }

    pub fn manager(&self, object_name: &str) -> Option<Arc<CacheManager>> {
        match self.objects.get(object_name).as_deref() {
            Some(MonitoredObject::Manager(manager)) => manager.upgrade(),
            _ => None,
        }
    }

    /// Reports of every registered cache, sorted by name.
    pub fn snapshot(&self) -> Vec<CacheReport> {
        let caches: Vec<Arc<dyn ManagedCache>> = self
            .objects
            .iter()
            .filter_map(|entry| match entry.value() {
                MonitoredObject::Cache(cache) => Some(Arc::clone(cache)),
                MonitoredObject::Manager(_) => None,
            })
            .collect();
        let mut reports: Vec<CacheReport> = caches.iter().map(|cache| cache.report()).collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }
}

impl MonitoringSurface for InMemoryMonitor {
    fn register(&self, object_name: &str, object: MonitoredObject) -> CacheResult<()> {
        match self.objects.entry(object_name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(CacheError::Monitoring(format!(
                "{object_name} is already registered"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(object);
                Ok(())
            }
        }
    }

    fn unregister(&self, object_name: &str) -> CacheResult<()> {
        self.objects
            .remove(object_name)
            .map(|_| ())
            .ok_or_else(|| CacheError::Monitoring(format!("{object_name} is not registered")))
    }
}
