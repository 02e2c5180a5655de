use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult};
use crate::management::ManagedCache;
use crate::{
    CacheImplementation, CacheManager, CacheStats, Cacheable, ImplementationKind, MemoryEstimator,
};

/// Type identifier of a plain [`Cache`].
pub const DEFAULT_CACHE_TYPE: &str = "Cache";

/// Entry-size ceiling value meaning "not supported / not enforced".
pub const NO_ENTRY_SIZE_LIMIT: i64 = -1;

/// Bounds every cache key satisfies.
pub trait CacheKey: Cacheable + Hash + Eq + Clone + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Cacheable + Hash + Eq + Clone + Send + Sync + 'static {}

/// Bounds every cached value satisfies.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

/// A named, policy-aware cache in front of a swappable backing store.
///
/// All reads and writes are delegated to the current [`CacheImplementation`]
/// after two checks: the cache must be active, and a key carrying a
/// [`CachePolicy`](crate::CachePolicy) (see [`Cacheable`]) must be accepted by
/// it. Rejected calls behave as if the key were absent and leave the counters
/// alone.
///
/// # Thread Safety
///
/// The current store sits in a `parking_lot::RwLock<Arc<dyn CacheImplementation>>`.
/// Reads and writes take it shared and rely on the store's own lock;
/// [`set_implementation`](Cache::set_implementation) and deactivation take it
/// exclusively so that no write lands in a store that is being cleared.
///
/// Hit, miss and put counters are best effort (see [`CacheStats`]).
///
/// # Examples
///
/// ```
/// use cachekeeper_core::Cache;
///
/// let cache: Cache<String, u32> = Cache::new("scores", "Scores by player", 3);
/// cache.put("a".to_string(), 1);
/// cache.put("b".to_string(), 2);
/// cache.put("c".to_string(), 3);
/// cache.get(&"a".to_string());
/// cache.put("d".to_string(), 4);
///
/// assert_eq!(cache.get(&"b".to_string()), None);
/// assert_eq!(cache.size(), 3);
///
/// cache.set_active(false);
/// assert_eq!(cache.get(&"a".to_string()), None);
/// assert_eq!(cache.size(), 0);
/// ```
pub struct Cache<K, V> {
    name: String,
    description: String,
    cache_type: String,
    store: RwLock<Arc<dyn CacheImplementation<K, V>>>,
    stats: CacheStats,
    active: AtomicBool,
    max_entry_size: AtomicI64,
    default_max_entry_size: i64,
    entry_size: Option<fn(&V) -> usize>,
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> {
    /// Creates an active LRU-backed cache holding at most `max_size` entries.
    pub fn new(name: &str, description: &str, max_size: usize) -> Self {
        CacheBuilder::new(name)
            .description(description)
            .max_size(max_size)
            .build()
    }

    pub fn builder(name: &str) -> CacheBuilder<K, V> {
        CacheBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cache_type(&self) -> &str {
        &self.cache_type
    }

    fn admits(&self, key: &K) -> bool {
        self.active.load(Ordering::Acquire)
            && key
                .cache_policy()
                .map_or(true, |policy| policy.check_policy(key))
    }

    fn exceeds_entry_ceiling(&self, value: &V) -> bool {
        let ceiling = self.max_entry_size.load(Ordering::Relaxed);
        match self.entry_size {
            Some(size_of) if ceiling > 0 => size_of(value) as u64 > ceiling as u64,
            _ => false,
        }
    }

    /// Looks up `key`.
    ///
    /// Returns `None` without touching the store or the counters when the
    /// cache is inactive or the key's policy rejects it. Otherwise records a
    /// hit or a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let store = self.store.read();
        if !self.admits(key) {
            return None;
        }
        let value = store.get(key);
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        value
    }

    /// Stores `value` under `key` and returns the value it replaced.
    ///
    /// Nothing is stored (and `None` is returned) when the cache is inactive,
    /// the key's policy rejects it, or the value is larger than a positive
    /// entry-size ceiling.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let store = self.store.read();
        if !self.admits(&key) || self.exceeds_entry_ceiling(&value) {
            return None;
        }
        self.stats.record_put();
        store.put(key, value)
    }

    /// Stores every admissible entry with a single store lock acquisition.
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        let store = self.store.read();
        let admitted: Vec<(K, V)> = entries
            .into_iter()
            .filter(|(key, value)| self.admits(key) && !self.exceeds_entry_ceiling(value))
            .collect();
        for _ in &admitted {
            self.stats.record_put();
        }
        store.put_all(admitted);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.store.read().remove(key)
    }

    /// Returns `true` if `key` is currently cached. Not counted as an access.
    pub fn contains(&self, key: &K) -> bool {
        let store = self.store.read();
        self.admits(key) && store.contains_key(key)
    }

    pub fn clear(&self) {
        self.store.read().clear();
    }

    pub fn size(&self) -> usize {
        self.store.read().size()
    }

    pub fn max_size(&self) -> usize {
        self.store.read().max_size()
    }

    /// Changes the entry bound, evicting least recently used entries first.
    ///
    /// Negative values are rejected with [`CacheError::Configuration`].
    pub fn set_max_size(&self, max_size: i64) -> CacheResult<()> {
        let max_size = usize::try_from(max_size).map_err(|_| {
            CacheError::Configuration(format!(
                "max size of cache {} must not be negative, got {max_size}",
                self.name
            ))
        })?;
        self.store.read().set_max_size(max_size);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Activates or deactivates the cache.
    ///
    /// Deactivating clears the store before returning; an inactive cache holds
    /// nothing observable.
    pub fn set_active(&self, active: bool) {
        let store = self.store.write();
        let was_active = self.active.swap(active, Ordering::AcqRel);
        if !active {
            store.clear();
        }
        if was_active != active {
            debug!(cache = %self.name, active, "cache activity changed");
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Hit ratio, `NaN` before the first lookup.
    pub fn ratio(&self) -> f64 {
        self.stats.ratio()
    }

    /// Zeroes the hit, miss and put counters.
    pub fn reset(&self) {
        self.stats.reset();
    }

    /// Hit count of `key` as tracked by the store, `-1` if unsupported.
    pub fn get_count(&self, key: &K) -> i64 {
        self.store.read().get_count(key)
    }

    /// `true` if this cache type declares an entry-size ceiling.
    pub fn supports_max_entry_size(&self) -> bool {
        self.default_max_entry_size > 0
    }

    /// Current entry-size ceiling, `-1` when the cache type has none.
    pub fn max_entry_size(&self) -> i64 {
        self.max_entry_size.load(Ordering::Relaxed)
    }

    /// Sets the entry-size ceiling. Values `<= 0` disable the check.
    ///
    /// Fails with [`CacheError::Unsupported`] on cache types without a ceiling.
    pub fn set_max_entry_size(&self, max_entry_size: i64) -> CacheResult<()> {
        if !self.supports_max_entry_size() {
            return Err(CacheError::Unsupported(format!(
                "cache {} of type {} has no entry size ceiling",
                self.name, self.cache_type
            )));
        }
        self.max_entry_size.store(max_entry_size, Ordering::Relaxed);
        Ok(())
    }

    /// Handle on the current backing store.
    ///
    /// The handle goes stale when [`set_implementation`](Cache::set_implementation)
    /// swaps the store; fetch it again after a reconfiguration.
    pub fn implementation(&self) -> Arc<dyn CacheImplementation<K, V>> {
        Arc::clone(&self.store.read())
    }

    pub fn implementation_kind(&self) -> ImplementationKind {
        self.store.read().kind()
    }

    /// Replaces the backing store with a new, empty one of type `type_id`.
    ///
    /// The current contents are dropped, the current size bound carries over
    /// and `options` are applied to the new store before it is published. An
    /// unknown type is logged and returned as an error; the current store then
    /// stays in place untouched.
    pub fn set_implementation(&self, type_id: &str, options: &str) -> CacheResult<()> {
        let kind = type_id.parse::<ImplementationKind>().map_err(|err| {
            error!(cache = %self.name, implementation = type_id, error = %err, "cannot switch cache implementation");
            err
        })?;
        self.swap_implementation(kind, options);
        Ok(())
    }

    fn swap_implementation(&self, kind: ImplementationKind, options: &str) {
        let mut slot = self.store.write();
        let max_size = slot.max_size();
        slot.clear();
        let next = kind.create::<K, V>(max_size);
        next.config(options);
        *slot = next;
        info!(cache = %self.name, implementation = %kind, max_size, "cache implementation switched");
    }

    /// Applies a declarative configuration block.
    ///
    /// The block is validated first; an invalid block is logged, returned as an
    /// error and leaves every setting as it was. A valid block is applied in
    /// order: implementation, activity, size, entry-size ceiling.
    pub fn configure(&self, settings: &CacheSettings) -> CacheResult<()> {
        let resolved = settings.resolve().map_err(|err| {
            error!(cache = %self.name, error = %err, "rejecting cache configuration");
            err
        })?;

        match resolved.implementation {
            Some(kind) if kind != self.implementation_kind() => {
                self.swap_implementation(kind, &resolved.options)
            }
            _ if !resolved.options.is_empty() => self.store.read().config(&resolved.options),
            _ => {}
        }

        if let Some(active) = resolved.active {
            self.set_active(active);
        }

        self.store.read().set_max_size(resolved.size);

        match resolved.max_entry_size {
            Some(ceiling) if self.supports_max_entry_size() => {
                self.max_entry_size.store(ceiling, Ordering::Relaxed)
            }
            Some(ceiling) => {
                warn!(cache = %self.name, ceiling, "cache type has no entry size ceiling, ignoring max_entry_size")
            }
            None if self.supports_max_entry_size() => self
                .max_entry_size
                .store(self.default_max_entry_size, Ordering::Relaxed),
            None => {}
        }

        debug!(
            cache = %self.name,
            implementation = %self.implementation_kind(),
            active = self.is_active(),
            size = resolved.size,
            "cache configured"
        );
        Ok(())
    }
}

fn deep_size<T: MemoryEstimator + ?Sized>(item: &T, seen: &mut HashSet<usize>) -> usize {
    match item.shared_identity() {
        Some(identity) if !seen.insert(identity) => 0,
        _ => item.estimate_memory(),
    }
}

impl<K, V> Cache<K, V>
where
    K: CacheKey + MemoryEstimator,
    V: CacheValue + MemoryEstimator,
{
    /// Estimated footprint of every stored key and value.
    ///
    /// Values sharing one allocation (such as clones of the same `Arc`) are
    /// counted once.
    pub fn byte_size(&self) -> usize {
        let store = self.store.read();
        let mut seen = HashSet::new();
        let mut total = 0usize;
        store.for_each_entry(&mut |key, value| {
            total += deep_size(key, &mut seen) + deep_size(value, &mut seen);
        });
        total
    }

    /// Like [`byte_size`](Cache::byte_size) without deduplicating shared
    /// allocations. May over-count, but allocates nothing.
    pub fn cheap_byte_size(&self) -> usize {
        let store = self.store.read();
        let mut total = 0usize;
        store.for_each_entry(&mut |key, value| {
            total += key.estimate_memory() + value.estimate_memory();
        });
        total
    }

    /// Registers this cache with `manager`, returning the cache previously
    /// registered under the same name.
    pub fn register_with(self: &Arc<Self>, manager: &CacheManager) -> Option<Arc<dyn ManagedCache>> {
        manager.put_cache(Arc::clone(self) as Arc<dyn ManagedCache>)
    }
}

impl<K, V> ManagedCache for Cache<K, V>
where
    K: CacheKey + MemoryEstimator,
    V: CacheValue + MemoryEstimator,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn cache_type(&self) -> &str {
        &self.cache_type
    }

    fn implementation_kind(&self) -> ImplementationKind {
        Cache::implementation_kind(self)
    }

    fn size(&self) -> usize {
        Cache::size(self)
    }

    fn max_size(&self) -> usize {
        Cache::max_size(self)
    }

    fn hits(&self) -> u64 {
        self.stats.hits()
    }

    fn misses(&self) -> u64 {
        self.stats.misses()
    }

    fn puts(&self) -> u64 {
        self.stats.puts()
    }

    fn ratio(&self) -> f64 {
        self.stats.ratio()
    }

    fn byte_size(&self) -> usize {
        Cache::byte_size(self)
    }

    fn cheap_byte_size(&self) -> usize {
        Cache::cheap_byte_size(self)
    }

    fn is_active(&self) -> bool {
        Cache::is_active(self)
    }

    fn max_entry_size(&self) -> i64 {
        Cache::max_entry_size(self)
    }

    fn clear(&self) {
        Cache::clear(self)
    }

    fn reset(&self) {
        Cache::reset(self)
    }

    fn set_active(&self, active: bool) {
        Cache::set_active(self, active)
    }

    fn set_max_size(&self, max_size: i64) -> CacheResult<()> {
        Cache::set_max_size(self, max_size)
    }

    fn set_max_entry_size(&self, max_entry_size: i64) -> CacheResult<()> {
        Cache::set_max_entry_size(self, max_entry_size)
    }

    fn configure(&self, settings: &CacheSettings) -> CacheResult<()> {
        Cache::configure(self, settings)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Two caches are equal when they share a name and a backing store.
impl<K, V> PartialEq for Cache<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.name != other.name {
            return false;
        }
        let mine = Arc::as_ptr(&self.store.read()) as *const ();
        let theirs = Arc::as_ptr(&other.store.read()) as *const ();
        mine == theirs
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.read();
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("cache_type", &self.cache_type)
            .field("implementation", &store.kind())
            .field("size", &store.size())
            .field("active", &self.active.load(Ordering::Acquire))
            .finish()
    }
}

/// Builder for caches that need more than [`Cache::new`] offers: another
/// store type, a type identifier, or an entry-size ceiling.
///
/// # Examples
///
/// ```
/// use cachekeeper_core::{Cache, ImplementationKind};
///
/// let cache: Cache<String, Vec<u8>> = Cache::builder("Thumbnails")
///     .description("Scaled images")
///     .cache_type("ThumbnailCache")
///     .implementation(ImplementationKind::Fifo)
///     .max_size(64)
///     .entry_size_ceiling(1024, |bytes: &Vec<u8>| bytes.len())
///     .build();
///
/// assert_eq!(cache.put("small".to_string(), vec![0; 16]), None);
/// assert_eq!(cache.put("large".to_string(), vec![0; 4096]), None);
/// assert_eq!(cache.size(), 1);
/// ```
pub struct CacheBuilder<K, V> {
    name: String,
    description: String,
    cache_type: String,
    kind: ImplementationKind,
    options: String,
    max_size: usize,
    active: bool,
    default_max_entry_size: i64,
    entry_size: Option<fn(&V) -> usize>,
    _key: PhantomData<fn() -> K>,
}

/// Entry bound used when a builder is not given one.
pub const DEFAULT_MAX_SIZE: usize = 1000;

impl<K: CacheKey, V: CacheValue> CacheBuilder<K, V> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            cache_type: DEFAULT_CACHE_TYPE.to_string(),
            kind: ImplementationKind::default(),
            options: String::new(),
            max_size: DEFAULT_MAX_SIZE,
            active: true,
            default_max_entry_size: NO_ENTRY_SIZE_LIMIT,
            entry_size: None,
            _key: PhantomData,
        }
    }

    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    #[must_use]
    pub fn cache_type(mut self, cache_type: &str) -> Self {
        self.cache_type = cache_type.to_string();
        self
    }

    #[must_use]
    pub fn implementation(mut self, kind: ImplementationKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn options(mut self, options: &str) -> Self {
        self.options = options.to_string();
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Declares a default entry-size ceiling and how to measure a value.
    ///
    /// Only caches built with a positive ceiling accept
    /// [`Cache::set_max_entry_size`].
    #[must_use]
    pub fn entry_size_ceiling(mut self, default_max_entry_size: i64, size_of: fn(&V) -> usize) -> Self {
        self.default_max_entry_size = default_max_entry_size;
        self.entry_size = Some(size_of);
        self
    }

    pub fn build(self) -> Cache<K, V> {
        let store = self.kind.create::<K, V>(self.max_size);
        if !self.options.is_empty() {
            store.config(&self.options);
        }
        let default_max_entry_size = if self.default_max_entry_size > 0 {
            self.default_max_entry_size
        } else {
            NO_ENTRY_SIZE_LIMIT
        };
        Cache {
            name: self.name,
            description: self.description,
            cache_type: self.cache_type,
            store: RwLock::new(store),
            stats: CacheStats::new(),
            active: AtomicBool::new(self.active),
            max_entry_size: AtomicI64::new(default_max_entry_size),
            default_max_entry_size,
            entry_size: self.entry_size,
        }
    }
}
