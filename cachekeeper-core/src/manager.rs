//! Registry and control plane of every named cache in the process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, CacheValue};
use crate::config::CacheConfiguration;
use crate::error::{CacheError, CacheResult};
use crate::management::{
    cache_object_name, manager_object_name, CacheReport, InMemoryMonitor, ManagedCache,
    MonitoredObject, MonitoringSurface,
};
#[cfg(feature = "watch")]
use crate::watcher::ConfigWatcher;
use crate::Cache;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CACHEKEEPER_CONFIG";
/// Environment variable naming this node in monitoring object names.
pub const MACHINE_NAME_ENV: &str = "CACHEKEEPER_MACHINE_NAME";
pub const DEFAULT_MACHINE_NAME: &str = "localhost";

/// Summary returned by bulk operations that matched nothing.
pub const NO_MATCH: &str = "no cache matched";

/// How a [`CacheManager`] is wired up.
#[derive(Clone)]
pub struct ManagerOptions {
    pub machine_name: String,
    /// TOML configuration file, read on creation when set.
    pub config_path: Option<PathBuf>,
    pub monitor: Arc<dyn MonitoringSurface>,
    /// Start watching `config_path` for changes on creation.
    pub watch: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            machine_name: DEFAULT_MACHINE_NAME.to_string(),
            config_path: None,
            monitor: Arc::new(InMemoryMonitor::new()),
            watch: false,
        }
    }
}

impl ManagerOptions {
    /// Options taken from `CACHEKEEPER_CONFIG` and `CACHEKEEPER_MACHINE_NAME`.
    ///
    /// A configuration path found in the environment is also watched.
    pub fn from_env() -> Self {
        let config_path = std::env::var_os(CONFIG_PATH_ENV)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        let machine_name = std::env::var(MACHINE_NAME_ENV)
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MACHINE_NAME.to_string());
        Self {
            machine_name,
            watch: config_path.is_some(),
            config_path,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_machine_name(mut self, machine_name: &str) -> Self {
        self.machine_name = machine_name.to_string();
        self
    }

    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn MonitoringSurface>) -> Self {
        self.monitor = monitor;
        self
    }

    #[must_use]
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }
}

impl fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("machine_name", &self.machine_name)
            .field("config_path", &self.config_path)
            .field("watch", &self.watch)
            .finish_non_exhaustive()
    }
}

static INSTANCE: Lazy<Mutex<Option<Arc<CacheManager>>>> = Lazy::new(|| Mutex::new(None));

/// Named registry of caches with configuration, bulk control and monitoring.
///
/// A manager is an ordinary object: build one with [`CacheManager::new`] and
/// hand it to whoever owns caches. [`CacheManager::instance`] offers a lazily
/// created process-wide manager for code that cannot be handed one;
/// [`CacheManager::shutdown_instance`] tears it down so that the next call
/// creates a fresh one.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cachekeeper_core::{blob::blob_cache, Cache, CacheManager, ManagerOptions};
///
/// let manager = CacheManager::new(ManagerOptions::default());
/// manager.put_cache(Arc::new(blob_cache("BlobCache", "Documents", 100)));
/// manager.put_cache(Arc::new(Cache::<String, String>::new("XSLTemplates", "Templates", 20)));
///
/// assert_eq!(manager.disable("Blob.*").unwrap(), "BlobCache: disabled");
/// assert_eq!(manager.disable("Blob.*").unwrap(), "BlobCache: already inactive");
/// assert!(manager.get_cache("XSLTemplates").unwrap().is_active());
/// ```
pub struct CacheManager {
    caches: DashMap<String, Arc<dyn ManagedCache>>,
    configuration: RwLock<CacheConfiguration>,
    config_path: Option<PathBuf>,
    monitor: Arc<dyn MonitoringSurface>,
    machine_name: RwLock<String>,
    self_ref: Weak<CacheManager>,
    shut_down: AtomicBool,
    #[cfg(feature = "watch")]
    watcher: Mutex<Option<ConfigWatcher>>,
}

impl CacheManager {
    /// Creates a manager and registers it with its monitoring surface.
    ///
    /// When `options.config_path` is set the file is read right away, and
    /// watched if `options.watch` is set. Failures of either are logged; the
    /// manager starts without configuration.
    pub fn new(options: ManagerOptions) -> Arc<Self> {
        let manager = Arc::new_cyclic(|self_ref| CacheManager {
            caches: DashMap::new(),
            configuration: RwLock::new(CacheConfiguration::default()),
            config_path: options.config_path,
            monitor: options.monitor,
            machine_name: RwLock::new(options.machine_name),
            self_ref: self_ref.clone(),
            shut_down: AtomicBool::new(false),
            #[cfg(feature = "watch")]
            watcher: Mutex::new(None),
        });

        manager.register_self(&manager.machine_name.read());

        if manager.config_path.is_some() {
            if let Err(err) = manager.read_configuration() {
                error!(error = %err, "cannot read cache configuration");
            }
            if options.watch {
                if let Err(err) = manager.watch_configuration() {
                    error!(error = %err, "cannot watch cache configuration");
                }
            }
        }
        manager
    }

    /// The process-wide manager, created from [`ManagerOptions::from_env`] on
    /// first use.
    pub fn instance() -> Arc<CacheManager> {
        let mut slot = INSTANCE.lock();
        Arc::clone(slot.get_or_insert_with(|| CacheManager::new(ManagerOptions::from_env())))
    }

    /// Shuts the process-wide manager down and forgets it.
    pub fn shutdown_instance() {
        let manager = INSTANCE.lock().take();
        if let Some(manager) = manager {
            manager.shutdown();
        }
    }

    fn register_self(&self, machine: &str) {
        let object_name = manager_object_name(machine);
        if let Err(err) = self
            .monitor
            .register(&object_name, MonitoredObject::Manager(self.self_ref.clone()))
        {
            error!(object = %object_name, error = %err, "cannot register cache manager");
        }
    }

    fn unregister_self(&self, machine: &str) {
        let object_name = manager_object_name(machine);
        if let Err(err) = self.monitor.unregister(&object_name) {
            error!(object = %object_name, error = %err, "cannot unregister cache manager");
        }
    }

    fn register_cache(&self, cache: &Arc<dyn ManagedCache>, machine: &str) {
        let object_name = cache_object_name(cache.cache_type(), machine, cache.name());
        match self
            .monitor
            .register(&object_name, MonitoredObject::Cache(Arc::clone(cache)))
        {
            Ok(()) => debug!(object = %object_name, "cache exposed to monitoring"),
            Err(err) => error!(object = %object_name, error = %err, "cannot register cache"),
        }
    }

    fn unregister_cache(&self, cache: &Arc<dyn ManagedCache>, machine: &str) {
        let object_name = cache_object_name(cache.cache_type(), machine, cache.name());
        if let Err(err) = self.monitor.unregister(&object_name) {
            error!(object = %object_name, error = %err, "cannot unregister cache");
        }
    }

    /// Registers `cache` under its name and returns the cache it replaced.
    ///
    /// Configuration already loaded for that name is applied immediately, and
    /// the cache is exposed on the monitoring surface. A manager that has been
    /// shut down registers nothing and returns `None`.
    pub fn put_cache(&self, cache: Arc<dyn ManagedCache>) -> Option<Arc<dyn ManagedCache>> {
        let name = cache.name().to_string();

        // held until the cache is in the registry, so a concurrent
        // load_configuration either sees the cache or is seen by it
        let configuration = self.configuration.read();
        if self.is_shut_down() {
            warn!(cache = %name, "cache manager is shut down, not registering cache");
            return None;
        }

        if let Some(settings) = configuration.settings(&name) {
            if let Err(err) = cache.configure(settings) {
                debug!(cache = %name, error = %err, "pending configuration rejected on registration");
            }
        }

        let machine = self.machine_name.read();
        let previous = self.caches.insert(name.clone(), Arc::clone(&cache));
        if let Some(previous) = &previous {
            self.unregister_cache(previous, &machine);
        }
        self.register_cache(&cache, &machine);

        debug!(cache = %name, replaced = previous.is_some(), "cache registered");
        previous
    }

    pub fn get_cache(&self, name: &str) -> Option<Arc<dyn ManagedCache>> {
        self.caches.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Looks a cache up and recovers its concrete type.
    ///
    /// Returns `None` if no cache has that name or if it is not a `Cache<K, V>`.
    pub fn get_typed_cache<K: CacheKey, V: CacheValue>(&self, name: &str) -> Option<Arc<Cache<K, V>>> {
        self.get_cache(name)?.as_any().downcast::<Cache<K, V>>().ok()
    }

    /// Every registered cache, sorted by name.
    pub fn get_caches(&self) -> Vec<Arc<dyn ManagedCache>> {
        let mut caches: Vec<Arc<dyn ManagedCache>> = self
            .caches
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        caches.sort_by(|a, b| a.name().cmp(b.name()));
        caches
    }

    /// Caches whose type identifier equals `cache_type`, sorted by name. An
    /// empty filter selects every cache.
    pub fn get_caches_of_type(&self, cache_type: &str) -> Vec<Arc<dyn ManagedCache>> {
        let mut caches = self.get_caches();
        if !cache_type.is_empty() {
            caches.retain(|cache| cache.cache_type() == cache_type);
        }
        caches
    }

    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    fn matching(&self, pattern: &str) -> CacheResult<Vec<Arc<dyn ManagedCache>>> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        let mut caches = self.get_caches();
        caches.retain(|cache| regex.is_match(cache.name()));
        Ok(caches)
    }

    fn for_matching<F>(&self, pattern: &str, mut apply: F) -> CacheResult<String>
    where
        F: FnMut(&dyn ManagedCache) -> String,
    {
        let lines: Vec<String> = self
            .matching(pattern)?
            .iter()
            .map(|cache| apply(cache.as_ref()))
            .collect();
        if lines.is_empty() {
            return Ok(NO_MATCH.to_string());
        }
        Ok(lines.join("\n"))
    }

    /// Clears every cache whose whole name matches the regular expression
    /// `pattern`. Returns one summary line per matched cache.
    pub fn clear(&self, pattern: &str) -> CacheResult<String> {
        let summary = self.for_matching(pattern, |cache| {
            cache.clear();
            format!("{}: cleared", cache.name())
        })?;
        info!(pattern, "caches cleared");
        Ok(summary)
    }

    /// Activates matching caches. Caches already active are reported as such.
    pub fn enable(&self, pattern: &str) -> CacheResult<String> {
        let summary = self.for_matching(pattern, |cache| {
            if cache.is_active() {
                format!("{}: already active", cache.name())
            } else {
                cache.set_active(true);
                format!("{}: enabled", cache.name())
            }
        })?;
        info!(pattern, "caches enabled");
        Ok(summary)
    }

    /// Deactivates (and thereby empties) matching caches.
    pub fn disable(&self, pattern: &str) -> CacheResult<String> {
        let summary = self.for_matching(pattern, |cache| {
            if cache.is_active() {
                cache.set_active(false);
                format!("{}: disabled", cache.name())
            } else {
                format!("{}: already inactive", cache.name())
            }
        })?;
        info!(pattern, "caches disabled");
        Ok(summary)
    }

    /// Zeroes the counters of matching caches.
    pub fn reset(&self, pattern: &str) -> CacheResult<String> {
        self.for_matching(pattern, |cache| {
            cache.reset();
            format!("{}: counters reset", cache.name())
        })
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Re-reads the configuration file and applies it, see
    /// [`load_configuration`](CacheManager::load_configuration).
    ///
    /// # Errors
    /// - `CacheError::Configuration` if the manager has no configuration path
    /// - `CacheError::Io` or `CacheError::Parse` if the file cannot be loaded;
    ///   the effective configuration is then left as it was
    pub fn read_configuration(&self) -> CacheResult<String> {
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| CacheError::Configuration("no configuration path set".to_string()))?;
        let configuration = CacheConfiguration::from_file(path)?;
        Ok(self.load_configuration(configuration))
    }

    /// Replaces the effective configuration and applies it to every
    /// registered cache it mentions. Caches it does not mention are left
    /// untouched; caches registered later pick their block up in
    /// [`put_cache`](CacheManager::put_cache).
    ///
    /// Returns one summary line per registered cache configured or rejected.
    pub fn load_configuration(&self, configuration: CacheConfiguration) -> String {
        if configuration.is_empty() {
            error!("no cache configuration entries found");
        }

        // registrations wait until the new document is both applied and published
        let mut effective = self.configuration.write();
        let mut lines = Vec::new();
        for (name, settings) in &configuration.caches {
            let Some(cache) = self.get_cache(name) else {
                continue;
            };
            match cache.configure(settings) {
                Ok(()) => lines.push(format!("{name}: configured")),
                Err(err) => lines.push(format!("{name}: rejected ({err})")),
            }
        }

        info!(
            entries = configuration.caches.len(),
            applied = lines.len(),
            "cache configuration loaded"
        );
        *effective = configuration;
        drop(effective);

        if lines.is_empty() {
            return NO_MATCH.to_string();
        }
        lines.join("\n")
    }

    /// The configuration currently in effect.
    pub fn configuration(&self) -> CacheConfiguration {
        self.configuration.read().clone()
    }

    pub(crate) fn reload_configuration(&self) {
        match self.read_configuration() {
            Ok(summary) => info!(%summary, "cache configuration reloaded"),
            Err(err) => error!(error = %err, "cache configuration reload failed"),
        }
    }

    /// Starts watching the configuration file; every change is re-read and
    /// applied on a background thread. Replaces a watcher already running.
    #[cfg(feature = "watch")]
    pub fn watch_configuration(&self) -> CacheResult<()> {
        if self.is_shut_down() {
            return Err(CacheError::Configuration("cache manager is shut down".to_string()));
        }
        let path = self
            .config_path
            .as_deref()
            .ok_or_else(|| CacheError::Configuration("no configuration path set".to_string()))?;
        let watcher = ConfigWatcher::start(path, self.self_ref.clone())?;
        let previous = self.watcher.lock().replace(watcher);
        drop(previous);
        Ok(())
    }

    /// Always fails: the crate was built without the `watch` feature.
    #[cfg(not(feature = "watch"))]
    pub fn watch_configuration(&self) -> CacheResult<()> {
        Err(CacheError::Unsupported(
            "configuration watching requires the watch feature".to_string(),
        ))
    }

    pub fn machine_name(&self) -> String {
        self.machine_name.read().clone()
    }

    /// Renames this node. Every monitoring registration is withdrawn under
    /// the old name and redone under the new one.
    pub fn set_machine_name(&self, machine_name: &str) {
        let mut machine = self.machine_name.write();
        if machine.as_str() == machine_name {
            return;
        }
        let previous = std::mem::replace(&mut *machine, machine_name.to_string());

        let caches = self.get_caches();
        for cache in &caches {
            self.unregister_cache(cache, &previous);
        }
        self.unregister_self(&previous);

        self.register_self(&machine);
        for cache in &caches {
            self.register_cache(cache, &machine);
        }
        info!(from = %previous, to = %*machine, caches = caches.len(), "machine name changed");
    }

    /// Reports of every registered cache, sorted by name.
    pub fn report(&self) -> Vec<CacheReport> {
        self.get_caches().iter().map(|cache| cache.report()).collect()
    }

    /// Stops the watcher, clears every cache, withdraws every monitoring
    /// registration and empties the registry. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        // wait for registrations that passed the shutdown check
        drop(self.configuration.write());

        #[cfg(feature = "watch")]
        {
            let watcher = self.watcher.lock().take();
            drop(watcher);
        }

        let machine = self.machine_name.read();
        let caches = self.get_caches();
        for cache in &caches {
            cache.clear();
            self.unregister_cache(cache, &machine);
        }
        self.caches.clear();
        self.unregister_self(&machine);

        info!(caches = caches.len(), "cache manager shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        if !self.is_shut_down() && !self.caches.is_empty() {
            warn!(caches = self.caches.len(), "cache manager dropped without shutdown");
        }
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("machine_name", &*self.machine_name.read())
            .field("caches", &self.cache_names())
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}
