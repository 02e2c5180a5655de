//! # Cachekeeper Core
//!
//! Building blocks of the cachekeeper caching library.
//!
//! A [`Cache`] is a named key/value cache that delegates storage to a
//! swappable [`CacheImplementation`] (LRU by default, FIFO on request), checks
//! per-key [`CachePolicy`] vetoes and keeps hit/miss/put counters. A
//! [`CacheManager`] keeps every cache of the process by name, applies the TOML
//! [`CacheConfiguration`] to it, reloads that configuration when the file
//! changes and exposes each cache on a [`MonitoringSurface`].
//!
//! ## Module Organization
//!
//! - [`implementation`] - backing store contract and implementation kinds
//! - [`utils`] - order-queue helpers shared by the stores
//! - [`policy`] - cache policies, the `Cacheable` key capability and the policy registry
//! - [`config`] - declarative configuration document
//! - [`management`] - operator view of caches and the monitoring surface
//! - [`blob`] - byte-payload cache preset with an entry-size ceiling
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use cachekeeper_core::{Cache, CacheConfiguration, CacheManager, CacheSettings, ManagerOptions};
//!
//! let manager = CacheManager::new(ManagerOptions::default());
//! let users = Arc::new(Cache::<u64, String>::new("users", "User names by id", 1000));
//! users.register_with(&manager);
//!
//! manager.load_configuration(
//!     CacheConfiguration::default().with_cache("users", CacheSettings::new(2).status("active")),
//! );
//!
//! users.put(1, "ada".to_string());
//! users.put(2, "grace".to_string());
//! users.put(3, "edsger".to_string());
//! assert_eq!(users.size(), 2);
//! assert_eq!(users.get(&3), Some("edsger".to_string()));
//!
//! manager.shutdown();
//! assert_eq!(users.size(), 0);
//! ```

mod cache;
mod cache_entry;
mod error;
mod fifo;
mod lru;
mod manager;
mod memory_estimator;
mod stats;
#[cfg(feature = "watch")]
mod watcher;

pub mod blob;
pub mod config;
pub mod implementation;
pub mod management;
pub mod policy;
pub mod utils;

pub use blob::BlobCache;
pub use cache::{Cache, CacheBuilder, CacheKey, CacheValue, DEFAULT_CACHE_TYPE, NO_ENTRY_SIZE_LIMIT};
pub use cache_entry::CacheEntry;
pub use config::{CacheConfiguration, CacheSettings, SettingValue};
pub use error::{CacheError, CacheResult};
pub use fifo::FifoImplementation;
pub use implementation::{CacheImplementation, ImplementationKind, COUNT_UNSUPPORTED};
pub use lru::LruImplementation;
pub use management::{CacheReport, InMemoryMonitor, ManagedCache, MonitoredObject, MonitoringSurface};
pub use manager::{CacheManager, ManagerOptions, NO_MATCH};
pub use memory_estimator::MemoryEstimator;
pub use policy::{Cacheable, CachePolicy, PolicyRegistry, PredicatePolicy, ALWAYS, NEVER};
pub use stats::CacheStats;
