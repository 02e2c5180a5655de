//! # Cachekeeper
//!
//! Named, thread-safe key/value caches managed from one place.
//!
//! ## Features
//!
//! - **Swappable stores**: LRU or FIFO, switched at runtime without restarting
//! - **Per-key policies**: keys may carry a [`CachePolicy`] that vetoes caching
//! - **Registry**: a [`CacheManager`] finds caches by name and controls them by
//!   regular expression (`clear`, `enable`, `disable`, `reset`)
//! - **Declarative configuration**: TOML blocks per cache, re-read when the file
//!   changes (`watch` feature, on by default)
//! - **Introspection**: hit ratio, byte size estimates and serializable reports
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use cachekeeper::{Cache, CacheManager, ManagerOptions};
//!
//! let manager = CacheManager::new(ManagerOptions::default());
//! let cache = Arc::new(Cache::<String, u32>::new("scores", "Scores by player", 3));
//! cache.register_with(&manager);
//!
//! cache.put("a".to_string(), 1);
//! cache.put("b".to_string(), 2);
//! cache.put("c".to_string(), 3);
//! cache.get(&"a".to_string());
//! cache.put("d".to_string(), 4);
//!
//! // "b" was the least recently used entry
//! assert_eq!(cache.get(&"b".to_string()), None);
//! assert_eq!(cache.ratio(), 0.5);
//!
//! assert_eq!(manager.disable("sc.*").unwrap(), "scores: disabled");
//! assert_eq!(cache.size(), 0);
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [caches.scores]
//! implementation = "fifo"
//! options = "count_hits=true"
//! status = "active"
//! size = 500
//! ```
//!
//! Point `CACHEKEEPER_CONFIG` at the file and [`CacheManager::instance`] reads
//! and watches it, or pass the path explicitly through [`ManagerOptions`].

pub use cachekeeper_core::*;
