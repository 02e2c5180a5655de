//! # Cache policies
//!
//! A cache policy is a per-key veto: a key whose type implements [`Cacheable`]
//! may name a [`CachePolicy`], and the cache consults that policy before every
//! `get` and `put`. Keys without a policy are always cacheable (subject only to
//! the cache being active and its entry-size ceiling).
//!
//! Policies are registered by name in a [`PolicyRegistry`]. The built-in
//! [`ALWAYS`] and [`NEVER`] policies are present in every registry and cannot
//! be replaced or removed.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use cachekeeper_core::{Cache, CachePolicy, Cacheable, PolicyRegistry};
//!
//! #[derive(Clone, Debug, Hash, PartialEq, Eq)]
//! struct PageKey {
//!     path: String,
//! }
//!
//! impl Cacheable for PageKey {
//!     fn cache_policy(&self) -> Option<Arc<dyn CachePolicy>> {
//!         PolicyRegistry::global().get("static-pages").ok()
//!     }
//! }
//!
//! PolicyRegistry::global()
//!     .create("static-pages", |key: &PageKey| !key.path.starts_with("/admin"))
//!     .unwrap();
//!
//! let cache: Cache<PageKey, String> = Cache::new("pages", "Rendered pages", 100);
//! let admin = PageKey { path: "/admin/users".to_string() };
//! let home = PageKey { path: "/index".to_string() };
//!
//! cache.put(admin.clone(), "secret".to_string());
//! cache.put(home.clone(), "welcome".to_string());
//!
//! assert_eq!(cache.get(&admin), None);
//! assert_eq!(cache.get(&home), Some("welcome".to_string()));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// Name of the built-in policy that accepts every key.
pub const ALWAYS_NAME: &str = "ALWAYS";
/// Name of the built-in policy that rejects every key.
pub const NEVER_NAME: &str = "NEVER";

/// Predicate deciding whether a key may be cached.
pub trait CachePolicy: Send + Sync + fmt::Debug {
    /// Name under which the policy is registered.
    fn name(&self) -> &str;

    /// Returns `true` if `key` should be cached.
    fn check_policy(&self, key: &dyn Any) -> bool;
}

#[derive(Debug)]
pub struct AlwaysPolicy;

impl CachePolicy for AlwaysPolicy {
    fn name(&self) -> &str {
        ALWAYS_NAME
    }

    fn check_policy(&self, _key: &dyn Any) -> bool {
        true
    }
}

#[derive(Debug)]
pub struct NeverPolicy;

impl CachePolicy for NeverPolicy {
    fn name(&self) -> &str {
        NEVER_NAME
    }

    fn check_policy(&self, _key: &dyn Any) -> bool {
        false
    }
}

/// Accepts every key.
pub static ALWAYS: Lazy<Arc<dyn CachePolicy>> = Lazy::new(|| Arc::new(AlwaysPolicy));
/// Rejects every key.
pub static NEVER: Lazy<Arc<dyn CachePolicy>> = Lazy::new(|| Arc::new(NeverPolicy));

/// Policy backed by a closure over keys of type `T`.
///
/// Keys of any other type are accepted.
pub struct PredicatePolicy<T> {
    name: String,
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: 'static> PredicatePolicy<T> {
    pub fn new<F>(name: &str, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            predicate: Box::new(predicate),
        }
    }
}

impl<T> fmt::Debug for PredicatePolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicatePolicy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> CachePolicy for PredicatePolicy<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_policy(&self, key: &dyn Any) -> bool {
        key.downcast_ref::<T>().map_or(true, |key| (self.predicate)(key))
    }
}

/// Capability of a key type to carry a cache policy.
///
/// The default implementation returns no policy, which makes the key always
/// cacheable. Common key types (strings, integers, tuples...) implement it
/// that way; a custom key type opts in with an empty `impl Cacheable for MyKey {}`
/// or overrides [`cache_policy`](Cacheable::cache_policy).
pub trait Cacheable {
    fn cache_policy(&self) -> Option<Arc<dyn CachePolicy>> {
        None
    }
}

macro_rules! plain_cacheable {
    ($($ty:ty),* $(,)?) => {
        $(impl Cacheable for $ty {})*
    };
}

plain_cacheable!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, String, ()
);

impl Cacheable for &str {}
impl Cacheable for Arc<str> {}
impl<T> Cacheable for Vec<T> {}
impl<T> Cacheable for Option<T> {}
impl<T1, T2> Cacheable for (T1, T2) {}
impl<T1, T2, T3> Cacheable for (T1, T2, T3) {}

/// Named registry of cache policies.
///
/// Names are unique. [`ALWAYS`] and [`NEVER`] are registered on creation and
/// are never removed.
///
/// # Examples
///
/// ```
/// use cachekeeper_core::{CacheError, PolicyRegistry};
///
/// let registry = PolicyRegistry::new();
/// assert!(registry.get("ALWAYS").is_ok());
/// assert!(matches!(registry.get("nightly"), Err(CacheError::PolicyNotFound(_))));
///
/// registry.create("even-only", |key: &u64| key % 2 == 0).unwrap();
/// let policy = registry.get("even-only").unwrap();
/// assert!(policy.check_policy(&4u64));
/// assert!(!policy.check_policy(&5u64));
/// ```
pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, Arc<dyn CachePolicy>>>,
}

static GLOBAL_POLICIES: Lazy<PolicyRegistry> = Lazy::new(PolicyRegistry::new);

impl PolicyRegistry {
    /// Creates a registry holding only the built-in policies.
    pub fn new() -> Self {
        let mut policies = HashMap::new();
        policies.insert(ALWAYS_NAME.to_string(), Arc::clone(&*ALWAYS));
        policies.insert(NEVER_NAME.to_string(), Arc::clone(&*NEVER));
        Self {
            policies: RwLock::new(policies),
        }
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static PolicyRegistry {
        &GLOBAL_POLICIES
    }

    /// Registers `policy` under its own name, replacing any custom policy of
    /// the same name.
    pub fn register(&self, policy: Arc<dyn CachePolicy>) -> CacheResult<()> {
        let name = policy.name().to_string();
        if is_builtin(&name) {
            return Err(CacheError::Configuration(format!(
                "policy {name} is built in and cannot be replaced"
            )));
        }
        debug!(policy = %name, "registering cache policy");
        self.policies.write().insert(name, policy);
        Ok(())
    }

    /// Builds a [`PredicatePolicy`] and registers it.
    pub fn create<T, F>(&self, name: &str, predicate: F) -> CacheResult<Arc<dyn CachePolicy>>
    where
        T: 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let policy: Arc<dyn CachePolicy> = Arc::new(PredicatePolicy::new(name, predicate));
        self.register(Arc::clone(&policy))?;
        Ok(policy)
    }

    /// Looks up a policy by name.
    ///
    /// An unknown name is a programming or configuration mistake and fails
    /// with [`CacheError::PolicyNotFound`].
    pub fn get(&self, name: &str) -> CacheResult<Arc<dyn CachePolicy>> {
        self.policies
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::PolicyNotFound(name.to_string()))
    }

    /// Removes a custom policy. Built-ins are kept and yield `false`.
    pub fn unregister(&self, name: &str) -> bool {
        if is_builtin(name) {
            return false;
        }
        self.policies.write().remove(name).is_some()
    }

    /// Registered policy names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_builtin(name: &str) -> bool {
    name == ALWAYS_NAME || name == NEVER_NAME
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        assert!(ALWAYS.check_policy(&"anything"));
        assert!(!NEVER.check_policy(&"anything"));
        assert_eq!(ALWAYS.name(), "ALWAYS");
        assert_eq!(NEVER.name(), "NEVER");
    }

    #[test]
    fn test_new_registry_has_builtins() {
        let registry = PolicyRegistry::new();
        assert_eq!(registry.names(), vec!["ALWAYS".to_string(), "NEVER".to_string()]);
        assert!(!registry.get("NEVER").unwrap().check_policy(&1u8));
    }

    #[test]
    fn test_get_unknown_policy_fails() {
        let registry = PolicyRegistry::new();
        let err = registry.get("missing").unwrap_err();
        assert!(matches!(err, CacheError::PolicyNotFound(name) if name == "missing"));
    }

    #[test]
    fn test_builtins_cannot_be_replaced_or_removed() {
        let registry = PolicyRegistry::new();
        assert!(registry.create("NEVER", |_: &u32| true).is_err());
        assert!(!registry.unregister("ALWAYS"));
        assert!(!registry.get("NEVER").unwrap().check_policy(&1u32));
    }

    #[test]
    fn test_predicate_policy_accepts_other_key_types() {
        let policy = PredicatePolicy::new("short", |key: &String| key.len() < 4);
        assert!(policy.check_policy(&"abc".to_string()));
        assert!(!policy.check_policy(&"abcdef".to_string()));
        assert!(policy.check_policy(&42u32));
    }

    #[test]
    fn test_register_replace_and_unregister() {
        let registry = PolicyRegistry::new();
        registry.create("flip", |_: &u32| true).unwrap();
        registry.create("flip", |_: &u32| false).unwrap();
        assert!(!registry.get("flip").unwrap().check_policy(&1u32));

        assert!(registry.unregister("flip"));
        assert!(registry.get("flip").is_err());
    }

    #[test]
    fn test_plain_keys_have_no_policy() {
        assert!("key".cache_policy().is_none());
        assert!(String::from("key").cache_policy().is_none());
        assert!((1u32, "x").cache_policy().is_none());
    }
}
