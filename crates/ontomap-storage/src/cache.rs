//! Second-level cache: cross-session cache of previously materialized
//! entities.
//!
//! Entries are advisory only. They never participate in transactional
//! isolation and are always subordinate to a session's own local delta;
//! the unit of work skips the cache for any subject its delta touches.

use dashmap::DashMap;
use ontomap_model::NamedResource;
use std::any::Any;
use std::sync::Arc;

type CachedEntity = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    type_name: &'static str,
    key: NamedResource,
    context: Option<NamedResource>,
}

/// Concurrent map from (entity type, key, context) to a decoded entity.
#[derive(Default)]
pub struct SecondLevelCache {
    entries: DashMap<CacheKey, CachedEntity>,
}

impl SecondLevelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: Any + Send + Sync>(
        &self,
        type_name: &'static str,
        key: NamedResource,
        context: Option<NamedResource>,
        entity: Arc<T>,
    ) {
        self.entries.insert(
            CacheKey {
                type_name,
                key,
                context,
            },
            entity,
        );
    }

    pub fn get<T: Any + Send + Sync>(
        &self,
        type_name: &'static str,
        key: &NamedResource,
        context: Option<&NamedResource>,
    ) -> Option<Arc<T>> {
        let lookup = CacheKey {
            type_name,
            key: key.clone(),
            context: context.cloned(),
        };
        self.entries
            .get(&lookup)
            .and_then(|entry| Arc::clone(entry.value()).downcast::<T>().ok())
    }

    pub fn contains(
        &self,
        type_name: &'static str,
        key: &NamedResource,
        context: Option<&NamedResource>,
    ) -> bool {
        self.entries.contains_key(&CacheKey {
            type_name,
            key: key.clone(),
            context: context.cloned(),
        })
    }

    pub fn evict(
        &self,
        type_name: &'static str,
        key: &NamedResource,
        context: Option<&NamedResource>,
    ) {
        self.entries.remove(&CacheKey {
            type_name,
            key: key.clone(),
            context: context.cloned(),
        });
    }

    /// Drops every entry bound to `context`. Called whenever a commit
    /// affects that context.
    pub fn evict_context(&self, context: Option<&NamedResource>) {
        let before = self.entries.len();
        self.entries.retain(|k, _| k.context.as_ref() != context);
        tracing::debug!(
            context = context.map(|c| c.as_str()).unwrap_or("<default>"),
            evicted = before - self.entries.len(),
            "evicted cache entries for committed context"
        );
    }

    /// Clears everything, e.g. after bulk external changes to the store.
    pub fn evict_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
