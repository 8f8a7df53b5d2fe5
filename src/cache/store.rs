//! Multi-tenant, type-partitioned value store.
//!
//! Values are addressed by `(type_id, tenant_id, item_id)`. Each
//! `(type_id, tenant_id)` pair owns one immutable snapshot map behind an
//! `Arc`; every write replaces the whole snapshot, so concurrent readers
//! always observe either the old or the new complete map, never a mix.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::tenant::SYSTEM_TENANT;

use super::registry::{SharedItem, TypeRegistry};
use super::stats::CacheStatistics;

/// One tenant's immutable map of cached values for a single type.
pub(crate) type Snapshot = Arc<HashMap<String, SharedItem>>;

/// The concurrent, tenant- and type-partitioned cache store.
///
/// Cloning is cheap and shares the underlying maps. Read accessors never
/// block on a concurrent refresh; they operate on whichever snapshot is
/// currently installed.
#[derive(Clone)]
pub struct MultiTypeCache {
    registry: TypeRegistry,
    // tenant_id -> type_id -> snapshot
    tenants: Arc<DashMap<String, DashMap<String, Snapshot>>>,
    stats: CacheStatistics,
}

impl MultiTypeCache {
    /// Create a store backed by the given registry.
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            tenants: Arc::new(DashMap::new()),
            stats: CacheStatistics::new(),
        }
    }

    /// The registry governing this store.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Live statistics handle.
    pub fn statistics(&self) -> CacheStatistics {
        self.stats.clone()
    }

    /// Insert or overwrite one value.
    ///
    /// Empty `type_id`, `item_id`, or `tenant_id` turn the call into a
    /// silent no-op: nothing is stored and no statistic moves.
    pub fn put<T>(&self, type_id: &str, item_id: &str, tenant_id: &str, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.put_shared(type_id, item_id, tenant_id, Arc::new(value));
    }

    pub(crate) fn put_shared(
        &self,
        type_id: &str,
        item_id: &str,
        tenant_id: &str,
        value: SharedItem,
    ) {
        if type_id.is_empty() || item_id.is_empty() || tenant_id.is_empty() {
            warn!("Ignoring cache put with missing type, id, or tenant");
            return;
        }

        let types = self.tenants.entry(tenant_id.to_string()).or_default();
        {
            let mut snapshot = types
                .entry(type_id.to_string())
                .or_insert_with(|| Arc::new(HashMap::new()));
            let mut next: HashMap<String, SharedItem> = (**snapshot).clone();
            next.insert(item_id.to_string(), value);
            *snapshot = Arc::new(next);
        }
        drop(types);

        self.stats.for_type(type_id).record_update();
        debug!(
            "Cached value for type: {}, id: {}, tenant: {}",
            type_id, item_id, tenant_id
        );
    }

    /// Look up a value, falling back to the system tenant when the type's
    /// registration enables inheritance.
    ///
    /// Exactly one hit or one miss is recorded per call, on the lookup
    /// path that finally resolved. Unregistered types return `None`
    /// without touching statistics.
    pub fn get_with_inheritance<T>(&self, item_id: &str, tenant_id: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        if item_id.is_empty() || tenant_id.is_empty() {
            return None;
        }
        let config = self.registry.config_for::<T>()?;
        let stats = self.stats.for_type(&config.type_id);

        if let Some(value) = self.lookup::<T>(&config.type_id, tenant_id, item_id) {
            stats.record_hit();
            return Some(value);
        }

        if config.inherit_from_system_tenant && tenant_id != SYSTEM_TENANT {
            if let Some(value) = self.lookup::<T>(&config.type_id, SYSTEM_TENANT, item_id) {
                stats.record_hit();
                return Some(value);
            }
        }

        stats.record_miss();
        None
    }

    /// All values visible to `tenant_id` that match `predicate`, with
    /// override-wins inheritance: an item present in both the tenant and
    /// the system tenant contributes only the tenant-specific version.
    pub fn values_by_predicate_with_inheritance<T, P>(
        &self,
        tenant_id: &str,
        predicate: P,
    ) -> Vec<Arc<T>>
    where
        T: Send + Sync + 'static,
        P: Fn(&T) -> bool,
    {
        let Some(config) = self.registry.config_for::<T>() else {
            return Vec::new();
        };

        let mut merged: HashMap<String, Arc<T>> = HashMap::new();
        if config.inherit_from_system_tenant && tenant_id != SYSTEM_TENANT {
            self.collect_typed::<T>(&config.type_id, SYSTEM_TENANT, &mut merged);
        }
        self.collect_typed::<T>(&config.type_id, tenant_id, &mut merged);

        merged
            .into_values()
            .filter(|value| predicate(value))
            .collect()
    }

    /// The tenant's own map for type `T`, without inheritance.
    ///
    /// Returns an owned snapshot; mutating it has no effect on the cache.
    pub fn tenant_cache<T>(&self, tenant_id: &str) -> HashMap<String, Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let Some(config) = self.registry.config_for::<T>() else {
            return HashMap::new();
        };
        let mut map = HashMap::new();
        self.collect_typed::<T>(&config.type_id, tenant_id, &mut map);
        map
    }

    /// Delete one entry if present. Absent entries are not an error.
    pub fn remove(&self, type_id: &str, item_id: &str, tenant_id: &str) {
        if type_id.is_empty() || item_id.is_empty() || tenant_id.is_empty() {
            return;
        }
        let Some(types) = self.tenants.get(tenant_id) else {
            return;
        };
        let Some(mut snapshot) = types.get_mut(type_id) else {
            return;
        };
        if !snapshot.contains_key(item_id) {
            return;
        }
        let mut next: HashMap<String, SharedItem> = (**snapshot).clone();
        next.remove(item_id);
        *snapshot = Arc::new(next);
        debug!(
            "Removed from cache - type: {}, id: {}, tenant: {}",
            type_id, item_id, tenant_id
        );
    }

    /// Remove every cached map for a tenant, across all types.
    pub fn clear(&self, tenant_id: &str) {
        if tenant_id.is_empty() {
            return;
        }
        self.tenants.remove(tenant_id);
        debug!("Cleared cache for tenant: {}", tenant_id);
    }

    /// Current snapshot for `(type_id, tenant_id)`, if any.
    pub(crate) fn snapshot(&self, type_id: &str, tenant_id: &str) -> Option<Snapshot> {
        let types = self.tenants.get(tenant_id)?;
        let snapshot = types.get(type_id)?;
        Some(Arc::clone(snapshot.value()))
    }

    /// Current snapshot for `(type_id, tenant_id)`, empty if absent.
    pub(crate) fn snapshot_or_empty(&self, type_id: &str, tenant_id: &str) -> Snapshot {
        self.snapshot(type_id, tenant_id)
            .unwrap_or_else(|| Arc::new(HashMap::new()))
    }

    /// Atomically install a whole new map for `(type_id, tenant_id)`.
    pub(crate) fn replace_snapshot(
        &self,
        type_id: &str,
        tenant_id: &str,
        map: HashMap<String, SharedItem>,
    ) -> Snapshot {
        let snapshot: Snapshot = Arc::new(map);
        let types = self.tenants.entry(tenant_id.to_string()).or_default();
        types.insert(type_id.to_string(), Arc::clone(&snapshot));
        snapshot
    }

    fn lookup<T>(&self, type_id: &str, tenant_id: &str, item_id: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let snapshot = self.snapshot(type_id, tenant_id)?;
        let value = snapshot.get(item_id)?;
        Arc::clone(value).downcast::<T>().ok()
    }

    fn collect_typed<T>(&self, type_id: &str, tenant_id: &str, into: &mut HashMap<String, Arc<T>>)
    where
        T: Send + Sync + 'static,
    {
        let Some(snapshot) = self.snapshot(type_id, tenant_id) else {
            return;
        };
        for (id, value) in snapshot.iter() {
            if let Ok(typed) = Arc::clone(value).downcast::<T>() {
                into.insert(id.clone(), typed);
            }
        }
    }
}

impl std::fmt::Debug for MultiTypeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiTypeCache")
            .field("tenant_count", &self.tenants.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TypeConfig;

    #[derive(Clone, Debug, PartialEq)]
    struct Widget {
        id: String,
        v: i64,
    }

    fn widget(id: &str, v: i64) -> Widget {
        Widget { id: id.into(), v }
    }

    fn cache_with_widget_type(inherit: bool) -> MultiTypeCache {
        let registry = TypeRegistry::new();
        registry.register(
            TypeConfig::<Widget>::builder("widget")
                .inherit_from_system_tenant(inherit)
                .id_extractor(|w: &Widget| w.id.clone())
                .build()
                .unwrap(),
        );
        MultiTypeCache::new(registry)
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let cache = cache_with_widget_type(false);
        cache.put("widget", "w1", "tenant-a", widget("w1", 1));

        let value = cache.get_with_inheritance::<Widget>("w1", "tenant-a").unwrap();
        assert_eq!(*value, widget("w1", 1));
    }

    #[test]
    fn test_fallback_to_system_tenant() {
        let cache = cache_with_widget_type(true);
        cache.put("widget", "w1", SYSTEM_TENANT, widget("w1", 1));

        let value = cache.get_with_inheritance::<Widget>("w1", "tenant-a").unwrap();
        assert_eq!(*value, widget("w1", 1));
    }

    #[test]
    fn test_tenant_override_wins_over_system() {
        let cache = cache_with_widget_type(true);
        cache.put("widget", "w1", SYSTEM_TENANT, widget("w1", 1));
        cache.put("widget", "w1", "tenant-a", widget("w1", 2));

        let value = cache.get_with_inheritance::<Widget>("w1", "tenant-a").unwrap();
        assert_eq!(value.v, 2);
    }

    #[test]
    fn test_no_inheritance_means_no_fallback() {
        let cache = cache_with_widget_type(false);
        cache.put("widget", "w1", SYSTEM_TENANT, widget("w1", 1));

        assert!(cache.get_with_inheritance::<Widget>("w1", "tenant-a").is_none());
    }

    #[test]
    fn test_unregistered_type_is_not_found_and_unaccounted() {
        let cache = cache_with_widget_type(false);

        #[derive(Clone, PartialEq)]
        struct Unregistered;
        assert!(cache.get_with_inheritance::<Unregistered>("x", "tenant-a").is_none());
        assert!(cache.statistics().all().is_empty());
    }

    #[test]
    fn test_put_with_missing_parts_is_silent_noop() {
        let cache = cache_with_widget_type(false);
        cache.put("", "w1", "tenant-a", widget("w1", 1));
        cache.put("widget", "", "tenant-a", widget("w1", 1));
        cache.put("widget", "w1", "", widget("w1", 1));

        assert!(cache.statistics().get("widget").is_none());
        assert!(cache.tenant_cache::<Widget>("tenant-a").is_empty());
    }

    #[test]
    fn test_statistics_consistency() {
        let cache = cache_with_widget_type(true);
        cache.put("widget", "w1", "tenant-a", widget("w1", 1));
        cache.put("widget", "w2", "tenant-a", widget("w2", 2));
        cache.put("widget", "w2", "tenant-a", widget("w2", 3));

        // Two hits, one of them through inheritance.
        cache.put("widget", "s1", SYSTEM_TENANT, widget("s1", 9));
        assert!(cache.get_with_inheritance::<Widget>("w1", "tenant-a").is_some());
        assert!(cache.get_with_inheritance::<Widget>("s1", "tenant-a").is_some());
        // One miss.
        assert!(cache.get_with_inheritance::<Widget>("absent", "tenant-a").is_none());

        let stats = cache.statistics().get("widget").unwrap();
        assert_eq!(stats.updates, 4);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);

        cache.statistics().reset();
        assert!(cache.statistics().get("widget").is_none());
    }

    #[test]
    fn test_remove_is_scoped_and_tolerates_absence() {
        let cache = cache_with_widget_type(false);
        cache.put("widget", "w1", "tenant-a", widget("w1", 1));
        cache.put("widget", "w1", "tenant-b", widget("w1", 2));

        cache.remove("widget", "w1", "tenant-a");
        cache.remove("widget", "missing", "tenant-a");
        cache.remove("widget", "w1", "tenant-c");

        assert!(cache.get_with_inheritance::<Widget>("w1", "tenant-a").is_none());
        assert!(cache.get_with_inheritance::<Widget>("w1", "tenant-b").is_some());
    }

    #[test]
    fn test_clear_is_tenant_scoped() {
        let cache = cache_with_widget_type(false);
        cache.put("widget", "w1", "tenant-a", widget("w1", 1));
        cache.put("widget", "w1", "tenant-b", widget("w1", 2));

        cache.clear("tenant-a");

        assert!(cache.get_with_inheritance::<Widget>("w1", "tenant-a").is_none());
        assert_eq!(
            cache.get_with_inheritance::<Widget>("w1", "tenant-b").unwrap().v,
            2
        );
    }

    #[test]
    fn test_end_to_end_widget_scenario() {
        let cache = cache_with_widget_type(true);

        cache.put("widget", "w1", SYSTEM_TENANT, widget("w1", 1));
        assert_eq!(
            *cache.get_with_inheritance::<Widget>("w1", "tenant-a").unwrap(),
            widget("w1", 1)
        );

        cache.put("widget", "w1", "tenant-a", widget("w1", 2));
        assert_eq!(
            *cache.get_with_inheritance::<Widget>("w1", "tenant-a").unwrap(),
            widget("w1", 2)
        );

        cache.clear("tenant-a");
        assert_eq!(
            *cache.get_with_inheritance::<Widget>("w1", "tenant-a").unwrap(),
            widget("w1", 1)
        );
    }

    #[test]
    fn test_predicate_aggregation_is_override_wins() {
        let cache = cache_with_widget_type(true);
        cache.put("widget", "shared", SYSTEM_TENANT, widget("shared", 1));
        cache.put("widget", "shared", "tenant-a", widget("shared", 2));
        cache.put("widget", "system-only", SYSTEM_TENANT, widget("system-only", 3));
        cache.put("widget", "tenant-only", "tenant-a", widget("tenant-only", 4));

        let values =
            cache.values_by_predicate_with_inheritance::<Widget, _>("tenant-a", |_| true);

        assert_eq!(values.len(), 3);
        let shared: Vec<_> = values.iter().filter(|w| w.id == "shared").collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].v, 2);
    }

    #[test]
    fn test_predicate_runs_after_override_merge() {
        // A tenant override that fails the predicate hides the system
        // value entirely rather than letting it leak through.
        let cache = cache_with_widget_type(true);
        cache.put("widget", "shared", SYSTEM_TENANT, widget("shared", 1));
        cache.put("widget", "shared", "tenant-a", widget("shared", 100));

        let values =
            cache.values_by_predicate_with_inheritance::<Widget, _>("tenant-a", |w| w.v < 10);
        assert!(values.is_empty());
    }

    #[test]
    fn test_predicate_without_inheritance_sees_only_tenant_values() {
        let cache = cache_with_widget_type(false);
        cache.put("widget", "s1", SYSTEM_TENANT, widget("s1", 1));
        cache.put("widget", "t1", "tenant-a", widget("t1", 2));

        let values =
            cache.values_by_predicate_with_inheritance::<Widget, _>("tenant-a", |_| true);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].id, "t1");
    }

    #[test]
    fn test_tenant_cache_is_a_detached_snapshot() {
        let cache = cache_with_widget_type(true);
        cache.put("widget", "w1", "tenant-a", widget("w1", 1));
        cache.put("widget", "s1", SYSTEM_TENANT, widget("s1", 2));

        let mut view = cache.tenant_cache::<Widget>("tenant-a");
        // No inheritance merge in the raw view.
        assert_eq!(view.len(), 1);

        view.remove("w1");
        assert!(cache.get_with_inheritance::<Widget>("w1", "tenant-a").is_some());
    }

    #[test]
    fn test_replace_snapshot_is_atomic_for_readers() {
        let cache = cache_with_widget_type(false);
        let n = 64;

        let mut initial = HashMap::new();
        for i in 0..n {
            initial.insert(
                format!("w{i}"),
                Arc::new(widget(&format!("w{i}"), 0)) as SharedItem,
            );
        }
        cache.replace_snapshot("widget", "tenant-a", initial);

        let reader = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for _ in 0..2000 {
                    let len = cache.tenant_cache::<Widget>("tenant-a").len();
                    assert_eq!(len, n, "observed a partially-swapped map");
                }
            })
        };

        for round in 1..20 {
            let mut next = HashMap::new();
            for i in 0..n {
                next.insert(
                    format!("w{i}"),
                    Arc::new(widget(&format!("w{i}"), round)) as SharedItem,
                );
            }
            cache.replace_snapshot("widget", "tenant-a", next);
        }

        reader.join().unwrap();
    }
}
