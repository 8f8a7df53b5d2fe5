//! Type registry - central management for all cacheable type configurations.
//!
//! Every hook of a [`TypeConfig`] is resolved once at registration into a
//! type-erased closure over `dyn Any`, so the store and the refresh
//! orchestrator can drive arbitrary value types through one code path.
//! Typed accessors recover their configuration through a `TypeId` index.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::tenant::SYSTEM_TENANT;

use super::config::{SourceOrdering, TypeConfig};

/// An owned, in-flight item whose concrete type has been erased.
pub type BoxedItem = Box<dyn Any + Send + Sync>;

/// A cached value whose concrete type has been erased.
pub type SharedItem = Arc<dyn Any + Send + Sync>;

/// Identity of a registered type, handed to persistence collaborators so
/// they know which concrete values to produce.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// The registered type id.
    pub type_id: String,
    /// Rust type name of the cached values, for diagnostics.
    pub type_name: &'static str,
    /// `TypeId` of the cached values.
    pub value_type: TypeId,
}

pub(crate) type ErasedIdExtractor =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<String> + Send + Sync>;
pub(crate) type ErasedDeserializer =
    Arc<dyn Fn(&[u8]) -> anyhow::Result<BoxedItem> + Send + Sync>;
pub(crate) type ErasedSourceAware =
    Arc<dyn Fn(&str, &mut (dyn Any + Send + Sync), &str) + Send + Sync>;
pub(crate) type ErasedContributorAware =
    Arc<dyn Fn(&str, &mut (dyn Any + Send + Sync)) + Send + Sync>;
pub(crate) type ErasedPostProcessor = Arc<dyn Fn(&mut (dyn Any + Send + Sync)) + Send + Sync>;
pub(crate) type ErasedTenantBinding =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> Option<String> + Send + Sync>;
pub(crate) type ErasedContributorBinding =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), &str) + Send + Sync>;
pub(crate) type ErasedValueEq = Arc<dyn Fn(&SharedItem, &SharedItem) -> bool + Send + Sync>;
pub(crate) type ErasedTenantCallback = Arc<
    dyn Fn(&str, &HashMap<String, SharedItem>, &HashMap<String, SharedItem>) + Send + Sync,
>;
pub(crate) type ErasedGlobalCallback = Arc<
    dyn Fn(
            &HashMap<String, HashMap<String, SharedItem>>,
            &HashMap<String, HashMap<String, SharedItem>>,
        ) + Send
        + Sync,
>;

/// A [`TypeConfig`] with every typed hook wrapped for `dyn Any` values.
pub(crate) struct ErasedTypeConfig {
    pub type_id: String,
    pub type_name: &'static str,
    pub value_type: TypeId,
    pub predefined_path: Option<String>,
    pub inherit_from_system_tenant: bool,
    pub requires_refresh: bool,
    pub refresh_interval: Duration,
    pub has_predefined_items: bool,
    pub persistable: bool,
    pub extract_id: ErasedIdExtractor,
    pub deserialize: Option<ErasedDeserializer>,
    pub source_aware: Option<ErasedSourceAware>,
    pub contributor_aware: Option<ErasedContributorAware>,
    pub post_process: Option<ErasedPostProcessor>,
    pub source_ordering: Option<SourceOrdering>,
    pub bind_tenant: Option<ErasedTenantBinding>,
    pub bind_contributor: Option<ErasedContributorBinding>,
    pub values_equal: ErasedValueEq,
    pub tenant_refresh: Option<ErasedTenantCallback>,
    pub global_refresh: Option<ErasedGlobalCallback>,
}

/// Downcast an erased snapshot into a typed map for user callbacks.
fn typed_map<T>(map: &HashMap<String, SharedItem>) -> HashMap<String, T>
where
    T: Clone + Send + Sync + 'static,
{
    map.iter()
        .filter_map(|(id, value)| value.downcast_ref::<T>().map(|v| (id.clone(), v.clone())))
        .collect()
}

impl ErasedTypeConfig {
    fn from_config<T>(config: TypeConfig<T>) -> Self
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let extractor = Arc::clone(&config.id_extractor);
        let extract_id: ErasedIdExtractor = Arc::new(move |value| {
            value.downcast_ref::<T>().map(|v| extractor(v))
        });

        let deserialize: Option<ErasedDeserializer> = config.deserializer.map(|de| {
            let de = Arc::clone(&de);
            let erased: ErasedDeserializer =
                Arc::new(move |bytes: &[u8]| de(bytes).map(|item| Box::new(item) as BoxedItem));
            erased
        });

        let source_aware: Option<ErasedSourceAware> = config.source_aware_processor.map(|f| {
            let erased: ErasedSourceAware = Arc::new(move |contributor, value, locator| {
                if let Some(item) = value.downcast_mut::<T>() {
                    f(contributor, item, locator);
                }
            });
            erased
        });

        let contributor_aware: Option<ErasedContributorAware> =
            config.contributor_aware_processor.map(|f| {
                let erased: ErasedContributorAware = Arc::new(move |contributor, value| {
                    if let Some(item) = value.downcast_mut::<T>() {
                        f(contributor, item);
                    }
                });
                erased
            });

        let post_process: Option<ErasedPostProcessor> = config.post_processor.map(|f| {
            let erased: ErasedPostProcessor = Arc::new(move |value| {
                if let Some(item) = value.downcast_mut::<T>() {
                    f(item);
                }
            });
            erased
        });

        let bind_tenant: Option<ErasedTenantBinding> =
            match (config.tenant_getter, config.tenant_setter) {
                (Some(get), Some(set)) => {
                    let erased: ErasedTenantBinding = Arc::new(move |value| {
                        let Some(item) = value.downcast_mut::<T>() else {
                            return None;
                        };
                        match get(item) {
                            Some(tenant) if !tenant.is_empty() => Some(tenant),
                            _ => {
                                set(item, SYSTEM_TENANT);
                                Some(SYSTEM_TENANT.to_string())
                            }
                        }
                    });
                    Some(erased)
                }
                _ => None,
            };

        let bind_contributor: Option<ErasedContributorBinding> =
            config.contributor_binding.map(|f| {
                let erased: ErasedContributorBinding = Arc::new(move |value, contributor| {
                    if let Some(item) = value.downcast_mut::<T>() {
                        f(item, contributor);
                    }
                });
                erased
            });

        let values_equal: ErasedValueEq = Arc::new(|a, b| {
            match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        });

        let tenant_refresh: Option<ErasedTenantCallback> =
            config.tenant_refresh_callback.map(|cb| {
                let erased: ErasedTenantCallback = Arc::new(move |tenant_id, old, new| {
                    cb(tenant_id, &typed_map::<T>(old), &typed_map::<T>(new));
                });
                erased
            });

        let global_refresh: Option<ErasedGlobalCallback> =
            config.global_refresh_callback.map(|cb| {
                let erased: ErasedGlobalCallback = Arc::new(move |old, new| {
                    let old_typed: HashMap<String, HashMap<String, T>> = old
                        .iter()
                        .map(|(tenant, map)| (tenant.clone(), typed_map::<T>(map)))
                        .collect();
                    let new_typed: HashMap<String, HashMap<String, T>> = new
                        .iter()
                        .map(|(tenant, map)| (tenant.clone(), typed_map::<T>(map)))
                        .collect();
                    cb(&old_typed, &new_typed);
                });
                erased
            });

        Self {
            type_id: config.type_id,
            type_name: std::any::type_name::<T>(),
            value_type: TypeId::of::<T>(),
            predefined_path: config.predefined_path,
            inherit_from_system_tenant: config.inherit_from_system_tenant,
            requires_refresh: config.requires_refresh,
            refresh_interval: config.refresh_interval,
            has_predefined_items: config.has_predefined_items,
            persistable: config.persistable,
            extract_id,
            deserialize,
            source_aware,
            contributor_aware,
            post_process,
            source_ordering: config.source_ordering,
            bind_tenant,
            bind_contributor,
            values_equal,
            tenant_refresh,
            global_refresh,
        }
    }

    /// The descriptor handed to persistence collaborators.
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor {
            type_id: self.type_id.clone(),
            type_name: self.type_name,
            value_type: self.value_type,
        }
    }
}

/// Central registry of cacheable type configurations.
///
/// Cloning is cheap and shares the underlying state. Registering a
/// `type_id` a second time replaces the prior registration; subsequent
/// cache operations follow the new policy, and values cached under the
/// old one are neither purged nor re-validated.
#[derive(Clone)]
pub struct TypeRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    by_id: DashMap<String, Arc<ErasedTypeConfig>>,
    by_type: DashMap<TypeId, String>,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        info!("Type registry initialized");
        Self {
            inner: Arc::new(RegistryInner {
                by_id: DashMap::new(),
                by_type: DashMap::new(),
            }),
        }
    }

    /// Register a type configuration, replacing any prior registration
    /// under the same type id.
    pub fn register<T>(&self, config: TypeConfig<T>)
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let erased = Arc::new(ErasedTypeConfig::from_config(config));
        let type_id = erased.type_id.clone();

        self.inner.by_type.insert(erased.value_type, type_id.clone());
        if let Some(previous) = self.inner.by_id.insert(type_id.clone(), erased) {
            // The replaced config may have cached values of a different
            // concrete type; drop its stale index entry.
            if previous.value_type != TypeId::of::<T>() {
                self.inner
                    .by_type
                    .remove_if(&previous.value_type, |_, id| id == &previous.type_id);
            }
            debug!("Replaced registration for type '{}'", type_id);
        } else {
            debug!("Registered type '{}'", type_id);
        }
    }

    /// Look up the configuration governing values of type `T`.
    pub(crate) fn config_for<T: 'static>(&self) -> Option<Arc<ErasedTypeConfig>> {
        let type_id = self.inner.by_type.get(&TypeId::of::<T>())?.value().clone();
        self.config_by_id(&type_id)
    }

    /// Look up a configuration by its type id.
    pub(crate) fn config_by_id(&self, type_id: &str) -> Option<Arc<ErasedTypeConfig>> {
        self.inner.by_id.get(type_id).map(|c| Arc::clone(c.value()))
    }

    /// Snapshot of all registered configurations.
    pub(crate) fn all(&self) -> Vec<Arc<ErasedTypeConfig>> {
        self.inner.by_id.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Check whether a type id is registered.
    pub fn contains(&self, type_id: &str) -> bool {
        self.inner.by_id.contains_key(type_id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.inner.by_id.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.by_id.is_empty()
    }

    /// All registered type ids.
    pub fn type_ids(&self) -> Vec<String> {
        self.inner.by_id.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("type_count", &self.inner.by_id.len())
            .field("type_ids", &self.type_ids())
            .finish()
    }
}
