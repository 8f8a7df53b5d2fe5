//! Refresh orchestration.
//!
//! Drives the three write paths of the cache: predefined-item bootstrap
//! when a contributor loads, periodic per-type refresh from persistence,
//! and bulk retraction when a contributor unloads. Failures are isolated
//! per source locator and per tenant; one broken unit never aborts its
//! siblings.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache::{
    ErasedDeserializer, ErasedTypeConfig, ErasedValueEq, MultiTypeCache, SharedItem, Snapshot,
    TypeRegistry,
};
use crate::error::CacheError;
use crate::persist::ItemStore;
use crate::sources::{ContributorLifecycle, PredefinedSource, SourceProvider};
use crate::tenant::{SYSTEM_TENANT, TenantDirectory};

use super::contributions::{ContributedItem, ContributionTracker};
use super::scheduler::FixedDelayScheduler;

/// Result of refreshing one tenant of one type.
struct TenantOutcome {
    old: Snapshot,
    new: Snapshot,
    changed: bool,
}

/// Loads, refreshes, and retracts cached items on behalf of the store.
///
/// Cloning is cheap and shares all state; scheduled tasks hold a clone.
#[derive(Clone)]
pub struct RefreshOrchestrator {
    registry: TypeRegistry,
    cache: MultiTypeCache,
    items: Arc<dyn ItemStore>,
    sources: Arc<dyn SourceProvider>,
    tenants: Arc<dyn TenantDirectory>,
    scheduler: Arc<dyn FixedDelayScheduler>,
    tracker: ContributionTracker,
}

impl RefreshOrchestrator {
    /// Wire an orchestrator to its collaborators. The registry is shared
    /// with the cache it was built from.
    pub fn new(
        cache: MultiTypeCache,
        items: Arc<dyn ItemStore>,
        sources: Arc<dyn SourceProvider>,
        tenants: Arc<dyn TenantDirectory>,
        scheduler: Arc<dyn FixedDelayScheduler>,
    ) -> Self {
        Self {
            registry: cache.registry().clone(),
            cache,
            items,
            sources,
            tenants,
            scheduler,
            tracker: ContributionTracker::new(),
        }
    }

    /// Bookkeeping of which contributor supplied which cached items.
    pub fn tracker(&self) -> &ContributionTracker {
        &self.tracker
    }

    /// Run an initial refresh pass over every registered type, then
    /// schedule the periodic fixed-delay refresh tasks.
    ///
    /// Call once after registering type configurations. The initial pass
    /// makes persisted data available immediately instead of waiting for
    /// the first scheduled cycle.
    pub fn start(&self) {
        for config in self.registry.all() {
            self.refresh_type_config(&config);
        }

        for config in self.registry.all() {
            if !config.requires_refresh {
                continue;
            }
            let name = format!("cache-refresh-{}", config.type_id);
            let orchestrator = self.clone();
            let type_id = config.type_id.clone();
            self.scheduler.schedule_fixed_delay(
                &name,
                config.refresh_interval,
                config.refresh_interval,
                Arc::new(move || orchestrator.refresh_type(&type_id)),
            );
        }

        info!(
            "Refresh orchestrator started with {} registered types",
            self.registry.len()
        );
    }

    /// Refresh one type across all known tenants. No-op for types that
    /// do not require refresh.
    pub fn refresh_type(&self, type_id: &str) {
        let Some(config) = self.registry.config_by_id(type_id) else {
            debug!("Ignoring refresh for unregistered type '{}'", type_id);
            return;
        };
        self.refresh_type_config(&config);
    }

    fn refresh_type_config(&self, config: &ErasedTypeConfig) {
        if !config.requires_refresh {
            return;
        }
        // Non-persistable types have nothing to reload; swapping in an
        // empty map would wipe their bootstrapped items.
        if !config.persistable {
            debug!(
                "Type '{}' is not persistable, keeping current snapshots",
                config.type_id
            );
            return;
        }

        let mut outcomes: Vec<(String, TenantOutcome)> = Vec::new();
        let mut changed_any = false;

        for tenant_id in self.tenant_ids() {
            match self.refresh_tenant(config, &tenant_id) {
                Ok(outcome) => {
                    if outcome.changed {
                        changed_any = true;
                        if let Some(callback) = &config.tenant_refresh {
                            callback(&tenant_id, &outcome.old, &outcome.new);
                        }
                    }
                    outcomes.push((tenant_id, outcome));
                }
                Err(e) => {
                    error!("{}", e);
                    self.cache
                        .statistics()
                        .for_type(&config.type_id)
                        .record_indexing_error();
                }
            }
        }

        if changed_any && let Some(callback) = &config.global_refresh {
            let mut old_all: HashMap<String, HashMap<String, SharedItem>> = HashMap::new();
            let mut new_all: HashMap<String, HashMap<String, SharedItem>> = HashMap::new();
            for (tenant_id, outcome) in &outcomes {
                if !outcome.old.is_empty() {
                    old_all.insert(tenant_id.clone(), (*outcome.old).clone());
                }
                if !outcome.new.is_empty() {
                    new_all.insert(tenant_id.clone(), (*outcome.new).clone());
                }
            }
            callback(&old_all, &new_all);
        }
    }

    /// Reload one tenant's items, merge in inherited system items, and
    /// atomically swap the tenant's snapshot when its content changed.
    fn refresh_tenant(
        &self,
        config: &ErasedTypeConfig,
        tenant_id: &str,
    ) -> Result<TenantOutcome, CacheError> {
        let descriptor = config.descriptor();
        let mut items = self
            .items
            .load_items_for_tenant(tenant_id, &descriptor)
            .map_err(|e| CacheError::refresh(&config.type_id, tenant_id, format!("{e:#}")))?;

        if config.inherit_from_system_tenant && tenant_id != SYSTEM_TENANT {
            let tenant_item_ids: HashSet<String> = items
                .iter()
                .filter_map(|item| (config.extract_id)(item.as_ref()))
                .collect();
            let system_items = self
                .items
                .load_items_for_tenant(SYSTEM_TENANT, &descriptor)
                .map_err(|e| CacheError::refresh(&config.type_id, tenant_id, format!("{e:#}")))?;
            // Keep a system item only if no tenant item overrides its id.
            for item in system_items {
                match (config.extract_id)(item.as_ref()) {
                    Some(id) if !tenant_item_ids.contains(&id) => items.push(item),
                    _ => {}
                }
            }
        }

        let stats = self.cache.statistics().for_type(&config.type_id);
        let mut next: HashMap<String, SharedItem> = HashMap::with_capacity(items.len());
        for mut item in items {
            if let Some(post) = &config.post_process {
                post(item.as_mut());
            }
            let Some(item_id) = (config.extract_id)(item.as_ref()) else {
                warn!(
                    "Dropping refreshed item of unexpected type for '{}'",
                    config.type_id
                );
                continue;
            };
            if item_id.is_empty() {
                stats.record_validation_failure();
                warn!("Dropping refreshed {} item with empty id", config.type_id);
                continue;
            }
            next.insert(item_id, Arc::from(item));
        }

        let old = self.cache.snapshot_or_empty(&config.type_id, tenant_id);
        let changed = !snapshots_equal(&old, &next, &config.values_equal);
        let new = if changed {
            self.cache
                .replace_snapshot(&config.type_id, tenant_id, next)
        } else {
            Arc::clone(&old)
        };

        Ok(TenantOutcome { old, new, changed })
    }

    /// Load every predefined item a contributor ships for one type.
    fn load_predefined_for_type(&self, config: &ErasedTypeConfig, contributor_id: &str) {
        if !config.has_predefined_items {
            return;
        }
        let Some(path) = &config.predefined_path else {
            return;
        };

        let mut sources = match self.sources.list_predefined_sources(contributor_id, path) {
            Ok(sources) => sources,
            Err(e) => {
                error!(
                    "Error listing predefined {} sources for contributor '{}': {:#}",
                    config.type_name, contributor_id, e
                );
                return;
            }
        };
        if sources.is_empty() {
            return;
        }

        let Some(deserialize) = &config.deserialize else {
            warn!(
                "Type '{}' ships predefined sources but has no deserializer, skipping",
                config.type_id
            );
            return;
        };

        if let Some(ordering) = &config.source_ordering {
            sources.sort_by(|a, b| ordering(&a.locator, &b.locator));
        }

        for source in sources {
            debug!(
                "Found predefined {} at {}, loading...",
                config.type_name, source.locator
            );
            if let Err(e) = self.load_predefined_source(config, contributor_id, deserialize, &source)
            {
                error!("{}", e);
            }
        }
    }

    fn load_predefined_source(
        &self,
        config: &ErasedTypeConfig,
        contributor_id: &str,
        deserialize: &ErasedDeserializer,
        source: &PredefinedSource,
    ) -> Result<(), CacheError> {
        let mut item = deserialize(&source.bytes)
            .map_err(|e| CacheError::load(&source.locator, format!("{e:#}")))?;

        // Items without a tenant belong to the system tenant.
        let tenant_id = match &config.bind_tenant {
            Some(bind) => bind(item.as_mut()).unwrap_or_else(|| SYSTEM_TENANT.to_string()),
            None => SYSTEM_TENANT.to_string(),
        };
        if let Some(bind) = &config.bind_contributor {
            bind(item.as_mut(), contributor_id);
        }

        // Exactly one bootstrap hook runs, in fixed precedence order.
        if let Some(hook) = &config.source_aware {
            hook(contributor_id, item.as_mut(), &source.locator);
        } else if let Some(hook) = &config.contributor_aware {
            hook(contributor_id, item.as_mut());
        } else if let Some(hook) = &config.post_process {
            hook(item.as_mut());
        }

        let Some(item_id) = (config.extract_id)(item.as_ref()) else {
            return Err(CacheError::load(
                &source.locator,
                "deserializer produced a value of an unexpected type",
            ));
        };
        if item_id.is_empty() {
            self.cache
                .statistics()
                .for_type(&config.type_id)
                .record_validation_failure();
            return Err(CacheError::load(&source.locator, "item has an empty id"));
        }

        let value: SharedItem = Arc::from(item);
        self.tracker.record(
            contributor_id,
            ContributedItem {
                type_id: config.type_id.clone(),
                item_id: item_id.clone(),
                tenant_id: tenant_id.clone(),
                persistable: config.persistable,
                value: Arc::clone(&value),
            },
            config.bind_contributor.is_some(),
        );
        self.cache
            .put_shared(&config.type_id, &item_id, &tenant_id, value);

        info!("Predefined {} registered: {}", config.type_name, item_id);
        Ok(())
    }

    fn tenant_ids(&self) -> Vec<String> {
        let mut tenants = self.tenants.all_tenants();
        if !tenants.iter().any(|t| t == SYSTEM_TENANT) {
            tenants.push(SYSTEM_TENANT.to_string());
        }
        tenants
    }
}

impl ContributorLifecycle for RefreshOrchestrator {
    /// Bootstrap every predefined item the contributor ships.
    fn contributor_loaded(&self, contributor_id: &str) {
        info!("Contributor '{}' loaded", contributor_id);
        for config in self.registry.all() {
            self.load_predefined_for_type(&config, contributor_id);
        }
    }

    /// Retract every item the contributor supplied: drop it from the
    /// cache and, for persistable types, from the persistence backend.
    fn contributor_unloaded(&self, contributor_id: &str) {
        let items = self.tracker.take(contributor_id);
        for item in &items {
            self.cache.remove(&item.type_id, &item.item_id, &item.tenant_id);
            if item.persistable && let Some(config) = self.registry.config_by_id(&item.type_id) {
                if let Err(e) = self.items.remove(&item.item_id, &config.descriptor()) {
                    error!(
                        "Error removing {} '{}' on contributor unload: {:#}",
                        item.type_id, item.item_id, e
                    );
                }
            }
        }
        info!(
            "Contributor '{}' unloaded, {} contributed items retracted",
            contributor_id,
            items.len()
        );
    }
}

impl std::fmt::Debug for RefreshOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshOrchestrator")
            .field("registered_types", &self.registry.len())
            .finish()
    }
}

fn snapshots_equal(
    old: &HashMap<String, SharedItem>,
    new: &HashMap<String, SharedItem>,
    values_equal: &ErasedValueEq,
) -> bool {
    old.len() == new.len()
        && old
            .iter()
            .all(|(id, value)| new.get(id).is_some_and(|other| values_equal(value, other)))
}
