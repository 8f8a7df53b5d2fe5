//! Per-type cache configuration.
//!
//! A [`TypeConfig`] declares how one kind of cached value is identified,
//! loaded from predefined sources, inherited across tenants, and
//! periodically refreshed. Build one with [`TypeConfigBuilder`] and hand
//! it to the [`TypeRegistry`](super::TypeRegistry).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::CacheError;

/// Extracts the cache id from a value. Mandatory for every registration.
pub type IdExtractor<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Turns raw predefined-source bytes into a value.
pub type Deserializer<T> = Arc<dyn Fn(&[u8]) -> anyhow::Result<T> + Send + Sync>;

/// Bootstrap hook with access to the contributor id and source locator.
pub type SourceAwareProcessor<T> = Arc<dyn Fn(&str, &mut T, &str) + Send + Sync>;

/// Bootstrap hook with access to the contributor id only.
pub type ContributorAwareProcessor<T> = Arc<dyn Fn(&str, &mut T) + Send + Sync>;

/// Hook applied to items during refresh, or during bootstrap when no
/// higher-precedence hook is configured.
pub type PostProcessor<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Comparator over source locators, applied before bootstrap loading.
pub type SourceOrdering = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// Reads the tenant id carried by a value, if any.
pub type TenantGetter<T> = Arc<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// Writes a tenant id into a value.
pub type TenantSetter<T> = Arc<dyn Fn(&mut T, &str) + Send + Sync>;

/// Stamps the contributing plugin's id onto a value at bootstrap.
pub type ContributorBinding<T> = Arc<dyn Fn(&mut T, &str) + Send + Sync>;

/// Invoked per tenant after a refresh cycle changed that tenant's map.
pub type TenantRefreshCallback<T> =
    Arc<dyn Fn(&str, &HashMap<String, T>, &HashMap<String, T>) + Send + Sync>;

/// Invoked once after a refresh cycle changed any tenant.
pub type GlobalRefreshCallback<T> = Arc<
    dyn Fn(&HashMap<String, HashMap<String, T>>, &HashMap<String, HashMap<String, T>>)
        + Send
        + Sync,
>;

/// Configuration for one cacheable type.
///
/// Immutable once built. Re-registering the same `type_id` replaces the
/// prior configuration; already-cached values are kept as-is and follow
/// the new policy from then on.
pub struct TypeConfig<T> {
    pub(crate) type_id: String,
    pub(crate) predefined_path: Option<String>,
    pub(crate) inherit_from_system_tenant: bool,
    pub(crate) requires_refresh: bool,
    pub(crate) refresh_interval: Duration,
    pub(crate) has_predefined_items: bool,
    pub(crate) persistable: bool,
    pub(crate) id_extractor: IdExtractor<T>,
    pub(crate) deserializer: Option<Deserializer<T>>,
    pub(crate) source_aware_processor: Option<SourceAwareProcessor<T>>,
    pub(crate) contributor_aware_processor: Option<ContributorAwareProcessor<T>>,
    pub(crate) post_processor: Option<PostProcessor<T>>,
    pub(crate) source_ordering: Option<SourceOrdering>,
    pub(crate) tenant_getter: Option<TenantGetter<T>>,
    pub(crate) tenant_setter: Option<TenantSetter<T>>,
    pub(crate) contributor_binding: Option<ContributorBinding<T>>,
    pub(crate) tenant_refresh_callback: Option<TenantRefreshCallback<T>>,
    pub(crate) global_refresh_callback: Option<GlobalRefreshCallback<T>>,
}

impl<T> TypeConfig<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Start building a configuration for `type_id`.
    pub fn builder(type_id: impl Into<String>) -> TypeConfigBuilder<T> {
        TypeConfigBuilder::new(type_id)
    }

    /// The unique key grouping cached values of this kind.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }
}

/// Builder for [`TypeConfig`].
///
/// All settings are optional except the id extractor; [`build`] fails
/// with [`CacheError::Configuration`] without one.
///
/// [`build`]: TypeConfigBuilder::build
pub struct TypeConfigBuilder<T> {
    type_id: String,
    predefined_path: Option<String>,
    inherit_from_system_tenant: bool,
    requires_refresh: bool,
    refresh_interval: Duration,
    has_predefined_items: bool,
    persistable: bool,
    id_extractor: Option<IdExtractor<T>>,
    deserializer: Option<Deserializer<T>>,
    source_aware_processor: Option<SourceAwareProcessor<T>>,
    contributor_aware_processor: Option<ContributorAwareProcessor<T>>,
    post_processor: Option<PostProcessor<T>>,
    source_ordering: Option<SourceOrdering>,
    tenant_getter: Option<TenantGetter<T>>,
    tenant_setter: Option<TenantSetter<T>>,
    contributor_binding: Option<ContributorBinding<T>>,
    tenant_refresh_callback: Option<TenantRefreshCallback<T>>,
    global_refresh_callback: Option<GlobalRefreshCallback<T>>,
}

impl<T> TypeConfigBuilder<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a builder with defaults: no inheritance, no refresh,
    /// predefined items enabled, not persistable.
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            predefined_path: None,
            inherit_from_system_tenant: false,
            requires_refresh: false,
            refresh_interval: Duration::from_secs(60),
            has_predefined_items: true,
            persistable: false,
            id_extractor: None,
            deserializer: None,
            source_aware_processor: None,
            contributor_aware_processor: None,
            post_processor: None,
            source_ordering: None,
            tenant_getter: None,
            tenant_setter: None,
            contributor_binding: None,
            tenant_refresh_callback: None,
            global_refresh_callback: None,
        }
    }

    /// Set the path hint under which contributors ship predefined items.
    #[must_use]
    pub fn predefined_path(mut self, path: impl Into<String>) -> Self {
        self.predefined_path = Some(path.into());
        self
    }

    /// Enable or disable fallback to the system tenant on lookup miss.
    #[must_use]
    pub fn inherit_from_system_tenant(mut self, inherit: bool) -> Self {
        self.inherit_from_system_tenant = inherit;
        self
    }

    /// Enable periodic refresh at the given fixed-delay interval.
    #[must_use]
    pub fn refresh_every(mut self, interval: Duration) -> Self {
        self.requires_refresh = true;
        self.refresh_interval = interval;
        self
    }

    /// Declare that this type has no predefined items to bootstrap.
    #[must_use]
    pub fn no_predefined_items(mut self) -> Self {
        self.has_predefined_items = false;
        self
    }

    /// Declare whether values of this type live in the persistence backend.
    /// Only persistable types are reloaded by the scheduled refresh.
    #[must_use]
    pub fn persistable(mut self, persistable: bool) -> Self {
        self.persistable = persistable;
        self
    }

    /// Set the mandatory id extractor.
    #[must_use]
    pub fn id_extractor<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.id_extractor = Some(Arc::new(f));
        self
    }

    /// Set the deserializer used for predefined-source bytes.
    #[must_use]
    pub fn deserializer<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.deserializer = Some(Arc::new(f));
        self
    }

    /// Bootstrap hook receiving `(contributor_id, item, source_locator)`.
    /// Highest precedence; suppresses the other bootstrap hooks.
    #[must_use]
    pub fn source_aware_processor<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut T, &str) + Send + Sync + 'static,
    {
        self.source_aware_processor = Some(Arc::new(f));
        self
    }

    /// Bootstrap hook receiving `(contributor_id, item)`.
    /// Runs only when no source-aware processor is configured.
    #[must_use]
    pub fn contributor_aware_processor<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut T) + Send + Sync + 'static,
    {
        self.contributor_aware_processor = Some(Arc::new(f));
        self
    }

    /// Hook applied to every refreshed item, and to bootstrapped items
    /// when no contributor-aware hook is configured.
    #[must_use]
    pub fn post_processor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.post_processor = Some(Arc::new(f));
        self
    }

    /// Sort predefined sources by locator before loading. Use when items
    /// must apply in a fixed sequence, e.g. dependent patches.
    #[must_use]
    pub fn source_ordering<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        self.source_ordering = Some(Arc::new(f));
        self
    }

    /// Expose the value's tenant field. Items loaded at bootstrap with an
    /// empty tenant are defaulted to the system tenant through the setter.
    #[must_use]
    pub fn tenant_field<G, S>(mut self, get: G, set: S) -> Self
    where
        G: Fn(&T) -> Option<String> + Send + Sync + 'static,
        S: Fn(&mut T, &str) + Send + Sync + 'static,
    {
        self.tenant_getter = Some(Arc::new(get));
        self.tenant_setter = Some(Arc::new(set));
        self
    }

    /// Stamp the contributor id onto bootstrapped items. Types carrying
    /// this binding are tracked in the contribution tracker's described
    /// subset for introspection.
    #[must_use]
    pub fn contributor_binding<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T, &str) + Send + Sync + 'static,
    {
        self.contributor_binding = Some(Arc::new(f));
        self
    }

    /// Invoked per tenant after refresh when that tenant's map changed.
    #[must_use]
    pub fn on_tenant_refresh<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &HashMap<String, T>, &HashMap<String, T>) + Send + Sync + 'static,
    {
        self.tenant_refresh_callback = Some(Arc::new(f));
        self
    }

    /// Invoked once per refresh cycle when any tenant changed.
    #[must_use]
    pub fn on_global_refresh<F>(mut self, f: F) -> Self
    where
        F: Fn(&HashMap<String, HashMap<String, T>>, &HashMap<String, HashMap<String, T>>)
            + Send
            + Sync
            + 'static,
    {
        self.global_refresh_callback = Some(Arc::new(f));
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<TypeConfig<T>, CacheError> {
        let Some(id_extractor) = self.id_extractor else {
            return Err(CacheError::Configuration {
                type_id: self.type_id,
                reason: "id extractor is required".to_string(),
            });
        };

        Ok(TypeConfig {
            type_id: self.type_id,
            predefined_path: self.predefined_path,
            inherit_from_system_tenant: self.inherit_from_system_tenant,
            requires_refresh: self.requires_refresh,
            refresh_interval: self.refresh_interval,
            has_predefined_items: self.has_predefined_items,
            persistable: self.persistable,
            id_extractor,
            deserializer: self.deserializer,
            source_aware_processor: self.source_aware_processor,
            contributor_aware_processor: self.contributor_aware_processor,
            post_processor: self.post_processor,
            source_ordering: self.source_ordering,
            tenant_getter: self.tenant_getter,
            tenant_setter: self.tenant_setter,
            contributor_binding: self.contributor_binding,
            tenant_refresh_callback: self.tenant_refresh_callback,
            global_refresh_callback: self.global_refresh_callback,
        })
    }
}

impl<T> TypeConfigBuilder<T>
where
    T: DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a builder with the default JSON deserializer installed.
    /// Predefined sources for this type are expected to be JSON documents.
    pub fn json(type_id: impl Into<String>) -> Self {
        Self::new(type_id).deserializer(|bytes| Ok(serde_json::from_slice(bytes)?))
    }
}
