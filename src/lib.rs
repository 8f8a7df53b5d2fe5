//! Strata - multi-tenant, type-polymorphic caching and refresh engine.
//!
//! A registry lets arbitrary item types declare how they are identified,
//! loaded, inherited across tenants, and periodically refreshed; the
//! engine stores, looks up, and refreshes cached values under that
//! contract.
//!
//! ## Architecture
//!
//! - `cache` - type registry, per-type configuration, and the tenant-
//!   and type-partitioned store with inheritance-aware reads
//! - `refresh` - orchestrator for bootstrap loading, scheduled refresh,
//!   and contributor retraction, plus contribution tracking
//! - `sources` - predefined-item providers and contributor lifecycle
//! - `persist` - persistence query collaborator
//! - `tenant` - tenant directory and the reserved system tenant
//! - `error` - error taxonomy
//!
//! ## Example
//!
//! ```
//! use strata::{MultiTypeCache, TypeConfig, TypeRegistry, SYSTEM_TENANT};
//!
//! #[derive(Clone, PartialEq)]
//! struct Rule {
//!     id: String,
//! }
//!
//! let registry = TypeRegistry::new();
//! registry.register(
//!     TypeConfig::<Rule>::builder("rule")
//!         .inherit_from_system_tenant(true)
//!         .id_extractor(|r: &Rule| r.id.clone())
//!         .build()
//!         .unwrap(),
//! );
//!
//! let cache = MultiTypeCache::new(registry);
//! cache.put("rule", "r1", SYSTEM_TENANT, Rule { id: "r1".into() });
//!
//! // tenant-a has no override, so the system tenant's value is inherited.
//! let rule = cache.get_with_inheritance::<Rule>("r1", "tenant-a").unwrap();
//! assert_eq!(rule.id, "r1");
//! ```

pub mod cache;
pub mod error;
pub mod persist;
pub mod refresh;
pub mod sources;
pub mod tenant;

pub use cache::{
    BoxedItem, CacheStatistics, MultiTypeCache, SharedItem, TypeConfig, TypeConfigBuilder,
    TypeDescriptor, TypeRegistry, TypeStats, TypeStatsSnapshot,
};
pub use error::CacheError;
pub use persist::{InMemoryItemStore, ItemStore};
pub use refresh::{
    ContributedItem, ContributionTracker, FixedDelayScheduler, RefreshOrchestrator, ScheduledTask,
    TokioScheduler,
};
pub use sources::{ContributorLifecycle, FsSourceProvider, PredefinedSource, SourceProvider};
pub use tenant::{SYSTEM_TENANT, StaticTenantDirectory, TenantDirectory};
