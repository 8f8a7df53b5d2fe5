//! Cache module - multi-tenant, type-polymorphic caching.
//!
//! The cache system follows a registry pattern:
//! - `TypeRegistry` - central registry of per-type configurations
//! - `TypeConfig` / `TypeConfigBuilder` - how one kind of value is
//!   identified, loaded, inherited, and refreshed
//! - `MultiTypeCache` - the tenant- and type-partitioned store with
//!   inheritance-aware reads and per-type statistics
//!
//! Values of any `T: Clone + PartialEq + Send + Sync + 'static` can be
//! cached; the registry erases the concrete type once at registration so
//! the store and the refresh orchestrator share a single code path.

mod config;
mod registry;
mod stats;
mod store;

pub use config::{
    ContributorAwareProcessor, ContributorBinding, Deserializer, GlobalRefreshCallback,
    IdExtractor, PostProcessor, SourceAwareProcessor, SourceOrdering, TenantGetter,
    TenantRefreshCallback, TenantSetter, TypeConfig, TypeConfigBuilder,
};
pub use registry::{BoxedItem, SharedItem, TypeDescriptor, TypeRegistry};
pub use stats::{CacheStatistics, TypeStats, TypeStatsSnapshot};
pub use store::MultiTypeCache;

pub(crate) use registry::{ErasedDeserializer, ErasedTypeConfig, ErasedValueEq};
pub(crate) use store::Snapshot;
