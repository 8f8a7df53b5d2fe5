//! Persistence query collaborator.
//!
//! The refresh orchestrator pulls raw items per tenant through the
//! [`ItemStore`] trait and pushes deletions back when a contributor's
//! persistable items are retracted. The backing store is owned by the
//! surrounding application; [`InMemoryItemStore`] is the crate's
//! reference implementation for embedding and tests.

mod memory;

pub use memory::InMemoryItemStore;

use crate::cache::{BoxedItem, TypeDescriptor};

/// Supplies raw items for a tenant and removes items on retraction.
///
/// Implementations must scope `load_items_for_tenant` strictly to the
/// requested tenant; inheritance merging is the orchestrator's job.
/// Values are returned type-erased: produce the concrete type named by
/// the descriptor, or the orchestrator will skip the item with a warning.
pub trait ItemStore: Send + Sync {
    /// Load every item of the described type belonging to `tenant_id`.
    fn load_items_for_tenant(
        &self,
        tenant_id: &str,
        descriptor: &TypeDescriptor,
    ) -> anyhow::Result<Vec<BoxedItem>>;

    /// Remove one item of the described type, across tenants.
    fn remove(&self, item_id: &str, descriptor: &TypeDescriptor) -> anyhow::Result<()>;
}
