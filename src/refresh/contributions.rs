//! Contribution tracking.
//!
//! Records which contributor supplied which cached items so they can be
//! retracted in bulk when that contributor unloads. Append-only per
//! contributor; duplicates are kept on purpose, so retraction removes
//! every tracked entry rather than deduplicating by id.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cache::SharedItem;

/// One item supplied by a contributor.
#[derive(Clone)]
pub struct ContributedItem {
    pub type_id: String,
    pub item_id: String,
    pub tenant_id: String,
    pub persistable: bool,
    pub value: SharedItem,
}

impl std::fmt::Debug for ContributedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributedItem")
            .field("type_id", &self.type_id)
            .field("item_id", &self.item_id)
            .field("tenant_id", &self.tenant_id)
            .field("persistable", &self.persistable)
            .finish()
    }
}

/// Bookkeeping of contributor-supplied items.
///
/// Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct ContributionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Default)]
struct TrackerInner {
    contributions: DashMap<String, Vec<ContributedItem>>,
    // Subset of contributions whose type carries a contributor binding,
    // kept separately for introspection.
    described: DashMap<String, Vec<ContributedItem>>,
}

impl ContributionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an item under its contributor. `described` marks items of
    /// types that expose the plugin-describable capability.
    pub fn record(&self, contributor_id: &str, item: ContributedItem, described: bool) {
        if described {
            self.inner
                .described
                .entry(contributor_id.to_string())
                .or_default()
                .push(item.clone());
        }
        self.inner
            .contributions
            .entry(contributor_id.to_string())
            .or_default()
            .push(item);
    }

    /// All items a contributor supplied, in insertion order.
    pub fn items_for(&self, contributor_id: &str) -> Vec<ContributedItem> {
        self.inner
            .contributions
            .get(contributor_id)
            .map(|items| items.value().clone())
            .unwrap_or_default()
    }

    /// The describable subset of a contributor's items.
    pub fn described_by(&self, contributor_id: &str) -> Vec<ContributedItem> {
        self.inner
            .described
            .get(contributor_id)
            .map(|items| items.value().clone())
            .unwrap_or_default()
    }

    /// Remove and return everything a contributor supplied.
    pub fn take(&self, contributor_id: &str) -> Vec<ContributedItem> {
        self.inner.described.remove(contributor_id);
        self.inner
            .contributions
            .remove(contributor_id)
            .map(|(_, items)| items)
            .unwrap_or_default()
    }

    /// Contributors with at least one tracked item.
    pub fn contributors(&self) -> Vec<String> {
        self.inner
            .contributions
            .iter()
            .map(|e| e.key().clone())
            .collect()
    }
}

impl std::fmt::Debug for ContributionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributionTracker")
            .field("contributors", &self.contributors())
            .finish()
    }
}
