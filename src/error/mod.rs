//! Error types for the caching engine.
//!
//! Failures are isolated per unit of work: a registration error is fatal
//! only to that registration, a load error only to that source, a refresh
//! error only to that tenant's cycle. Nothing escapes a read accessor.

use thiserror::Error;

/// Errors produced by the caching engine.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A type registration was invalid (currently: missing id extractor).
    #[error("invalid registration for type '{type_id}': {reason}")]
    Configuration { type_id: String, reason: String },

    /// A predefined item could not be deserialized or processed.
    /// Logged and skipped during bootstrap; sibling sources still load.
    #[error("failed to load predefined item from '{locator}': {reason}")]
    Load { locator: String, reason: String },

    /// A refresh cycle failed for one tenant of one type.
    /// Logged and counted; the stale snapshot stays until the next cycle.
    #[error("refresh failed for type '{type_id}' in tenant '{tenant_id}': {reason}")]
    Refresh {
        type_id: String,
        tenant_id: String,
        reason: String,
    },
}

impl CacheError {
    /// Build a load error from any underlying failure.
    pub(crate) fn load(locator: &str, source: impl std::fmt::Display) -> Self {
        Self::Load {
            locator: locator.to_string(),
            reason: source.to_string(),
        }
    }

    /// Build a refresh error from any underlying failure.
    pub(crate) fn refresh(type_id: &str, tenant_id: &str, source: impl std::fmt::Display) -> Self {
        Self::Refresh {
            type_id: type_id.to_string(),
            tenant_id: tenant_id.to_string(),
            reason: source.to_string(),
        }
    }
}
