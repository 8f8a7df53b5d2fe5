//! Predefined-item sources and contributor lifecycle.
//!
//! Contributors (plugins, modules, bundles) ship predefined items as
//! opaque byte streams. A [`SourceProvider`] enumerates them for the
//! refresh orchestrator; the orchestrator implements
//! [`ContributorLifecycle`] so the surrounding plugin system can notify
//! it when contributors come and go.

mod fs;

pub use fs::FsSourceProvider;

/// One predefined item as shipped by a contributor.
#[derive(Debug, Clone)]
pub struct PredefinedSource {
    /// Stable identifier of the source, used for ordering and diagnostics.
    pub locator: String,
    /// Raw item bytes; the per-type deserializer interprets them.
    pub bytes: Vec<u8>,
}

impl PredefinedSource {
    pub fn new(locator: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            locator: locator.into(),
            bytes: bytes.into(),
        }
    }
}

/// Enumerates predefined-item sources shipped by a contributor.
pub trait SourceProvider: Send + Sync {
    /// The sources a contributor ships under `path`, in the order they
    /// should apply when the type declares no explicit ordering.
    fn list_predefined_sources(
        &self,
        contributor_id: &str,
        path: &str,
    ) -> anyhow::Result<Vec<PredefinedSource>>;
}

/// Lifecycle notifications for contributors.
///
/// Loading a contributor bootstraps its predefined items; unloading it
/// retracts every item it contributed.
pub trait ContributorLifecycle {
    fn contributor_loaded(&self, contributor_id: &str);
    fn contributor_unloaded(&self, contributor_id: &str);
}
