//! Refresh module - bootstrap, periodic refresh, and retraction.
//!
//! The [`RefreshOrchestrator`] is the only writer that replaces whole
//! tenant snapshots: it bootstraps predefined items when contributors
//! load, reloads persistable types per tenant on a fixed-delay schedule,
//! and retracts contributions when contributors unload. The
//! [`ContributionTracker`] remembers who supplied what in between.

mod contributions;
mod orchestrator;
mod scheduler;

pub use contributions::{ContributedItem, ContributionTracker};
pub use orchestrator::RefreshOrchestrator;
pub use scheduler::{FixedDelayScheduler, ScheduledTask, TokioScheduler};
