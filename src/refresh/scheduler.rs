//! Fixed-delay scheduling contract and the default tokio implementation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

/// A task that can be run repeatedly by a scheduler.
pub type ScheduledTask = Arc<dyn Fn() + Send + Sync>;

/// Schedules recurring tasks with fixed-delay semantics: the next run
/// starts `period` after the previous run completes, not on a fixed-rate
/// clock. A run that fails is logged and skipped; the schedule survives.
pub trait FixedDelayScheduler: Send + Sync {
    fn schedule_fixed_delay(
        &self,
        name: &str,
        initial_delay: Duration,
        period: Duration,
        task: ScheduledTask,
    );
}

/// [`FixedDelayScheduler`] backed by the tokio runtime.
///
/// Tasks are synchronous and may block on collaborator I/O, so each run
/// executes on the blocking pool. Must be created inside a runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl FixedDelayScheduler for TokioScheduler {
    fn schedule_fixed_delay(
        &self,
        name: &str,
        initial_delay: Duration,
        period: Duration,
        task: ScheduledTask,
    ) {
        let name = name.to_string();
        debug!("Scheduling task '{}' every {:?} (fixed delay)", name, period);
        tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                let run = {
                    let task = Arc::clone(&task);
                    tokio::task::spawn_blocking(move || task())
                };
                if let Err(e) = run.await {
                    error!("Scheduled task '{}' panicked: {}", name, e);
                }
                tokio::time::sleep(period).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_task_runs_repeatedly() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        TokioScheduler::new().schedule_fixed_delay(
            "test-task",
            Duration::from_millis(1),
            Duration::from_millis(5),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_cancel_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        TokioScheduler::new().schedule_fixed_delay(
            "test-panic",
            Duration::from_millis(1),
            Duration::from_millis(5),
            Arc::new(move || {
                let run = counter.fetch_add(1, Ordering::SeqCst);
                if run == 0 {
                    panic!("first run fails");
                }
            }),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
