//! Background sweepers: force-fail RUNNING tasks past their deadline
//! (§4.3 Timeouts) and enforce screenshot retention windows (§4.7
//! Cleanup). Both run on a fixed interval for the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use webagent_artifacts::ArtifactStore;
use webagent_domain::config::{ArtifactsConfig, BrowserConfig};

use super::event_bus::{EventBus, TaskEvent};
use super::task_store::TaskStore;

const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns the task-timeout sweeper. Never returns; intended to be
/// fire-and-forget from `run_server`.
pub fn spawn_timeout_sweeper(task_store: Arc<TaskStore>, event_bus: Arc<EventBus>, config: BrowserConfig) {
    tokio::spawn(async move {
        let config = config.clamped();
        loop {
            tokio::time::sleep(TIMEOUT_SWEEP_INTERVAL).await;
            let timed_out = task_store.sweep_timeouts(Utc::now(), |task| config.task_deadline_seconds(task.max_steps));
            for task_id in timed_out {
                tracing::warn!(%task_id, "task force-failed by timeout sweeper");
                event_bus.publish(TaskEvent::TaskEnded {
                    task_id,
                    terminal_status: "FAILED".into(),
                    ended_at: Utc::now(),
                    steps_completed: 0,
                    early_completion: false,
                });
            }
        }
    });
}

/// Spawns the screenshot-retention sweeper, using `task_store.is_live`
/// to decide the unlinked vs. task-linked retention window per artifact.
pub fn spawn_retention_sweeper(artifact_store: Arc<ArtifactStore>, task_store: Arc<TaskStore>, config: ArtifactsConfig) {
    tokio::spawn(async move {
        let unlinked_window = chrono::Duration::hours(config.screenshot_retention_hours as i64);
        let linked_window = chrono::Duration::hours(config.screenshot_retention_hours_task_linked as i64);
        loop {
            tokio::time::sleep(RETENTION_SWEEP_INTERVAL).await;
            let removed = artifact_store.sweep_retention(Utc::now(), unlinked_window, linked_window, |task_id| task_store.is_live(task_id));
            if removed > 0 {
                tracing::info!(removed, "retention sweep removed expired artifacts");
            }
        }
    });
}
