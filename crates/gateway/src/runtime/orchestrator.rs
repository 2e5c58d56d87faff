//! Multi-Step Orchestrator (§4.6): drives a queued Task from RUNNING to
//! a terminal status by decomposing its instruction once and then
//! running the Executor step by step, emitting progress events and
//! honoring cancellation and early-completion policy along the way.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;
use webagent_artifacts::ScreenshotPipeline;
use webagent_browser::{BrowserDriver, StepDecomposer, StepExecutor, StepOutcome};
use webagent_domain::config::BrowserConfig;
use webagent_domain::error::ErrorKind;
use webagent_domain::model::{ExecutionMode, StepRecord, StepStatus, TaskStatus};

use super::cancel::CancelMap;
use super::event_bus::{EventBus, TaskEvent};
use super::task_store::TaskStore;

pub struct Orchestrator {
    task_store: Arc<TaskStore>,
    event_bus: Arc<EventBus>,
    cancel_map: Arc<CancelMap>,
    driver: Arc<dyn BrowserDriver>,
    decomposer: Arc<dyn StepDecomposer>,
    pipeline: Arc<ScreenshotPipeline>,
    config: BrowserConfig,
    session_semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        task_store: Arc<TaskStore>,
        event_bus: Arc<EventBus>,
        cancel_map: Arc<CancelMap>,
        driver: Arc<dyn BrowserDriver>,
        decomposer: Arc<dyn StepDecomposer>,
        pipeline: Arc<ScreenshotPipeline>,
        config: BrowserConfig,
    ) -> Self {
        let session_semaphore = Arc::new(Semaphore::new(config.clamped().max_concurrent_browser_sessions));
        Self { task_store, event_bus, cancel_map, driver, decomposer, pipeline, config, session_semaphore }
    }

    /// Spawns the run loop for `task_id` on the current runtime. Returns
    /// immediately; progress is observable through the event bus and
    /// task store.
    pub fn spawn(self: &Arc<Self>, task_id: Uuid, instruction: String) {
        let this = Arc::clone(self);
        let span = tracing::info_span!("orchestrator_run", %task_id);
        tokio::spawn(async move { this.run(task_id, instruction).await }.instrument(span));
    }

    async fn run(&self, task_id: Uuid, instruction: String) {
        let Some(task) = self.task_store.get(task_id) else {
            tracing::warn!(%task_id, "orchestrator invoked for unknown task");
            return;
        };
        let cancel_token = self.cancel_map.ensure(task_id);

        let transitioned = self.task_store.transition(task_id, TaskStatus::Queued, TaskStatus::Running, |t| {
            t.started_at = Some(Utc::now());
        });
        if transitioned.is_err() {
            tracing::warn!(%task_id, "task was not QUEUED at orchestrator start");
            self.cancel_map.remove(task_id);
            return;
        }
        self.event_bus.publish(TaskEvent::TaskStarted { task_id, started_at: Utc::now(), planned_steps: 0 });

        let Ok(_permit) = self.session_semaphore.acquire().await else {
            self.fail_task(task_id, ErrorKind::Internal, "browser session semaphore closed");
            self.cancel_map.remove(task_id);
            return;
        };

        let session = match self.driver.open_session().await {
            Ok(s) => s,
            Err(e) => {
                self.fail_task(task_id, e.kind(), &e.to_string());
                self.cancel_map.remove(task_id);
                return;
            }
        };

        let steps = match self.decomposer.decompose(&instruction, task.max_steps).await {
            Ok(s) => s,
            Err(e) => {
                let _ = self.driver.close_session(session).await;
                self.fail_task(task_id, e.kind(), &e.to_string());
                self.cancel_map.remove(task_id);
                return;
            }
        };

        let mut confidence_sum = 0.0f32;
        let mut steps_completed = 0u32;
        let mut any_succeeded = false;
        let mut early_completion = false;
        let mut stop_failed = false;
        let mut last_error_kind: Option<ErrorKind> = None;

        let executor = StepExecutor::new(self.driver.as_ref(), self.pipeline.as_ref());

        for (index, step) in steps.iter().enumerate() {
            let step_number = (index + 1) as u32;

            if cancel_token.is_cancelled() {
                break;
            }

            let description = step.describe();
            let _ = self.task_store.record_step(task_id, StepRecord::pending(task_id, step_number, description.clone()));
            let _ = self.task_store.update_step(task_id, step_number, |s| {
                s.status = StepStatus::Running;
                s.started_at = Some(Utc::now());
            });
            self.event_bus.publish(TaskEvent::StepStarted { task_id, step_number, description: description.clone() });

            let started_at = Utc::now();
            let result = executor.execute(session, task_id, step_number, step).await;
            let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;

            let artifact_ids: Vec<Uuid> = result.artifacts.iter().map(|a| a.artifact_id).collect();
            for artifact in &result.artifacts {
                let _ = self.task_store.attach_artifact(task_id, artifact.clone());
                if matches!(artifact.kind, webagent_domain::model::ArtifactKind::Screenshot) {
                    self.event_bus.publish(TaskEvent::ScreenshotCaptured {
                        task_id,
                        step_number,
                        artifact_id: artifact.artifact_id,
                        public_url: artifact.public_url.clone().unwrap_or_default(),
                    });
                }
            }

            let _ = self.task_store.update_step(task_id, step_number, |s| {
                s.ended_at = Some(Utc::now());
                s.status = match result.outcome {
                    StepOutcome::Completed => StepStatus::Completed,
                    StepOutcome::Failed => StepStatus::Failed,
                };
                s.confidence = result.confidence;
                s.result_text = result.text.clone();
                s.artifact_ids = artifact_ids.clone();
                s.browser_state = result.browser_state.clone();
                s.error_kind = result.error_kind;
            });

            match result.outcome {
                StepOutcome::Completed => {
                    any_succeeded = true;
                    steps_completed += 1;
                    confidence_sum += result.confidence;
                    self.event_bus.publish(TaskEvent::StepCompleted {
                        task_id,
                        step_number,
                        confidence: result.confidence,
                        result_summary: result.text.clone(),
                        duration_ms,
                        artifact_refs: artifact_ids,
                    });
                }
                StepOutcome::Failed => {
                    last_error_kind = Some(result.error_kind.unwrap_or(ErrorKind::Internal));
                    self.event_bus.publish(TaskEvent::StepFailed {
                        task_id,
                        step_number,
                        error_kind: last_error_kind.expect("just set"),
                        message: "step execution failed".into(),
                    });
                    if task.execution_mode == ExecutionMode::MultiStep {
                        stop_failed = true;
                        break;
                    }
                }
            }

            if result.is_task_complete && task.allow_early_completion {
                early_completion = true;
                break;
            }

            if task.allow_early_completion
                && task.execution_mode == ExecutionMode::Auto
                && steps_completed > 0
                && confidence_sum / steps_completed as f32 >= self.config.clamped().early_completion_confidence
            {
                early_completion = true;
                break;
            }
        }

        let _ = self.driver.close_session(session).await;

        let terminal_status = if cancel_token.is_cancelled() {
            TaskStatus::Cancelled
        } else if stop_failed || !any_succeeded {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };

        let transition_result = self.task_store.transition(task_id, TaskStatus::Running, terminal_status, |t| {
            t.ended_at = Some(Utc::now());
            t.current_step = steps_completed;
            t.total_steps_planned = steps.len() as u32;
            if terminal_status == TaskStatus::Failed {
                t.error_kind = Some(last_error_kind.unwrap_or(ErrorKind::Internal));
            }
        });

        if let Ok(task) = transition_result {
            self.event_bus.publish(TaskEvent::TaskEnded {
                task_id,
                terminal_status: format!("{terminal_status:?}").to_uppercase(),
                ended_at: task.ended_at.unwrap_or_else(Utc::now),
                steps_completed,
                early_completion,
            });
        }

        self.cancel_map.remove(task_id);
    }

    fn fail_task(&self, task_id: Uuid, error_kind: ErrorKind, message: &str) {
        tracing::error!(%task_id, %message, "task failed before step loop");
        let result = self.task_store.transition(task_id, TaskStatus::Running, TaskStatus::Failed, |t| {
            t.ended_at = Some(Utc::now());
            t.error_kind = Some(error_kind);
        });
        if let Ok(task) = result {
            self.event_bus.publish(TaskEvent::TaskEnded {
                task_id,
                terminal_status: "FAILED".into(),
                ended_at: task.ended_at.unwrap_or_else(Utc::now),
                steps_completed: 0,
                early_completion: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use webagent_artifacts::ArtifactStore;
    use webagent_browser::{HeuristicDecomposer, PageSnapshot, SessionId, WaitCondition};
    use webagent_domain::error::{Error, Result};

    struct StubDriver;

    #[async_trait::async_trait]
    impl BrowserDriver for StubDriver {
        async fn open_session(&self) -> Result<SessionId> {
            Ok(SessionId::new())
        }
        async fn close_session(&self, _session: SessionId) -> Result<()> {
            Ok(())
        }
        async fn navigate(&self, _session: SessionId, url: &str, _timeout: StdDuration) -> Result<PageSnapshot> {
            Ok(PageSnapshot { current_url: url.to_owned(), page_title: "Example".into() })
        }
        async fn click(&self, _session: SessionId, _selector_or_text: &str, _timeout: StdDuration) -> Result<PageSnapshot> {
            Ok(PageSnapshot::default())
        }
        async fn type_text(&self, _session: SessionId, _selector: &str, _text: &str, _submit: bool) -> Result<PageSnapshot> {
            Ok(PageSnapshot::default())
        }
        async fn wait(&self, _session: SessionId, _condition: WaitCondition) -> Result<PageSnapshot> {
            Ok(PageSnapshot::default())
        }
        async fn extract_text(&self, _session: SessionId, _selector: Option<&str>) -> Result<String> {
            Ok("hello".into())
        }
        async fn scroll(&self, _session: SessionId, _down: bool) -> Result<PageSnapshot> {
            Ok(PageSnapshot::default())
        }
        async fn screenshot(&self, _session: SessionId, _full_page: bool) -> Result<webagent_artifacts::RawCapture> {
            Err(Error::ScreenshotFailed("no real browser in tests".into()))
        }
        async fn snapshot(&self, _session: SessionId) -> Result<PageSnapshot> {
            Ok(PageSnapshot::default())
        }
    }

    fn new_orchestrator() -> (tempfile::TempDir, Arc<Orchestrator>, Arc<TaskStore>) {
        let dir = tempfile::tempdir().unwrap();
        let task_store = Arc::new(TaskStore::new());
        let event_bus = Arc::new(EventBus::new(64));
        let cancel_map = Arc::new(CancelMap::new());
        let driver: Arc<dyn BrowserDriver> = Arc::new(StubDriver);
        let decomposer: Arc<dyn StepDecomposer> = Arc::new(HeuristicDecomposer::with_default_url("https://example.com"));
        let artifact_store = Arc::new(ArtifactStore::new(dir.path()));
        let pipeline = Arc::new(ScreenshotPipeline::new(artifact_store, "http://localhost:3210"));

        let orchestrator = Arc::new(Orchestrator::new(task_store.clone(), event_bus, cancel_map, driver, decomposer, pipeline, BrowserConfig::default()));
        (dir, orchestrator, task_store)
    }

    #[tokio::test]
    async fn run_completes_task_on_successful_steps() {
        let (_dir, orchestrator, task_store) = new_orchestrator();
        let task = task_store.create_task("browseWeb", serde_json::json!({}), 5, ExecutionMode::Auto, true);

        orchestrator.run(task.task_id, "go to example.com".into()).await;

        let finished = task_store.get(task.task_id).unwrap();
        assert_eq!(finished.status, TaskStatus::Completed);
        assert!(finished.current_step > 0);
    }

    #[tokio::test]
    async fn run_records_step_history() {
        let (_dir, orchestrator, task_store) = new_orchestrator();
        let task = task_store.create_task("browseWeb", serde_json::json!({}), 5, ExecutionMode::Auto, true);

        orchestrator.run(task.task_id, "go to example.com".into()).await;

        let hydrated = task_store.fetch(task.task_id).unwrap();
        assert!(!hydrated.steps.is_empty());
        assert!(hydrated.steps.iter().all(|s| s.status == StepStatus::Completed));
    }

    #[tokio::test]
    async fn cancellation_before_first_step_ends_task_cancelled() {
        let (_dir, orchestrator, task_store) = new_orchestrator();
        let task = task_store.create_task("browseWeb", serde_json::json!({}), 5, ExecutionMode::Auto, true);

        let cancel_token = orchestrator.cancel_map.ensure(task.task_id);
        cancel_token.cancel();

        orchestrator.run(task.task_id, "go to example.com".into()).await;

        let finished = task_store.get(task.task_id).unwrap();
        assert_eq!(finished.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn unknown_task_is_a_safe_noop() {
        let (_dir, orchestrator, _task_store) = new_orchestrator();
        orchestrator.run(Uuid::new_v4(), "go to example.com".into()).await;
    }
}
