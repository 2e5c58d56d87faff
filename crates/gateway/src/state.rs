use std::sync::Arc;

use webagent_artifacts::{ArtifactStore, ScreenshotPipeline};
use webagent_browser::{BrowserDriver, StepDecomposer};
use webagent_domain::config::Config;
use webagent_registry::{DescriptionCache, ToolRegistry};

use crate::runtime::{CancelMap, EvaluationStore, EventBus, Orchestrator, TaskStore};

/// A registered tool's handler: given validated arguments and (for loopy
/// tools) a task id, runs the call. One-shot tools resolve synchronously;
/// loopy tools hand off to the orchestrator and return immediately.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call_one_shot(&self, arguments: serde_json::Value) -> webagent_domain::error::Result<serde_json::Value>;
}

/// Shared application state passed to every API handler.
///
/// Fields are grouped by concern:
/// - **Core** — config
/// - **Registry** — tool catalog, description cache
/// - **Browser** — driver, decomposer, artifact store, screenshot pipeline
/// - **Runtime** — task store, event bus, cancel map, orchestrator
#[derive(Clone)]
pub struct AppState {
    // ── Core ─────────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Registry ─────────────────────────────────────────────────────
    pub registry: Arc<ToolRegistry<Arc<dyn ToolHandler>>>,
    pub description_cache: Arc<DescriptionCache>,

    // ── Browser ──────────────────────────────────────────────────────
    pub driver: Arc<dyn BrowserDriver>,
    pub decomposer: Arc<dyn StepDecomposer>,
    pub artifact_store: Arc<ArtifactStore>,
    pub screenshot_pipeline: Arc<ScreenshotPipeline>,

    // ── Runtime ──────────────────────────────────────────────────────
    pub task_store: Arc<TaskStore>,
    pub event_bus: Arc<EventBus>,
    pub cancel_map: Arc<CancelMap>,
    pub orchestrator: Arc<Orchestrator>,
    pub evaluation_store: Arc<EvaluationStore>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        registry: Arc<ToolRegistry<Arc<dyn ToolHandler>>>,
        description_cache: Arc<DescriptionCache>,
        driver: Arc<dyn BrowserDriver>,
        decomposer: Arc<dyn StepDecomposer>,
        artifact_store: Arc<ArtifactStore>,
        screenshot_pipeline: Arc<ScreenshotPipeline>,
        task_store: Arc<TaskStore>,
        event_bus: Arc<EventBus>,
        cancel_map: Arc<CancelMap>,
        orchestrator: Arc<Orchestrator>,
        evaluation_store: Arc<EvaluationStore>,
    ) -> Self {
        Self {
            config,
            registry,
            description_cache,
            driver,
            decomposer,
            artifact_store,
            screenshot_pipeline,
            task_store,
            event_bus,
            cancel_map,
            orchestrator,
            evaluation_store,
        }
    }
}
