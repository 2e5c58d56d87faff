//! Step Executor (§4.5): runs one `StepSpec` against an open browser
//! session and reports a `StepResult` the orchestrator folds into the
//! task's running state.

use std::time::Duration;

use uuid::Uuid;
use webagent_artifacts::ScreenshotPipeline;
use webagent_domain::error::{Error, ErrorKind, Result};
use webagent_domain::model::{Artifact, BrowserState};

use crate::decomposer::StepSpec;
use crate::driver::{BrowserDriver, PageSnapshot, SessionId, WaitCondition};

const CLICK_TIMEOUT: Duration = Duration::from_secs(5);
const NAVIGATE_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAYS: [Duration; 2] = [Duration::from_millis(500), Duration::from_millis(1500)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub outcome: StepOutcome,
    pub text: Option<String>,
    pub confidence: f32,
    pub artifacts: Vec<Artifact>,
    pub browser_state: Option<BrowserState>,
    pub is_task_complete: bool,
    pub error_kind: Option<ErrorKind>,
}

impl StepResult {
    fn completed(text: Option<String>, confidence: f32, browser_state: PageSnapshot) -> Self {
        Self {
            outcome: StepOutcome::Completed,
            text,
            confidence,
            artifacts: Vec::new(),
            browser_state: Some(BrowserState { current_url: browser_state.current_url, page_title: browser_state.page_title }),
            is_task_complete: false,
            error_kind: None,
        }
    }

    fn failed(error: &Error) -> Self {
        Self {
            outcome: StepOutcome::Failed,
            text: None,
            confidence: 0.0,
            artifacts: Vec::new(),
            browser_state: None,
            is_task_complete: false,
            error_kind: Some(error.kind()),
        }
    }
}

/// Whether a failure is worth retrying in place (transient) versus
/// surfacing immediately.
fn is_recoverable(error: &Error) -> bool {
    matches!(error, Error::ElementNotFound(_) | Error::NavigationFailed(_))
}

async fn with_retry<F, Fut, T>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for delay in std::iter::once(None).chain(RETRY_DELAYS.into_iter().map(Some)) {
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if is_recoverable(&e) => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

pub struct StepExecutor<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub pipeline: &'a ScreenshotPipeline,
}

impl<'a> StepExecutor<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, pipeline: &'a ScreenshotPipeline) -> Self {
        Self { driver, pipeline }
    }

    pub async fn execute(&self, session: SessionId, task_id: Uuid, step_number: u32, step: &StepSpec) -> StepResult {
        let result = match step {
            StepSpec::Navigate { url } => self.navigate(session, url).await,
            StepSpec::Click { selector_or_text } => self.click(session, selector_or_text).await,
            StepSpec::Type { selector, text, submit } => self.type_text(session, selector, text, *submit).await,
            StepSpec::Wait { condition } => self.wait(session, condition.clone()).await,
            StepSpec::Screenshot => return self.screenshot(session, task_id, step_number).await,
            StepSpec::ExtractText { selector } => self.extract_text(session, selector.as_deref()).await,
            StepSpec::Scroll { down } => self.scroll(session, *down).await,
        };

        match result {
            Ok(r) => r,
            Err(e) => StepResult::failed(&e),
        }
    }

    async fn navigate(&self, session: SessionId, url: &str) -> Result<StepResult> {
        let snapshot = with_retry(|| self.driver.navigate(session, url, NAVIGATE_TIMEOUT)).await?;
        let confidence = if snapshot.current_url.starts_with(url.trim_end_matches('/')) { 1.0 } else { 0.5 };
        Ok(StepResult::completed(None, confidence, snapshot))
    }

    async fn click(&self, session: SessionId, selector_or_text: &str) -> Result<StepResult> {
        let snapshot = with_retry(|| self.driver.click(session, selector_or_text, CLICK_TIMEOUT)).await?;
        Ok(StepResult::completed(None, 0.5, snapshot))
    }

    async fn type_text(&self, session: SessionId, selector: &str, text: &str, submit: bool) -> Result<StepResult> {
        let snapshot = with_retry(|| self.driver.type_text(session, selector, text, submit)).await?;
        Ok(StepResult::completed(None, 0.5, snapshot))
    }

    async fn wait(&self, session: SessionId, condition: WaitCondition) -> Result<StepResult> {
        let snapshot = with_retry(|| self.driver.wait(session, condition.clone())).await?;
        Ok(StepResult::completed(None, 0.5, snapshot))
    }

    async fn extract_text(&self, session: SessionId, selector: Option<&str>) -> Result<StepResult> {
        let text = with_retry(|| self.driver.extract_text(session, selector)).await?;
        let snapshot = self.driver.snapshot(session).await?;
        let confidence = if text.trim().is_empty() { 0.0 } else { 1.0 };
        Ok(StepResult::completed(Some(text), confidence, snapshot))
    }

    async fn scroll(&self, session: SessionId, down: bool) -> Result<StepResult> {
        let snapshot = with_retry(|| self.driver.scroll(session, down)).await?;
        Ok(StepResult::completed(None, 0.5, snapshot))
    }

    /// Runs the capture fallback chain (§4.7): full-page, then
    /// viewport-only, then a minimal attempt, then one more after an
    /// extended wait. Any attempt that passes validation is published;
    /// exhausting the chain publishes an `ERROR_BLOB` instead.
    async fn screenshot(&self, session: SessionId, task_id: Uuid, step_number: u32) -> StepResult {
        let attempts: [(bool, Option<Duration>); 4] = [
            (true, None),
            (false, None),
            (false, None),
            (false, Some(Duration::from_secs(2))),
        ];

        for (full_page, extra_wait) in attempts {
            if let Some(wait) = extra_wait {
                tokio::time::sleep(wait).await;
            }
            let capture = match self.driver.screenshot(session, full_page).await {
                Ok(c) => c,
                Err(_) => continue,
            };
            let snapshot = match self.driver.snapshot(session).await {
                Ok(s) => s,
                Err(_) => PageSnapshot::default(),
            };
            if let Ok(artifact) = self.pipeline.publish(&capture, task_id, step_number, &snapshot.current_url, &snapshot.page_title) {
                let mut result = StepResult::completed(None, 1.0, snapshot);
                result.artifacts.push(artifact);
                return result;
            }
        }

        match self.pipeline.publish_error_blob(task_id, step_number, "all screenshot capture attempts failed validation") {
            Ok(artifact) => {
                let mut result = StepResult::failed(&Error::ScreenshotFailed("capture chain exhausted".into()));
                result.artifacts.push(artifact);
                result
            }
            Err(e) => StepResult::failed(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use webagent_artifacts::ArtifactStore;

    struct ScriptedDriver {
        navigate_calls: AtomicU32,
        fail_navigate_times: u32,
    }

    fn snap(url: &str) -> PageSnapshot {
        PageSnapshot { current_url: url.to_owned(), page_title: "Example".into() }
    }

    #[async_trait::async_trait]
    impl BrowserDriver for ScriptedDriver {
        async fn open_session(&self) -> Result<SessionId> {
            Ok(SessionId::new())
        }
        async fn close_session(&self, _session: SessionId) -> Result<()> {
            Ok(())
        }
        async fn navigate(&self, _session: SessionId, url: &str, _timeout: Duration) -> Result<PageSnapshot> {
            let call = self.navigate_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_navigate_times {
                return Err(Error::NavigationFailed("transient".into()));
            }
            Ok(snap(url))
        }
        async fn click(&self, _session: SessionId, _selector_or_text: &str, _timeout: Duration) -> Result<PageSnapshot> {
            Ok(snap("https://example.com"))
        }
        async fn type_text(&self, _session: SessionId, _selector: &str, _text: &str, _submit: bool) -> Result<PageSnapshot> {
            Ok(snap("https://example.com"))
        }
        async fn wait(&self, _session: SessionId, _condition: WaitCondition) -> Result<PageSnapshot> {
            Ok(snap("https://example.com"))
        }
        async fn extract_text(&self, _session: SessionId, _selector: Option<&str>) -> Result<String> {
            Ok("hello world".into())
        }
        async fn scroll(&self, _session: SessionId, _down: bool) -> Result<PageSnapshot> {
            Ok(snap("https://example.com"))
        }
        async fn screenshot(&self, _session: SessionId, _full_page: bool) -> Result<webagent_artifacts::RawCapture> {
            Err(Error::ScreenshotFailed("no real browser in tests".into()))
        }
        async fn snapshot(&self, _session: SessionId) -> Result<PageSnapshot> {
            Ok(snap("https://example.com"))
        }
    }

    fn pipeline() -> (tempfile::TempDir, ScreenshotPipeline) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path()));
        (dir, ScreenshotPipeline::new(store, "http://localhost:3210"))
    }

    #[tokio::test]
    async fn navigate_succeeds_with_full_confidence_on_matching_url() {
        let driver = ScriptedDriver { navigate_calls: AtomicU32::new(0), fail_navigate_times: 0 };
        let (_dir, pipeline) = pipeline();
        let executor = StepExecutor::new(&driver, &pipeline);
        let session = SessionId::new();

        let result = executor
            .execute(session, Uuid::new_v4(), 1, &StepSpec::Navigate { url: "https://example.com".into() })
            .await;

        assert_eq!(result.outcome, StepOutcome::Completed);
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn navigate_retries_transient_failures() {
        let driver = ScriptedDriver { navigate_calls: AtomicU32::new(0), fail_navigate_times: 2 };
        let (_dir, pipeline) = pipeline();
        let executor = StepExecutor::new(&driver, &pipeline);
        let session = SessionId::new();

        let result = executor
            .execute(session, Uuid::new_v4(), 1, &StepSpec::Navigate { url: "https://example.com".into() })
            .await;

        assert_eq!(result.outcome, StepOutcome::Completed);
        assert_eq!(driver.navigate_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn navigate_fails_after_exhausting_retries() {
        let driver = ScriptedDriver { navigate_calls: AtomicU32::new(0), fail_navigate_times: 10 };
        let (_dir, pipeline) = pipeline();
        let executor = StepExecutor::new(&driver, &pipeline);
        let session = SessionId::new();

        let result = executor
            .execute(session, Uuid::new_v4(), 1, &StepSpec::Navigate { url: "https://example.com".into() })
            .await;

        assert_eq!(result.outcome, StepOutcome::Failed);
        assert_eq!(result.error_kind, Some(ErrorKind::NavigationFailed));
    }

    #[tokio::test]
    async fn extract_text_reports_zero_confidence_when_empty() {
        struct EmptyTextDriver;
        #[async_trait::async_trait]
        impl BrowserDriver for EmptyTextDriver {
            async fn open_session(&self) -> Result<SessionId> { Ok(SessionId::new()) }
            async fn close_session(&self, _s: SessionId) -> Result<()> { Ok(()) }
            async fn navigate(&self, _s: SessionId, url: &str, _t: Duration) -> Result<PageSnapshot> { Ok(snap(url)) }
            async fn click(&self, _s: SessionId, _sel: &str, _t: Duration) -> Result<PageSnapshot> { Ok(snap("x")) }
            async fn type_text(&self, _s: SessionId, _sel: &str, _t: &str, _submit: bool) -> Result<PageSnapshot> { Ok(snap("x")) }
            async fn wait(&self, _s: SessionId, _c: WaitCondition) -> Result<PageSnapshot> { Ok(snap("x")) }
            async fn extract_text(&self, _s: SessionId, _sel: Option<&str>) -> Result<String> { Ok("   ".into()) }
            async fn scroll(&self, _s: SessionId, _d: bool) -> Result<PageSnapshot> { Ok(snap("x")) }
            async fn screenshot(&self, _s: SessionId, _f: bool) -> Result<webagent_artifacts::RawCapture> {
                Err(Error::ScreenshotFailed("n/a".into()))
            }
            async fn snapshot(&self, _s: SessionId) -> Result<PageSnapshot> { Ok(snap("x")) }
        }

        let driver = EmptyTextDriver;
        let (_dir, pipeline) = pipeline();
        let executor = StepExecutor::new(&driver, &pipeline);
        let session = SessionId::new();

        let result = executor.execute(session, Uuid::new_v4(), 1, &StepSpec::ExtractText { selector: None }).await;
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn screenshot_exhausts_chain_and_publishes_error_blob() {
        let driver = ScriptedDriver { navigate_calls: AtomicU32::new(0), fail_navigate_times: 0 };
        let (_dir, pipeline) = pipeline();
        let executor = StepExecutor::new(&driver, &pipeline);
        let session = SessionId::new();

        let result = executor.execute(session, Uuid::new_v4(), 1, &StepSpec::Screenshot).await;
        assert_eq!(result.outcome, StepOutcome::Failed);
        assert_eq!(result.artifacts.len(), 1);
    }
}
