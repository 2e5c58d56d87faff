//! `BrowserDriver` — the external collaborator a Step Executor drives.
//!
//! Shaped the same way as the registry's description generator trait:
//! an async, object-safe boundary around a slow, possibly-flaky external
//! process (a real headless browser). Production wiring plugs in a CDP
//! client; tests plug in a scripted fake.

use webagent_artifacts::RawCapture;
use webagent_domain::error::Result;

/// One condition a WAIT step can block on.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitCondition {
    DomReady,
    NetworkIdle,
    SelectorVisible(String),
    Duration(std::time::Duration),
}

/// A single open page the driver is currently pointed at. `session_id`
/// scopes all calls to one browser tab/context; the executor never
/// shares a session across tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub current_url: String,
    pub page_title: String,
}

#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn open_session(&self) -> Result<SessionId>;
    async fn close_session(&self, session: SessionId) -> Result<()>;

    async fn navigate(&self, session: SessionId, url: &str, timeout: std::time::Duration) -> Result<PageSnapshot>;
    async fn click(&self, session: SessionId, selector_or_text: &str, timeout: std::time::Duration) -> Result<PageSnapshot>;
    async fn type_text(&self, session: SessionId, selector: &str, text: &str, submit: bool) -> Result<PageSnapshot>;
    async fn wait(&self, session: SessionId, condition: WaitCondition) -> Result<PageSnapshot>;
    async fn extract_text(&self, session: SessionId, selector: Option<&str>) -> Result<String>;
    async fn scroll(&self, session: SessionId, down: bool) -> Result<PageSnapshot>;
    async fn screenshot(&self, session: SessionId, full_page: bool) -> Result<RawCapture>;
    async fn snapshot(&self, session: SessionId) -> Result<PageSnapshot>;
}

/// A driver that opens sessions and reports snapshots but never actually
/// renders a page, used as a conservative default when no CDP backend is
/// configured. Navigation and interaction calls fail with
/// `NavigationFailed` rather than silently pretending to succeed;
/// screenshots fail with `ScreenshotFailed`. Swap in a real driver to
/// get working browser automation.
pub struct NoopDriver;

#[async_trait::async_trait]
impl BrowserDriver for NoopDriver {
    async fn open_session(&self) -> Result<SessionId> {
        Ok(SessionId::new())
    }

    async fn close_session(&self, _session: SessionId) -> Result<()> {
        Ok(())
    }

    async fn navigate(&self, _session: SessionId, url: &str, _timeout: std::time::Duration) -> Result<PageSnapshot> {
        Err(webagent_domain::error::Error::NavigationFailed(format!("no browser backend configured, cannot navigate to {url}")))
    }

    async fn click(&self, _session: SessionId, selector_or_text: &str, _timeout: std::time::Duration) -> Result<PageSnapshot> {
        Err(webagent_domain::error::Error::ElementNotFound(format!("no browser backend configured, cannot click {selector_or_text}")))
    }

    async fn type_text(&self, _session: SessionId, selector: &str, _text: &str, _submit: bool) -> Result<PageSnapshot> {
        Err(webagent_domain::error::Error::ElementNotFound(format!("no browser backend configured, cannot type into {selector}")))
    }

    async fn wait(&self, _session: SessionId, _condition: WaitCondition) -> Result<PageSnapshot> {
        Err(webagent_domain::error::Error::Timeout("no browser backend configured".into()))
    }

    async fn extract_text(&self, _session: SessionId, _selector: Option<&str>) -> Result<String> {
        Err(webagent_domain::error::Error::ElementNotFound("no browser backend configured".into()))
    }

    async fn scroll(&self, _session: SessionId, _down: bool) -> Result<PageSnapshot> {
        Err(webagent_domain::error::Error::NavigationFailed("no browser backend configured".into()))
    }

    async fn screenshot(&self, _session: SessionId, _full_page: bool) -> Result<webagent_artifacts::RawCapture> {
        Err(webagent_domain::error::Error::ScreenshotFailed("no browser backend configured".into()))
    }

    async fn snapshot(&self, _session: SessionId) -> Result<PageSnapshot> {
        Ok(PageSnapshot::default())
    }
}
