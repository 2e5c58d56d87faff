use serde::{Deserialize, Serialize};

/// Error taxonomy shared between JSON-RPC error `data.kind`, `Task.error_kind`,
/// and `StepRecord.error_kind`. Stable across the wire — renaming a variant
/// changes the public protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    DecompositionFailed,
    NavigationFailed,
    ElementNotFound,
    ScreenshotFailed,
    BrowserCrashed,
    Timeout,
    Cancelled,
    CacheUnavailable,
    IllegalTransition,
    Internal,
}

impl ErrorKind {
    /// JSON-RPC 2.0 error code for this kind, per the invocation protocol.
    pub fn rpc_code(self) -> i64 {
        match self {
            ErrorKind::UnknownTool => -32000,
            ErrorKind::InvalidArguments => -32602,
            _ => -32000,
        }
    }
}

/// Shared error type across all webagent crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("step decomposition failed: {0}")]
    DecompositionFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("browser crashed: {0}")]
    BrowserCrashed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("description cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Map this error onto the stable wire taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownTool(_) => ErrorKind::UnknownTool,
            Error::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Error::DecompositionFailed(_) => ErrorKind::DecompositionFailed,
            Error::NavigationFailed(_) => ErrorKind::NavigationFailed,
            Error::ElementNotFound(_) => ErrorKind::ElementNotFound,
            Error::ScreenshotFailed(_) => ErrorKind::ScreenshotFailed,
            Error::BrowserCrashed(_) => ErrorKind::BrowserCrashed,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Error::CacheUnavailable(_) => ErrorKind::CacheUnavailable,
            Error::Io(_) | Error::Json(_) | Error::Config(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
