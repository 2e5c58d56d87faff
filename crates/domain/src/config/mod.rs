mod artifacts;
mod browser;
mod events;
mod observability;
mod registry;
mod server;

pub use artifacts::*;
pub use browser::*;
pub use events::*;
pub use observability::*;
pub use registry::*;
pub use server::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Bearer token gating the protected API surface. Sourced from the
    /// `WEBAGENT_API_TOKEN` environment variable at load time, never from
    /// the TOML file itself.
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl Config {
    /// Load from a TOML file, then overlay secrets from the environment.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut cfg: Config = toml::from_str(&text)
            .map_err(|e| crate::error::Error::Config(e.to_string()))?;
        cfg.api_token = std::env::var("WEBAGENT_API_TOKEN").ok();
        Ok(cfg)
    }
}
