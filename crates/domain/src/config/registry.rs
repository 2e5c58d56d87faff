use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool registry / description cache configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// When false, every registration always calls the generator (no cache
    /// reads or writes); descriptions are still kept in memory for the run.
    #[serde(default = "d_cache_enabled")]
    pub description_cache_enabled: bool,

    /// Identifier partitioning the description cache. Must be stable for
    /// the lifetime of a process; changing it invalidates prior entries
    /// naturally (they simply miss).
    #[serde(default = "d_model_id")]
    pub current_model_id: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            description_cache_enabled: d_cache_enabled(),
            current_model_id: d_model_id(),
        }
    }
}

fn d_cache_enabled() -> bool {
    true
}

fn d_model_id() -> String {
    "default".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_enabled() {
        assert!(RegistryConfig::default().description_cache_enabled);
    }

    #[test]
    fn default_model_id() {
        assert_eq!(RegistryConfig::default().current_model_id, "default");
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: RegistryConfig = toml::from_str("").unwrap();
        assert!(cfg.description_cache_enabled);
        assert_eq!(cfg.current_model_id, "default");
    }

    #[test]
    fn deserialize_overrides() {
        let cfg: RegistryConfig = toml::from_str(
            r#"
            description_cache_enabled = false
            current_model_id = "gpt-4"
            "#,
        )
        .unwrap();
        assert!(!cfg.description_cache_enabled);
        assert_eq!(cfg.current_model_id, "gpt-4");
    }
}
