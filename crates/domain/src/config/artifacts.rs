use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Screenshot / artifact pipeline configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory screenshots are written under; served at `/screenshots/{filename}`.
    #[serde(default = "d_screenshots_dir")]
    pub screenshots_dir: String,

    /// Retention window for screenshots not linked to a surviving task.
    #[serde(default = "d_retention_hours")]
    pub screenshot_retention_hours: u64,

    /// Retention window for screenshots linked to a non-pruned task.
    /// Longer than the transient window; see the retention-window
    /// Open Question.
    #[serde(default = "d_retention_hours_task_linked")]
    pub screenshot_retention_hours_task_linked: u64,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            screenshots_dir: d_screenshots_dir(),
            screenshot_retention_hours: d_retention_hours(),
            screenshot_retention_hours_task_linked: d_retention_hours_task_linked(),
        }
    }
}

fn d_screenshots_dir() -> String {
    "./screenshots".into()
}
fn d_retention_hours() -> u64 {
    24
}
fn d_retention_hours_task_linked() -> u64 {
    24 * 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retention_windows() {
        let cfg = ArtifactsConfig::default();
        assert_eq!(cfg.screenshot_retention_hours, 24);
        assert_eq!(cfg.screenshot_retention_hours_task_linked, 168);
    }

    #[test]
    fn default_screenshots_dir() {
        assert_eq!(ArtifactsConfig::default().screenshots_dir, "./screenshots");
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: ArtifactsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.screenshot_retention_hours, 24);
        assert_eq!(cfg.screenshot_retention_hours_task_linked, 168);
    }

    #[test]
    fn deserialize_overrides() {
        let cfg: ArtifactsConfig = toml::from_str(
            r#"
            screenshots_dir = "/var/lib/webagentd/screenshots"
            screenshot_retention_hours = 12
            screenshot_retention_hours_task_linked = 72
            "#,
        )
        .unwrap();
        assert_eq!(cfg.screenshots_dir, "/var/lib/webagentd/screenshots");
        assert_eq!(cfg.screenshot_retention_hours, 12);
        assert_eq!(cfg.screenshot_retention_hours_task_linked, 72);
    }
}
