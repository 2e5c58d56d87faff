//! External collaborator interface for tool description generation.
//!
//! The generator is an opaque, possibly slow AI service. The registry
//! never assumes anything about its implementation beyond this trait —
//! a production deployment plugs in an LLM client; tests plug in a
//! canned or failing stub.

use webagent_domain::error::Result;

/// What the generator produces for one tool.
#[derive(Debug, Clone)]
pub struct GeneratedDescription {
    pub description: String,
    pub parameters_info: String,
}

#[async_trait::async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Generate a description for `tool_name` given its schema, serialized
    /// as `schema_json`. Errors are recoverable at the call site — the
    /// registry falls back to a hand-written or generic description rather
    /// than failing startup.
    async fn generate(&self, tool_name: &str, schema_json: &str) -> Result<GeneratedDescription>;
}

/// A generator that always succeeds with a fixed description, used in
/// tests and as a conservative default when no AI backend is configured.
pub struct StaticGenerator {
    template: String,
}

impl StaticGenerator {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }
}

#[async_trait::async_trait]
impl DescriptionGenerator for StaticGenerator {
    async fn generate(&self, tool_name: &str, schema_json: &str) -> Result<GeneratedDescription> {
        Ok(GeneratedDescription {
            description: self.template.replace("{tool}", tool_name),
            parameters_info: schema_json.to_owned(),
        })
    }
}
