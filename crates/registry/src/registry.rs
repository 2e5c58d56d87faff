//! Tool registry — the authoritative list of tools this server exposes,
//! built once at startup from a static declaration list plus whatever
//! descriptions the cache/generator can produce.
//!
//! Mirrors the teacher's provider registry: initialization of one entry
//! never aborts the whole build. A tool whose description generation
//! fails is still registered, with a generic fallback description and
//! `description_degraded = true`, and the failure is recorded in
//! `init_errors` for the caller to log.

use std::collections::HashMap;
use std::sync::Arc;

use webagent_domain::error::{Error, Result};
use webagent_domain::model::{is_valid_tool_name, ExecutionCapability, ParamSpec, ToolInfo};

use crate::cache::DescriptionCache;
use crate::generator::DescriptionGenerator;

/// One statically declared tool, as supplied by the binary wiring up the
/// registry. `handler` is an opaque implementation handle — the registry
/// doesn't know or care what concretely executes the tool.
pub struct ToolRegistration<H> {
    pub name: String,
    pub schema: HashMap<String, ParamSpec>,
    pub capabilities: Vec<ExecutionCapability>,
    pub fallback_description: String,
    pub handler: H,
}

#[derive(Debug, Clone)]
pub struct RegistryInitError {
    pub tool_name: String,
    pub message: String,
}

pub struct ToolRegistry<H> {
    tools: Vec<ToolInfo>,
    handlers: HashMap<String, Arc<H>>,
    index: HashMap<String, usize>,
    current_model_id: String,
    init_errors: Vec<RegistryInitError>,
}

impl<H: Send + Sync> ToolRegistry<H> {
    /// Builds the registry from `registrations`, resolving each tool's
    /// description from the cache, or via `generator` on a cache miss,
    /// falling back to `fallback_description` if generation fails.
    /// Never returns `Err` for a single tool's failure — only degrades it.
    pub async fn build(
        registrations: Vec<ToolRegistration<H>>,
        cache: &DescriptionCache,
        generator: &dyn DescriptionGenerator,
        current_model_id: &str,
    ) -> Self {
        let mut tools = Vec::with_capacity(registrations.len());
        let mut handlers = HashMap::with_capacity(registrations.len());
        let mut index = HashMap::with_capacity(registrations.len());
        let mut init_errors = Vec::new();

        for reg in registrations {
            if !is_valid_tool_name(&reg.name) {
                init_errors.push(RegistryInitError {
                    tool_name: reg.name.clone(),
                    message: "invalid tool name, skipping registration".into(),
                });
                continue;
            }

            let (description, degraded) = match cache.get(current_model_id, &reg.name) {
                Some(cached) => {
                    cache.touch(current_model_id, &reg.name);
                    (cached.description, false)
                }
                None => {
                    let schema_json = serde_json::to_string(&reg.schema).unwrap_or_default();
                    let start = std::time::Instant::now();
                    match generator.generate(&reg.name, &schema_json).await {
                        Ok(generated) => {
                            let desc = cache.put(
                                current_model_id,
                                &reg.name,
                                generated.description,
                                generated.parameters_info,
                                start.elapsed().as_millis() as u64,
                            );
                            (desc.description, false)
                        }
                        Err(e) => {
                            init_errors.push(RegistryInitError {
                                tool_name: reg.name.clone(),
                                message: e.to_string(),
                            });
                            (reg.fallback_description.clone(), true)
                        }
                    }
                }
            };

            let idx = tools.len();
            tools.push(ToolInfo {
                name: reg.name.clone(),
                description,
                schema: reg.schema,
                capabilities: reg.capabilities,
                description_degraded: degraded,
            });
            handlers.insert(reg.name.clone(), Arc::new(reg.handler));
            index.insert(reg.name, idx);
        }

        Self {
            tools,
            handlers,
            index,
            current_model_id: current_model_id.to_owned(),
            init_errors,
        }
    }

    pub fn list(&self) -> &[ToolInfo] {
        &self.tools
    }

    pub fn lookup(&self, name: &str) -> Result<(&ToolInfo, Arc<H>)> {
        let idx = self.index.get(name).ok_or_else(|| Error::UnknownTool(name.to_owned()))?;
        let handler = self.handlers.get(name).expect("index and handlers stay in sync").clone();
        Ok((&self.tools[*idx], handler))
    }

    pub fn current_model_id(&self) -> &str {
        &self.current_model_id
    }

    pub fn init_errors(&self) -> &[RegistryInitError] {
        &self.init_errors
    }
}
