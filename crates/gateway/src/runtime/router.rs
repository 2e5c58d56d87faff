//! Invocation Router (§4.2): validates a `{tool_name, arguments}` call
//! against its tool's schema and decides synchronous vs. queued execution.

use webagent_domain::error::{Error, Result};
use webagent_domain::model::{ExecutionCapability, ExecutionMode, ToolInfo};

const MIN_MAX_STEPS: u32 = 1;
const MAX_MAX_STEPS: u32 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationParams {
    pub max_steps: u32,
    pub execution_mode: ExecutionMode,
    pub allow_early_completion: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Execute inline on the caller's task, under the browser-session semaphore.
    Synchronous,
    /// Enqueue a Task and hand the caller a progress channel.
    Queued(InvocationParams),
}

/// Validates `arguments` against the tool's schema: every `required` key
/// must be present, every present key must match its declared JSON type
/// (loosely — `number` accepts both ints and floats), and no unknown keys
/// are allowed. `max_steps`/`execution_mode`/`allow_early_completion` are
/// routing parameters, not schema fields, and are pulled out separately.
pub fn validate_arguments(tool: &ToolInfo, arguments: &serde_json::Value) -> Result<InvocationParams> {
    let serde_json::Value::Object(map) = arguments else {
        return Err(Error::InvalidArguments("arguments must be a JSON object".into()));
    };

    for (name, spec) in &tool.schema {
        match map.get(name) {
            Some(value) => {
                if !json_type_matches(&spec.param_type, value) {
                    return Err(Error::InvalidArguments(format!("{name}: expected {}", spec.param_type)));
                }
            }
            None if spec.required => {
                return Err(Error::InvalidArguments(format!("missing required argument: {name}")));
            }
            None => {}
        }
    }

    for key in map.keys() {
        if matches!(key.as_str(), "max_steps" | "execution_mode" | "allow_early_completion") {
            continue;
        }
        if !tool.schema.contains_key(key) {
            return Err(Error::InvalidArguments(format!("unknown argument: {key}")));
        }
    }

    let max_steps = match map.get("max_steps") {
        Some(v) => v.as_u64().ok_or_else(|| Error::InvalidArguments("max_steps must be an integer".into()))? as u32,
        None => 1,
    };
    if !(MIN_MAX_STEPS..=MAX_MAX_STEPS).contains(&max_steps) {
        return Err(Error::InvalidArguments(format!("max_steps must be in [{MIN_MAX_STEPS}, {MAX_MAX_STEPS}]")));
    }

    let execution_mode = match map.get("execution_mode") {
        Some(serde_json::Value::String(s)) => parse_execution_mode(s)?,
        Some(_) => return Err(Error::InvalidArguments("execution_mode must be a string".into())),
        None => ExecutionMode::Auto,
    };

    let allow_early_completion = match map.get("allow_early_completion") {
        Some(v) => v.as_bool().ok_or_else(|| Error::InvalidArguments("allow_early_completion must be a boolean".into()))?,
        None => true,
    };

    Ok(InvocationParams { max_steps, execution_mode, allow_early_completion })
}

fn parse_execution_mode(raw: &str) -> Result<ExecutionMode> {
    match raw {
        "ONE_SHOT" => Ok(ExecutionMode::OneShot),
        "MULTI_STEP" => Ok(ExecutionMode::MultiStep),
        "AUTO" => Ok(ExecutionMode::Auto),
        other => Err(Error::InvalidArguments(format!("unknown execution_mode: {other}"))),
    }
}

fn json_type_matches(param_type: &str, value: &serde_json::Value) -> bool {
    match param_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// Routing rule (§4.2): only-ONE_SHOT tools, `max_steps` absent/1, or an
/// explicit `execution_mode=ONE_SHOT` all run synchronously; everything
/// else is queued.
pub fn decide(tool: &ToolInfo, params: &InvocationParams) -> RouteDecision {
    let one_shot_only = tool.capabilities == [ExecutionCapability::OneShot];
    if one_shot_only || params.max_steps == 1 || params.execution_mode == ExecutionMode::OneShot {
        RouteDecision::Synchronous
    } else {
        RouteDecision::Queued(params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use webagent_domain::model::ParamSpec;

    fn tool_with_schema(capabilities: Vec<ExecutionCapability>) -> ToolInfo {
        let mut schema = HashMap::new();
        schema.insert(
            "instructions".to_owned(),
            ParamSpec { param_type: "string".into(), description: "what to do".into(), required: true, default: None },
        );
        ToolInfo { name: "browseWeb".into(), description: "browses".into(), schema, capabilities, description_degraded: false }
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let err = validate_arguments(&tool, &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let err = validate_arguments(&tool, &serde_json::json!({"instructions": 5})).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let err = validate_arguments(&tool, &serde_json::json!({"instructions": "go", "bogus": 1})).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn max_steps_out_of_range_is_rejected() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let err = validate_arguments(&tool, &serde_json::json!({"instructions": "go", "max_steps": 51})).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn defaults_are_one_step_auto_with_early_completion() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let params = validate_arguments(&tool, &serde_json::json!({"instructions": "go"})).unwrap();
        assert_eq!(params, InvocationParams { max_steps: 1, execution_mode: ExecutionMode::Auto, allow_early_completion: true });
    }

    #[test]
    fn one_shot_only_tool_always_routes_synchronous() {
        let tool = tool_with_schema(vec![ExecutionCapability::OneShot]);
        let params = InvocationParams { max_steps: 10, execution_mode: ExecutionMode::Auto, allow_early_completion: true };
        assert_eq!(decide(&tool, &params), RouteDecision::Synchronous);
    }

    #[test]
    fn multi_step_tool_with_max_steps_one_is_synchronous() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let params = InvocationParams { max_steps: 1, execution_mode: ExecutionMode::Auto, allow_early_completion: true };
        assert_eq!(decide(&tool, &params), RouteDecision::Synchronous);
    }

    #[test]
    fn multi_step_tool_with_loopy_params_is_queued() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let params = InvocationParams { max_steps: 5, execution_mode: ExecutionMode::Auto, allow_early_completion: true };
        assert_eq!(decide(&tool, &params), RouteDecision::Queued(params));
    }

    #[test]
    fn explicit_one_shot_mode_forces_synchronous_even_with_many_steps() {
        let tool = tool_with_schema(vec![ExecutionCapability::MultiStep]);
        let params = InvocationParams { max_steps: 5, execution_mode: ExecutionMode::OneShot, allow_early_completion: true };
        assert_eq!(decide(&tool, &params), RouteDecision::Synchronous);
    }
}
