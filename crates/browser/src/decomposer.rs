//! Step Decomposer — turns a free-text instruction into an ordered list
//! of atomic `StepSpec`s the executor can run one at a time.

use webagent_domain::error::{Error, Result};

use crate::driver::WaitCondition;

#[derive(Debug, Clone, PartialEq)]
pub enum StepSpec {
    Navigate { url: String },
    Click { selector_or_text: String },
    Type { selector: String, text: String, submit: bool },
    Wait { condition: WaitCondition },
    Screenshot,
    ExtractText { selector: Option<String> },
    Scroll { down: bool },
}

impl StepSpec {
    pub fn describe(&self) -> String {
        match self {
            StepSpec::Navigate { url } => format!("navigate to {url}"),
            StepSpec::Click { selector_or_text } => format!("click \"{selector_or_text}\""),
            StepSpec::Type { selector, text, .. } => format!("type \"{text}\" into {selector}"),
            StepSpec::Wait { .. } => "wait".to_owned(),
            StepSpec::Screenshot => "capture screenshot".to_owned(),
            StepSpec::ExtractText { selector } => match selector {
                Some(s) => format!("extract text from {s}"),
                None => "extract page text".to_owned(),
            },
            StepSpec::Scroll { down } => format!("scroll {}", if *down { "down" } else { "up" }),
        }
    }
}

/// AI-backed or heuristic decomposer. The registry/gateway wires a real
/// LLM-backed implementation in production; `HeuristicDecomposer` below
/// is both the test double and the documented fallback-of-last-resort.
#[async_trait::async_trait]
pub trait StepDecomposer: Send + Sync {
    async fn decompose(&self, instruction: &str, max_steps: u32) -> Result<Vec<StepSpec>>;
}

/// Known domain keyword -> canonical URL, used by the fallback heuristic.
const KNOWN_DOMAINS: &[(&str, &str)] = &[
    ("google", "https://www.google.com"),
    ("linkedin", "https://www.linkedin.com"),
    ("github", "https://www.github.com"),
    ("amazon", "https://www.amazon.com"),
    ("wikipedia", "https://www.wikipedia.org"),
];

const DEFAULT_FALLBACK_URL: &str = "https://www.google.com";

/// The decomposer used when no AI collaborator is configured, and as the
/// safety net an AI-backed decomposer falls through to on failure.
pub struct HeuristicDecomposer {
    default_url: String,
}

impl HeuristicDecomposer {
    pub fn new() -> Self {
        Self {
            default_url: DEFAULT_FALLBACK_URL.to_owned(),
        }
    }

    pub fn with_default_url(default_url: impl Into<String>) -> Self {
        Self {
            default_url: default_url.into(),
        }
    }

    fn extract_url(instruction: &str) -> Option<String> {
        instruction
            .split_whitespace()
            .find(|tok| tok.starts_with("http://") || tok.starts_with("https://"))
            .map(|tok| tok.trim_matches(|c: char| c == '.' || c == ',' || c == ')').to_owned())
    }

    fn known_domain_url(instruction: &str) -> Option<&'static str> {
        let lower = instruction.to_lowercase();
        KNOWN_DOMAINS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, url)| *url)
    }
}

impl Default for HeuristicDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StepDecomposer for HeuristicDecomposer {
    async fn decompose(&self, instruction: &str, max_steps: u32) -> Result<Vec<StepSpec>> {
        let url = Self::extract_url(instruction)
            .or_else(|| Self::known_domain_url(instruction).map(str::to_owned))
            .unwrap_or_else(|| self.default_url.clone());

        let mut steps = vec![StepSpec::Navigate { url }, StepSpec::Screenshot];
        steps.truncate(max_steps.max(1) as usize);
        Ok(steps)
    }
}

/// Enforces the AI-backed decomposer's safety constraints (§4.4):
/// well-formed URLs, no browser open/close steps among the output (not
/// representable by `StepSpec` so trivially satisfied), and a step
/// count within `max_steps`. Truncates rather than failing when only
/// the step count is violated; returns `DECOMPOSITION_FAILED` when a
/// URL is malformed.
pub fn enforce_constraints(mut steps: Vec<StepSpec>, max_steps: u32) -> Result<Vec<StepSpec>> {
    for step in &steps {
        if let StepSpec::Navigate { url } = step {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::DecompositionFailed(format!("malformed URL in step: {url}")));
            }
        }
    }
    steps.truncate(max_steps.max(1) as usize);
    Ok(steps)
}

/// Wraps any AI-backed decomposer so its output always passes through
/// `enforce_constraints`, falling back to the heuristic decomposer on
/// an outright generation failure.
pub struct GuardedDecomposer<D> {
    inner: D,
    fallback: HeuristicDecomposer,
}

impl<D: StepDecomposer> GuardedDecomposer<D> {
    pub fn new(inner: D, fallback: HeuristicDecomposer) -> Self {
        Self { inner, fallback }
    }
}

#[async_trait::async_trait]
impl<D: StepDecomposer> StepDecomposer for GuardedDecomposer<D> {
    async fn decompose(&self, instruction: &str, max_steps: u32) -> Result<Vec<StepSpec>> {
        match self.inner.decompose(instruction, max_steps).await {
            Ok(steps) => enforce_constraints(steps, max_steps),
            Err(e) => {
                tracing::warn!(error = %e, "ai decomposer failed, falling back to heuristic");
                self.fallback.decompose(instruction, max_steps).await
            }
        }
    }
}
