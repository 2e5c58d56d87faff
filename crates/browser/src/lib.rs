//! Step Decomposer and Step Executor: turns free-text instructions into
//! atomic browser actions and drives them against a `BrowserDriver`.

pub mod decomposer;
pub mod driver;
pub mod executor;

pub use decomposer::{GuardedDecomposer, HeuristicDecomposer, StepDecomposer, StepSpec};
pub use driver::{BrowserDriver, NoopDriver, PageSnapshot, SessionId, WaitCondition};
pub use executor::{StepExecutor, StepOutcome, StepResult};
