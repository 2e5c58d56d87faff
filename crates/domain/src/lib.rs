//! Shared types for the webagent workspace: the error taxonomy, the
//! persisted data model (Tool, ToolDescription, Task, StepRecord,
//! Artifact), and the modular configuration tree.

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, ErrorKind, Result};
