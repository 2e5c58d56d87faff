//! Tool Registry & Description Cache: resolves the static list of tools
//! this server exposes into `ToolInfo` entries with per-model
//! descriptions, degrading gracefully when generation fails.

pub mod cache;
pub mod generator;
pub mod registry;

pub use cache::DescriptionCache;
pub use generator::{DescriptionGenerator, GeneratedDescription, StaticGenerator};
pub use registry::{RegistryInitError, ToolRegistration, ToolRegistry};
