//! Task execution core: the store, event bus, router, and orchestrator
//! that turn a validated tool call into a running (or completed) Task.

pub mod cancel;
pub mod evaluation;
pub mod event_bus;
pub mod orchestrator;
pub mod router;
pub mod sweep;
pub mod task_store;

pub use cancel::{CancelMap, CancelToken};
pub use evaluation::{spawn_evaluation_sweeper, EvaluationStore};
pub use event_bus::{EventBus, SequencedEvent, TaskEvent};
pub use orchestrator::Orchestrator;
pub use router::{decide, validate_arguments, InvocationParams, RouteDecision};
pub use task_store::{HydratedTask, TaskStore};
