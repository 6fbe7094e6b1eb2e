//! Atelier Engine - workflow execution for image generation graphs
//!
//! This crate turns a graph of generation steps into a validated,
//! deterministically ordered run. It supports:
//!
//! - Cycle and wiring validation before anything executes
//! - Topological scheduling, whole-graph or up to a single node
//! - Typed node values with multi-output bundles
//! - Template variable expansion for batch prompts
//! - A persisted, content-addressed result cache
//! - Event streaming for status updates (not tied to any UI)
//!
//! # Architecture
//!
//! - `WorkflowRunner`: validate, order, then resolve/cache/execute per node
//! - `NodeExecutor`: dispatch over the closed `NodeKind` set
//! - `GenerationBackend`: the external image service, injected by the host
//! - `ResultCache`: memo keyed by node id and input digest
//! - `EventSink`: observer for node transitions and run outcomes
//!
//! # Example
//!
//! ```ignore
//! use atelier_engine::{AbortSignal, NodeKind, NullEventSink, WorkflowBuilder, WorkflowRunner};
//!
//! let mut graph = WorkflowBuilder::new("wf", "Sunset")
//!     .add_node("text", NodeKind::TextInput)
//!     .with_config(serde_json::json!({"text": "sunset"}))
//!     .add_node("gen", NodeKind::Generate)
//!     .connect("text", "text", "gen", "prompt")
//!     .build();
//!
//! let runner = WorkflowRunner::new(backend);
//! let summary = runner.run(&mut graph, &NullEventSink, &AbortSignal::new()).await?;
//! ```

pub mod backend;
pub mod builder;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod expansion;
pub mod resolver;
pub mod scheduler;
pub mod types;
pub mod validation;
pub mod value;

#[cfg(test)]
mod testing;

// Re-export key types
pub use backend::{BackendError, GenerateRequest, GenerationBackend, ImageAnalysis};
pub use builder::WorkflowBuilder;
pub use cache::{hash_inputs, CacheConfig, CacheError, CacheStats, ResultCache};
pub use config::{ConfigError, EngineConfig};
pub use descriptor::{all_definitions, NodeCategory, NodeDefinition};
pub use engine::{AbortSignal, RunSummary, WorkflowRunner};
pub use error::{EngineError, GraphError, NodeError, Result};
pub use events::{
    CallbackEventSink, ChannelEventSink, EventSink, NodeUpdate, NullEventSink, VecEventSink,
    WorkflowEvent,
};
pub use executor::NodeExecutor;
pub use expansion::{expand_variables, TemplateVariable};
pub use resolver::{resolve_inputs, ResolvedInputs};
pub use scheduler::{dependency_closure, execution_order, execution_order_for};
pub use types::{Connection, GraphNode, NodeKind, NodeStatus, Port, PortKind, WorkflowGraph};
pub use validation::{validate_workflow, ValidationError, ValidationReport};
pub use value::NodeValue;
