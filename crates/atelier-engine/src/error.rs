//! Error types for the workflow engine

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while a single node executes
///
/// Every variant is fatal to the run that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// A required input is neither connected nor configured
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// The node resolved to an empty list of work items
    #[error("Nothing to process: {0}")]
    EmptyWorkload(String),

    /// The node's type tag is not one of the known node kinds
    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    /// The generation backend failed or timed out
    #[error("Backend failure: {0}")]
    BackendFailure(String),
}

impl NodeError {
    /// Create a missing input error for a port or setting
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingInput(what.into())
    }

    /// Create an empty workload error
    pub fn empty(what: impl Into<String>) -> Self {
        Self::EmptyWorkload(what.into())
    }
}

impl From<BackendError> for NodeError {
    fn from(err: BackendError) -> Self {
        Self::BackendFailure(err.to_string())
    }
}

/// Errors that end a workflow run
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph did not pass validation; messages are joined with "; "
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A node failed and the run was aborted
    #[error("failed at {node_type}: {source}")]
    NodeFailed {
        node_id: String,
        node_type: String,
        source: NodeError,
    },

    /// A requested node does not exist in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The run was aborted through its abort signal
    #[error("Workflow cancelled")]
    Cancelled,
}

impl EngineError {
    /// The node error behind a failed run, if any
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            Self::NodeFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from editing a workflow graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Port '{port}' not found on node '{node_id}'")]
    PortNotFound { node_id: String, port: String },

    #[error("Cannot connect {source_kind} output to {target_kind} input")]
    IncompatiblePorts {
        source_kind: String,
        target_kind: String,
    },

    #[error("Node '{0}' cannot be connected to itself")]
    SelfConnection(String),
}
