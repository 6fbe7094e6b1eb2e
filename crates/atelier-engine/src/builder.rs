//! Fluent builder for workflow graphs
//!
//! Provides a fluent API for constructing graphs programmatically, mostly
//! for tests and for hosts that assemble workflows in code.

use crate::types::{Connection, GraphNode, NodeKind, Port, WorkflowGraph};

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let graph = WorkflowBuilder::new("wf-1", "Sunset")
///     .add_node("text", NodeKind::TextInput)
///     .with_config(serde_json::json!({"text": "sunset"}))
///     .add_node("gen", NodeKind::Generate)
///     .connect("text", "text", "gen", "prompt")
///     .build();
/// ```
pub struct WorkflowBuilder {
    id: String,
    name: String,
    nodes: Vec<GraphNode>,
    connections: Vec<Connection>,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Add a node of `kind` with its default ports and configuration
    pub fn add_node(mut self, id: impl Into<String>, kind: NodeKind) -> Self {
        self.nodes.push(GraphNode::new(id, kind));
        self
    }

    /// Merge settings into the most recently added node's configuration
    ///
    /// Must be called immediately after `add_node`.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        if let (Some(node), serde_json::Value::Object(map)) = (self.nodes.last_mut(), config) {
            node.config.extend(map);
        }
        self
    }

    /// Place the most recently added node on the canvas
    pub fn at(mut self, x: f64, y: f64) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.move_to(x, y);
        }
        self
    }

    /// Connect an output port to an input port, both given by port name
    ///
    /// Port kinds are not checked here; use [`WorkflowGraph::connect`] for
    /// editor-side connects. A later connection to the same input replaces
    /// the earlier one.
    pub fn connect(
        mut self,
        source: impl Into<String>,
        source_port: &str,
        target: impl Into<String>,
        target_port: &str,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let source_handle = Port::output_id(source_port);
        let target_handle = Port::input_id(target_port);

        self.connections
            .retain(|c| !(c.target == target && c.target_handle == target_handle));
        self.connections.push(Connection {
            id: format!("{}:{}->{}:{}", source, source_handle, target, target_handle),
            source,
            source_handle,
            target,
            target_handle,
        });
        self
    }

    /// Build the graph without validation
    pub fn build(self) -> WorkflowGraph {
        let mut graph = WorkflowGraph::new(self.id, self.name);
        graph.nodes = self.nodes;
        graph.connections = self.connections;
        graph
    }
}
