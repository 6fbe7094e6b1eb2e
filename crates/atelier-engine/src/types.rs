//! Core types for workflow graphs
//!
//! These types define the structure of workflow graphs: nodes with typed
//! ports, the connections between them, and the editing operations the
//! canvas performs on a graph.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, NodeError};
use crate::events::NodeUpdate;
use crate::value::NodeValue;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for a connection
pub type ConnectionId = String;

/// Unique identifier for a port (unique within its node)
pub type PortId = String;

/// The closed set of node kinds the engine can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Literal image from configuration
    ImageInput,
    /// Literal text from configuration
    TextInput,
    /// Literal list of texts from configuration
    TextArrayInput,
    /// Prompt (+ optional reference) to image
    Generate,
    /// Content image restyled by a style image
    StyleTransfer,
    /// Higher-resolution re-render of an image
    Upscale,
    /// Image to palette / keywords / description
    Analyze,
    /// Two or more images merged into one
    Composite,
    /// Passthrough sink shown to the user
    Output,
    /// Many prompts to many images, in chunks
    BatchGenerate,
    /// Pick one image out of an array
    CompareGrid,
    /// Instruction-driven edit of an image
    Inpaint,
}

impl NodeKind {
    /// All node kinds, in palette order
    pub const ALL: [NodeKind; 12] = [
        NodeKind::ImageInput,
        NodeKind::TextInput,
        NodeKind::TextArrayInput,
        NodeKind::Generate,
        NodeKind::StyleTransfer,
        NodeKind::Upscale,
        NodeKind::Analyze,
        NodeKind::Composite,
        NodeKind::Output,
        NodeKind::BatchGenerate,
        NodeKind::CompareGrid,
        NodeKind::Inpaint,
    ];

    /// The type tag stored on graph nodes
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageInput => "image-input",
            Self::TextInput => "text-input",
            Self::TextArrayInput => "text-array-input",
            Self::Generate => "generate",
            Self::StyleTransfer => "style-transfer",
            Self::Upscale => "upscale",
            Self::Analyze => "analyze",
            Self::Composite => "composite",
            Self::Output => "output",
            Self::BatchGenerate => "batch-generate",
            Self::CompareGrid => "compare-grid",
            Self::Inpaint => "inpaint",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| NodeError::UnknownNodeKind(s.to_string()))
    }
}

/// The value kind carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortKind {
    Image,
    Text,
    Style,
    Mask,
    Palette,
    ImageArray,
    TextArray,
}

impl PortKind {
    /// Check if an output of this kind can feed an input of `target` kind
    pub fn is_compatible_with(&self, target: &PortKind) -> bool {
        // A plain image can serve as a style reference or a mask
        if matches!(self, PortKind::Image) && matches!(target, PortKind::Style | PortKind::Mask)
        {
            return true;
        }

        self == target
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Style => "style",
            Self::Mask => "mask",
            Self::Palette => "palette",
            Self::ImageArray => "image-array",
            Self::TextArray => "text-array",
        }
    }
}

/// A typed slot on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Identifier, unique within the owning node
    pub id: PortId,
    /// Declared name, used to unwrap bundle results
    pub name: String,
    /// Value kind
    pub kind: PortKind,
}

impl Port {
    /// Create an input port; its id is derived from the name
    pub fn input(name: impl Into<String>, kind: PortKind) -> Self {
        let name = name.into();
        Self {
            id: Self::input_id(&name),
            name,
            kind,
        }
    }

    /// Create an output port; its id is derived from the name
    pub fn output(name: impl Into<String>, kind: PortKind) -> Self {
        let name = name.into();
        Self {
            id: Self::output_id(&name),
            name,
            kind,
        }
    }

    /// Port id of the input port named `name`
    pub fn input_id(name: &str) -> PortId {
        format!("in-{}", name)
    }

    /// Port id of the output port named `name`
    pub fn output_id(name: &str) -> PortId {
        format!("out-{}", name)
    }
}

/// Execution status of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

/// A node instance in a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type tag (see [`NodeKind`])
    pub node_type: String,
    /// Input ports
    #[serde(default)]
    pub inputs: Vec<Port>,
    /// Output ports
    #[serde(default)]
    pub outputs: Vec<Port>,
    /// Type-specific settings
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Status from the most recent run
    #[serde(default)]
    pub status: NodeStatus,
    /// Result from the most recent successful execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<NodeValue>,
    /// Error message from the most recent failed execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether `result` was served from the cache
    #[serde(default)]
    pub cached: bool,
    /// Position on the canvas (x, y)
    #[serde(default)]
    pub position: (f64, f64),
}

impl GraphNode {
    /// Resolve the node's type tag to a known kind
    pub fn kind(&self) -> Result<NodeKind, NodeError> {
        self.node_type.parse()
    }

    /// Find an input port by id
    pub fn input_port(&self, port_id: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == port_id)
    }

    /// Find an output port by id
    pub fn output_port(&self, port_id: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id == port_id)
    }

    /// Non-blank string setting
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// Boolean setting (false when absent)
    pub fn config_flag(&self, key: &str) -> bool {
        self.config.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Unsigned integer setting
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(|v| v.as_u64())
    }

    /// Set a configuration value (config edit from the editor)
    pub fn set_config(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.config.insert(key.into(), value);
    }

    /// Move the node on the canvas
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.position = (x, y);
    }

    /// Apply a status update emitted by the engine
    pub fn apply(&mut self, update: &NodeUpdate) {
        self.status = update.status;
        self.result = update.result.clone();
        self.error = update.error.clone();
        self.cached = update.cached;
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Source node ID
    pub source: NodeId,
    /// Source (output) port ID
    pub source_handle: PortId,
    /// Target node ID
    pub target: NodeId,
    /// Target (input) port ID
    pub target_handle: PortId,
}

/// A complete workflow graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    /// Unique identifier for this graph
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Nodes in the graph
    pub nodes: Vec<GraphNode>,
    /// Connections between node ports
    pub connections: Vec<Connection>,
}

impl WorkflowGraph {
    /// Create a new empty graph
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Get connections coming into a node
    pub fn incoming_connections<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.target == node_id)
    }

    /// Get connections going out of a node
    pub fn outgoing_connections<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.source == node_id)
    }

    /// The connection bound to an input port, if any
    pub fn input_connection(&self, node_id: &str, port_id: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.target == node_id && c.target_handle == port_id)
    }

    /// Get the IDs of nodes that this node depends on (upstream nodes)
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_connections(node_id)
            .map(|c| c.source.clone())
            .collect()
    }

    /// Get the IDs of nodes that depend on this node (downstream nodes)
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_connections(node_id)
            .map(|c| c.target.clone())
            .collect()
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    /// Remove a node and every connection touching it
    pub fn remove_node(&mut self, node_id: &str) -> Option<GraphNode> {
        let pos = self.nodes.iter().position(|n| n.id == node_id)?;
        self.connections
            .retain(|c| c.source != node_id && c.target != node_id);
        Some(self.nodes.remove(pos))
    }

    /// Connect an output port to an input port
    ///
    /// An input port holds at most one connection: connecting to an input
    /// that is already bound replaces the previous connection.
    pub fn connect(
        &mut self,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> Result<ConnectionId, GraphError> {
        if source == target {
            return Err(GraphError::SelfConnection(source.to_string()));
        }

        let source_node = self
            .find_node(source)
            .ok_or_else(|| GraphError::NodeNotFound(source.to_string()))?;
        let target_node = self
            .find_node(target)
            .ok_or_else(|| GraphError::NodeNotFound(target.to_string()))?;

        let out_port = source_node
            .output_port(source_port)
            .ok_or_else(|| GraphError::PortNotFound {
                node_id: source.to_string(),
                port: source_port.to_string(),
            })?;
        let in_port = target_node
            .input_port(target_port)
            .ok_or_else(|| GraphError::PortNotFound {
                node_id: target.to_string(),
                port: target_port.to_string(),
            })?;

        if !out_port.kind.is_compatible_with(&in_port.kind) {
            return Err(GraphError::IncompatiblePorts {
                source_kind: out_port.kind.as_str().to_string(),
                target_kind: in_port.kind.as_str().to_string(),
            });
        }

        self.connections
            .retain(|c| !(c.target == target && c.target_handle == target_port));

        let id = format!("{}:{}->{}:{}", source, source_port, target, target_port);
        self.connections.push(Connection {
            id: id.clone(),
            source: source.to_string(),
            source_handle: source_port.to_string(),
            target: target.to_string(),
            target_handle: target_port.to_string(),
        });
        Ok(id)
    }

    /// Remove a connection by ID
    pub fn disconnect(&mut self, connection_id: &str) -> Option<Connection> {
        let pos = self.connections.iter().position(|c| c.id == connection_id)?;
        Some(self.connections.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> GraphNode {
        GraphNode::new(id, kind)
    }

    #[test]
    fn test_node_kind_round_trips_through_tag() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>().unwrap(), kind);
        }
        assert!(matches!(
            "sketch".parse::<NodeKind>(),
            Err(NodeError::UnknownNodeKind(tag)) if tag == "sketch"
        ));
    }

    #[test]
    fn test_port_kind_compatibility() {
        assert!(PortKind::Image.is_compatible_with(&PortKind::Image));
        assert!(PortKind::Image.is_compatible_with(&PortKind::Style));
        assert!(PortKind::Image.is_compatible_with(&PortKind::Mask));
        assert!(!PortKind::Text.is_compatible_with(&PortKind::Image));
        assert!(!PortKind::ImageArray.is_compatible_with(&PortKind::Image));
    }

    #[test]
    fn test_connect_and_dependencies() {
        let mut graph = WorkflowGraph::new("test", "Test Graph");
        graph.add_node(node("text", NodeKind::TextInput));
        graph.add_node(node("gen", NodeKind::Generate));

        graph
            .connect("text", &Port::output_id("text"), "gen", &Port::input_id("prompt"))
            .unwrap();

        assert_eq!(graph.get_dependencies("gen"), vec!["text"]);
        assert_eq!(graph.get_dependents("text"), vec!["gen"]);
    }

    #[test]
    fn test_connect_replaces_existing_input_binding() {
        let mut graph = WorkflowGraph::new("test", "Test Graph");
        graph.add_node(node("a", NodeKind::TextInput));
        graph.add_node(node("b", NodeKind::TextInput));
        graph.add_node(node("gen", NodeKind::Generate));

        let prompt = Port::input_id("prompt");
        graph.connect("a", &Port::output_id("text"), "gen", &prompt).unwrap();
        graph.connect("b", &Port::output_id("text"), "gen", &prompt).unwrap();

        assert_eq!(graph.connections.len(), 1);
        assert_eq!(graph.input_connection("gen", &prompt).unwrap().source, "b");
    }

    #[test]
    fn test_connect_rejects_incompatible_ports() {
        let mut graph = WorkflowGraph::new("test", "Test Graph");
        graph.add_node(node("text", NodeKind::TextInput));
        graph.add_node(node("up", NodeKind::Upscale));

        let err = graph
            .connect("text", &Port::output_id("text"), "up", &Port::input_id("image"))
            .unwrap_err();
        assert!(matches!(err, GraphError::IncompatiblePorts { .. }));
        assert!(graph.connections.is_empty());
    }

    #[test]
    fn test_connect_rejects_self_and_missing_ports() {
        let mut graph = WorkflowGraph::new("test", "Test Graph");
        graph.add_node(node("up", NodeKind::Upscale));

        assert!(matches!(
            graph.connect("up", &Port::output_id("image"), "up", &Port::input_id("image")),
            Err(GraphError::SelfConnection(_))
        ));
        assert!(matches!(
            graph.connect("up", "out-nope", "missing", "in-image"),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_remove_node_cascades_connections() {
        let mut graph = WorkflowGraph::new("test", "Test Graph");
        graph.add_node(node("img", NodeKind::ImageInput));
        graph.add_node(node("up", NodeKind::Upscale));
        graph.add_node(node("out", NodeKind::Output));
        graph
            .connect("img", &Port::output_id("image"), "up", &Port::input_id("image"))
            .unwrap();
        graph
            .connect("up", &Port::output_id("image"), "out", &Port::input_id("image"))
            .unwrap();

        let removed = graph.remove_node("up").unwrap();
        assert_eq!(removed.id, "up");
        assert!(graph.connections.is_empty());
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn test_graph_json_shape() {
        let mut graph = WorkflowGraph::new("wf", "Shape");
        let mut text = node("t", NodeKind::TextInput);
        text.set_config("text", serde_json::json!("hi"));
        graph.add_node(text);

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"][0]["nodeType"], "text-input");
        assert_eq!(json["nodes"][0]["status"], "idle");
        assert_eq!(json["nodes"][0]["config"]["text"], "hi");

        let back: WorkflowGraph = serde_json::from_value(json).unwrap();
        assert_eq!(back.nodes[0].kind().unwrap(), NodeKind::TextInput);
    }
}
