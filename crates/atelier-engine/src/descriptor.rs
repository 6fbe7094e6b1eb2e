//! Static node definitions
//!
//! Each [`NodeKind`] has one definition describing its ports and default
//! configuration. The definition is the single source of truth the node
//! factory ([`GraphNode::new`]) and the editor palette read from.

use serde::Serialize;
use serde_json::json;

use crate::config::defaults;
use crate::types::{GraphNode, NodeKind, NodeStatus, Port, PortKind};

/// Category of a node, for palette grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Literal sources
    Input,
    /// Steps that call the generation backend or transform values
    Processing,
    /// Sinks shown to the user
    Output,
}

/// Complete metadata for a node kind
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// Kind this definition describes
    pub kind: NodeKind,
    /// Category for UI grouping
    pub category: NodeCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the node does
    pub description: String,
    /// Default input ports
    pub inputs: Vec<Port>,
    /// Default output ports
    pub outputs: Vec<Port>,
    /// Default configuration
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl NodeDefinition {
    fn new(kind: NodeKind, category: NodeCategory, label: &str, description: &str) -> Self {
        Self {
            kind,
            category,
            label: label.to_string(),
            description: description.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            config: serde_json::Map::new(),
        }
    }

    fn input(mut self, name: &str, kind: PortKind) -> Self {
        self.inputs.push(Port::input(name, kind));
        self
    }

    fn output(mut self, name: &str, kind: PortKind) -> Self {
        self.outputs.push(Port::output(name, kind));
        self
    }

    fn config(mut self, defaults: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = defaults {
            self.config = map;
        }
        self
    }

    /// Create a node instance with this definition's ports and defaults
    pub fn instantiate(&self, id: impl Into<String>) -> GraphNode {
        GraphNode {
            id: id.into(),
            node_type: self.kind.as_str().to_string(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            config: self.config.clone(),
            status: NodeStatus::Idle,
            result: None,
            error: None,
            cached: false,
            position: (0.0, 0.0),
        }
    }
}

impl NodeKind {
    /// The static definition of this kind
    pub fn definition(&self) -> NodeDefinition {
        use NodeCategory::*;
        use PortKind::*;

        match self {
            NodeKind::ImageInput => {
                NodeDefinition::new(*self, Input, "Image", "Provides an image to the workflow")
                    .output("image", Image)
                    .config(json!({ "image": "" }))
            }
            NodeKind::TextInput => {
                NodeDefinition::new(*self, Input, "Text", "Provides text to the workflow")
                    .output("text", Text)
                    .config(json!({ "text": "" }))
            }
            NodeKind::TextArrayInput => {
                NodeDefinition::new(*self, Input, "Text List", "Provides a list of texts")
                    .output("texts", TextArray)
                    .config(json!({ "texts": [] }))
            }
            NodeKind::Generate => NodeDefinition::new(
                *self,
                Processing,
                "Generate",
                "Generates an image from a prompt and optional reference",
            )
            .input("prompt", Text)
            .input("reference", Image)
            .output("image", Image)
            .config(json!({
                "prompt": "",
                "aspectRatio": defaults::ASPECT_RATIO,
                "quality": defaults::QUALITY
            })),
            NodeKind::StyleTransfer => NodeDefinition::new(
                *self,
                Processing,
                "Style Transfer",
                "Applies the style of one image to another",
            )
            .input("content", Image)
            .input("style", Style)
            .output("image", Image),
            NodeKind::Upscale => NodeDefinition::new(
                *self,
                Processing,
                "Upscale",
                "Re-renders an image at a higher resolution",
            )
            .input("image", Image)
            .output("image", Image)
            .config(json!({
                "targetSize": defaults::UPSCALE_TARGET_SIZE,
                "quality": defaults::UPSCALE_QUALITY
            })),
            NodeKind::Analyze => NodeDefinition::new(
                *self,
                Processing,
                "Analyze",
                "Extracts palette, keywords and a description from an image",
            )
            .input("image", Image)
            .output("palette", Palette)
            .output("keywords", TextArray)
            .output("description", Text),
            NodeKind::Composite => NodeDefinition::new(
                *self,
                Processing,
                "Composite",
                "Combines two or more images into one",
            )
            .input("image1", Image)
            .input("image2", Image)
            .input("image3", Image)
            .input("image4", Image)
            .input("prompt", Text)
            .output("image", Image)
            .config(json!({ "prompt": "" })),
            NodeKind::Output => {
                NodeDefinition::new(*self, Output, "Output", "Displays the final image")
                    .input("image", Image)
                    .output("image", Image)
            }
            NodeKind::BatchGenerate => NodeDefinition::new(
                *self,
                Processing,
                "Batch Generate",
                "Generates one image per prompt, a few at a time",
            )
            .input("prompts", TextArray)
            .output("images", ImageArray)
            .config(json!({
                "prompts": [],
                "templateMode": false,
                "template": "",
                "variables": [],
                "parallelLimit": defaults::PARALLEL_LIMIT,
                "aspectRatio": defaults::ASPECT_RATIO,
                "quality": defaults::QUALITY
            })),
            NodeKind::CompareGrid => NodeDefinition::new(
                *self,
                Output,
                "Compare Grid",
                "Shows a set of images and selects one",
            )
            .input("images", ImageArray)
            .output("selected", Image)
            .output("images", ImageArray),
            NodeKind::Inpaint => NodeDefinition::new(
                *self,
                Processing,
                "Inpaint",
                "Edits an image following an instruction",
            )
            .input("image", Image)
            .input("mask", Mask)
            .input("instruction", Text)
            .output("image", Image)
            .config(json!({ "instruction": "", "quality": defaults::QUALITY })),
        }
    }
}

/// Definitions for every node kind, in palette order
pub fn all_definitions() -> Vec<NodeDefinition> {
    NodeKind::ALL.iter().map(NodeKind::definition).collect()
}

impl GraphNode {
    /// Create a node of `kind` with default ports and configuration
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        kind.definition().instantiate(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_definition() {
        let defs = all_definitions();
        assert_eq!(defs.len(), NodeKind::ALL.len());
        for def in &defs {
            assert!(!def.label.is_empty());
            assert!(!def.outputs.is_empty(), "{} has no outputs", def.kind);
        }
    }

    #[test]
    fn test_sources_have_no_inputs() {
        for kind in [NodeKind::ImageInput, NodeKind::TextInput, NodeKind::TextArrayInput] {
            let def = kind.definition();
            assert_eq!(def.category, NodeCategory::Input);
            assert!(def.inputs.is_empty());
        }
    }

    #[test]
    fn test_factory_copies_defaults() {
        let node = GraphNode::new("gen-1", NodeKind::Generate);
        assert_eq!(node.node_type, "generate");
        assert_eq!(node.status, NodeStatus::Idle);
        assert_eq!(node.config["aspectRatio"], "1:1");
        assert!(node.input_port("in-prompt").is_some());
        assert!(node.output_port("out-image").is_some());
    }

    #[test]
    fn test_port_ids_unique_within_node() {
        for def in all_definitions() {
            let mut ids: Vec<_> = def
                .inputs
                .iter()
                .chain(def.outputs.iter())
                .map(|p| p.id.clone())
                .collect();
            let total = ids.len();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), total, "duplicate port id on {}", def.kind);
        }
    }
}
