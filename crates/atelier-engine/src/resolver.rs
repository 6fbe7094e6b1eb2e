//! Input resolution
//!
//! Maps each input port of a node to the value produced this run by the
//! node feeding it.

use std::collections::{BTreeMap, HashMap};

use crate::types::{GraphNode, NodeId, WorkflowGraph};
use crate::value::NodeValue;

/// Resolved inputs, keyed by input port name
///
/// Sorted so that hashing the map is deterministic.
pub type ResolvedInputs = BTreeMap<String, NodeValue>;

/// Resolve the inputs of `node` from this run's results
///
/// Unbound ports and ports whose source has not produced a value are left
/// out of the map. A bundle result is unwrapped by the source output port's
/// name, falling back to the input port's name.
pub fn resolve_inputs(
    graph: &WorkflowGraph,
    node: &GraphNode,
    results: &HashMap<NodeId, NodeValue>,
) -> ResolvedInputs {
    let mut inputs = ResolvedInputs::new();

    for port in &node.inputs {
        let Some(conn) = graph.input_connection(&node.id, &port.id) else {
            continue;
        };
        let Some(value) = results.get(&conn.source) else {
            continue;
        };

        let resolved = if value.is_bundle() {
            let source_port_name = graph
                .find_node(&conn.source)
                .and_then(|src| src.output_port(&conn.source_handle))
                .map(|p| p.name.as_str());

            source_port_name
                .and_then(|name| value.field(name))
                .or_else(|| value.field(&port.name))
                .cloned()
        } else {
            Some(value.clone())
        };

        if let Some(resolved) = resolved {
            inputs.insert(port.name.clone(), resolved);
        }
    }

    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::types::NodeKind;

    fn results(pairs: &[(&str, NodeValue)]) -> HashMap<NodeId, NodeValue> {
        pairs
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_plain_value_passes_through() {
        let graph = WorkflowBuilder::new("wf", "Test")
            .add_node("text", NodeKind::TextInput)
            .add_node("gen", NodeKind::Generate)
            .connect("text", "text", "gen", "prompt")
            .build();

        let inputs = resolve_inputs(
            &graph,
            &graph.nodes[1],
            &results(&[("text", NodeValue::text("sunset"))]),
        );
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs["prompt"], NodeValue::text("sunset"));
    }

    #[test]
    fn test_bundle_unwrapped_by_source_port() {
        let graph = WorkflowBuilder::new("wf", "Test")
            .add_node("an", NodeKind::Analyze)
            .add_node("gen", NodeKind::Generate)
            .connect("an", "description", "gen", "prompt")
            .build();

        let bundle = NodeValue::bundle([
            ("palette", NodeValue::Palette(vec!["#000".into()])),
            ("keywords", NodeValue::TextArray(vec!["calm".into()])),
            ("description", NodeValue::text("a calm sea")),
        ]);

        let inputs = resolve_inputs(&graph, &graph.nodes[1], &results(&[("an", bundle)]));
        assert_eq!(inputs["prompt"], NodeValue::text("a calm sea"));
    }

    #[test]
    fn test_bundle_falls_back_to_input_port_name() {
        let graph = WorkflowBuilder::new("wf", "Test")
            .add_node("grid", NodeKind::CompareGrid)
            .add_node("up", NodeKind::Upscale)
            .connect("grid", "missing", "up", "image")
            .build();

        let bundle = NodeValue::bundle([("image", NodeValue::image("picked"))]);
        let inputs = resolve_inputs(&graph, &graph.nodes[1], &results(&[("grid", bundle)]));
        assert_eq!(inputs["image"], NodeValue::image("picked"));
    }

    #[test]
    fn test_unresolved_inputs_are_absent() {
        let graph = WorkflowBuilder::new("wf", "Test")
            .add_node("img", NodeKind::ImageInput)
            .add_node("mix", NodeKind::Composite)
            .connect("img", "image", "mix", "image1")
            .build();

        // connected but source has no result yet, and unconnected ports
        let inputs = resolve_inputs(&graph, &graph.nodes[1], &HashMap::new());
        assert!(inputs.is_empty());
    }
}
