//! Execution ordering
//!
//! Derives a topological order from the connection set each run, using
//! in-degree counting with a FIFO queue seeded in node insertion order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{EngineError, Result};
use crate::types::{NodeId, WorkflowGraph};

/// Topological order over every node in the graph
///
/// Nodes on a cycle (and anything downstream of one) are silently left
/// out. Callers validate the graph first.
pub fn execution_order(graph: &WorkflowGraph) -> Vec<NodeId> {
    let all: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    order_subset(graph, &all)
}

/// The target node plus every node it transitively depends on
pub fn dependency_closure(graph: &WorkflowGraph, target: &str) -> Result<HashSet<NodeId>> {
    if graph.find_node(target).is_none() {
        return Err(EngineError::NodeNotFound(target.to_string()));
    }

    let mut closure = HashSet::new();
    let mut stack = vec![target.to_string()];

    while let Some(node_id) = stack.pop() {
        if !closure.insert(node_id.clone()) {
            continue;
        }
        for dep in graph.get_dependencies(&node_id) {
            if !closure.contains(&dep) {
                stack.push(dep);
            }
        }
    }

    Ok(closure)
}

/// Topological order restricted to the target's dependency closure
pub fn execution_order_for(graph: &WorkflowGraph, target: &str) -> Result<Vec<NodeId>> {
    let closure = dependency_closure(graph, target)?;
    let members: Vec<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| closure.contains(*id))
        .collect();
    Ok(order_subset(graph, &members))
}

/// Kahn's algorithm over `members`, ignoring edges that leave the subset
fn order_subset(graph: &WorkflowGraph, members: &[&str]) -> Vec<NodeId> {
    let member_set: HashSet<&str> = members.iter().copied().collect();
    let mut in_degree: HashMap<&str, usize> = members.iter().map(|id| (*id, 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();

    for conn in &graph.connections {
        let (src, tgt) = (conn.source.as_str(), conn.target.as_str());
        if !member_set.contains(src) || !member_set.contains(tgt) {
            continue;
        }
        successors.entry(src).or_default().push(tgt);
        if let Some(degree) = in_degree.get_mut(tgt) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<&str> = members
        .iter()
        .copied()
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(members.len());

    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());

        for next in successors.get(node_id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if order.len() < members.len() {
        log::debug!(
            "Execution order omits {} node(s) on or behind a cycle",
            members.len() - order.len()
        );
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::types::NodeKind;

    fn position(order: &[NodeId], id: &str) -> usize {
        order.iter().position(|n| n == id).unwrap()
    }

    fn assert_respects_edges(graph: &WorkflowGraph, order: &[NodeId]) {
        for conn in &graph.connections {
            assert!(
                position(order, &conn.source) < position(order, &conn.target),
                "{} should run before {}",
                conn.source,
                conn.target
            );
        }
    }

    fn pipeline() -> WorkflowGraph {
        WorkflowBuilder::new("wf", "Pipeline")
            .add_node("out", NodeKind::Output)
            .add_node("up", NodeKind::Upscale)
            .add_node("gen", NodeKind::Generate)
            .add_node("text", NodeKind::TextInput)
            .connect("text", "text", "gen", "prompt")
            .connect("gen", "image", "up", "image")
            .connect("up", "image", "out", "image")
            .build()
    }

    #[test]
    fn test_linear_order_ignores_insertion_order() {
        let graph = pipeline();
        let order = execution_order(&graph);
        assert_eq!(order, vec!["text", "gen", "up", "out"]);
    }

    #[test]
    fn test_every_node_exactly_once() {
        let graph = WorkflowBuilder::new("wf", "Fan")
            .add_node("src", NodeKind::ImageInput)
            .add_node("a", NodeKind::Upscale)
            .add_node("b", NodeKind::Analyze)
            .add_node("mix", NodeKind::Composite)
            .add_node("lonely", NodeKind::TextInput)
            .connect("src", "image", "a", "image")
            .connect("src", "image", "b", "image")
            .connect("a", "image", "mix", "image1")
            .connect("src", "image", "mix", "image2")
            .connect("b", "description", "mix", "prompt")
            .build();

        let order = execution_order(&graph);
        assert_eq!(order.len(), graph.nodes.len());
        let unique: HashSet<_> = order.iter().collect();
        assert_eq!(unique.len(), order.len());
        assert_respects_edges(&graph, &order);
    }

    #[test]
    fn test_independent_roots_keep_insertion_order() {
        let graph = WorkflowBuilder::new("wf", "Roots")
            .add_node("c", NodeKind::TextInput)
            .add_node("a", NodeKind::TextInput)
            .add_node("b", NodeKind::TextInput)
            .build();

        assert_eq!(execution_order(&graph), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_cycle_members_are_omitted() {
        let graph = WorkflowBuilder::new("wf", "Cyclic")
            .add_node("src", NodeKind::ImageInput)
            .add_node("a", NodeKind::Upscale)
            .add_node("b", NodeKind::Upscale)
            .connect("a", "image", "b", "image")
            .connect("b", "image", "a", "image")
            .build();

        assert_eq!(execution_order(&graph), vec!["src"]);
    }

    #[test]
    fn test_dependency_closure() {
        let mut graph = pipeline();
        graph.add_node(crate::types::GraphNode::new("other", NodeKind::ImageInput));

        let closure = dependency_closure(&graph, "up").unwrap();
        let expected: HashSet<NodeId> =
            ["text", "gen", "up"].iter().map(|s| s.to_string()).collect();
        assert_eq!(closure, expected);

        assert_eq!(
            execution_order_for(&graph, "up").unwrap(),
            vec!["text", "gen", "up"]
        );
    }

    #[test]
    fn test_unknown_target() {
        let graph = pipeline();
        assert!(matches!(
            execution_order_for(&graph, "nope"),
            Err(EngineError::NodeNotFound(id)) if id == "nope"
        ));
    }
}
