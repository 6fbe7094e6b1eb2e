//! Graph validation for workflow graphs
//!
//! Validates graph structure before a run:
//! - Cycle detection (iterative depth-first search)
//! - Connections that reference missing nodes
//! - Nodes whose inputs are all unconnected

use std::collections::{HashMap, HashSet};

use crate::types::{NodeKind, WorkflowGraph};

/// Validation error with location context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The graph contains at least one cycle
    #[error("graph contains a cycle")]
    CyclicGraph,

    /// A node with declared inputs has none connected
    #[error("{node_type} node '{node_id}' has no connected inputs")]
    UnconnectedRequiredInput { node_id: String, node_type: String },

    /// A connection references a node that does not exist
    #[error("Connection '{connection_id}' references unknown node '{node_id}'")]
    DanglingConnection {
        connection_id: String,
        node_id: String,
    },
}

/// Outcome of validating a graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// All error messages joined into one line
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate a workflow graph
///
/// A cycle ends validation with that single error. Otherwise all
/// remaining problems are collected, not just the first.
pub fn validate_workflow(graph: &WorkflowGraph) -> ValidationReport {
    if has_cycle(graph) {
        return ValidationReport::from_errors(vec![ValidationError::CyclicGraph]);
    }

    let mut errors = Vec::new();
    validate_connection_references(graph, &mut errors);
    validate_required_inputs(graph, &mut errors);

    ValidationReport::from_errors(errors)
}

/// Detect a cycle with an iterative depth-first search
///
/// Each stack frame is (node id, index of the next outgoing edge to try).
/// A node reached while still on the stack closes a cycle.
fn has_cycle(graph: &WorkflowGraph) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for conn in &graph.connections {
        adjacency
            .entry(conn.source.as_str())
            .or_default()
            .push(conn.target.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    for node in &graph.nodes {
        if !visited.insert(node.id.as_str()) {
            continue;
        }
        on_stack.insert(node.id.as_str());
        let mut stack: Vec<(&str, usize)> = vec![(node.id.as_str(), 0)];

        while let Some(frame) = stack.last_mut() {
            let (current, edge_index) = *frame;
            let successors = adjacency.get(current).map(Vec::as_slice).unwrap_or(&[]);

            match successors.get(edge_index) {
                Some(&next) => {
                    frame.1 += 1;
                    if on_stack.contains(next) {
                        return true;
                    }
                    if visited.insert(next) {
                        on_stack.insert(next);
                        stack.push((next, 0));
                    }
                }
                None => {
                    on_stack.remove(current);
                    stack.pop();
                }
            }
        }
    }

    false
}

/// Check that all connection endpoints exist
fn validate_connection_references(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    for conn in &graph.connections {
        for endpoint in [&conn.source, &conn.target] {
            if !node_ids.contains(endpoint.as_str()) {
                errors.push(ValidationError::DanglingConnection {
                    connection_id: conn.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }
}

/// Check that every node with declared inputs has at least one connected
///
/// Exempt: pure sources, batch nodes in template mode, and generate nodes
/// carrying their own prompt.
fn validate_required_inputs(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let connected: HashSet<&str> = graph
        .connections
        .iter()
        .map(|c| c.target.as_str())
        .collect();

    for node in &graph.nodes {
        if node.inputs.is_empty() || connected.contains(node.id.as_str()) {
            continue;
        }

        let exempt = match node.kind() {
            Ok(NodeKind::BatchGenerate) => node.config_flag("templateMode"),
            Ok(NodeKind::Generate) => node.config_str("prompt").is_some(),
            _ => false,
        };

        if !exempt {
            errors.push(ValidationError::UnconnectedRequiredInput {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }
}
