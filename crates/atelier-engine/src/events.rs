//! Event types for streaming workflow progress
//!
//! Events are sent from the engine to the editor (or any consumer) to
//! report node status transitions, batch progress, and run outcomes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{NodeId, NodeStatus};
use crate::value::NodeValue;

/// Trait for sending workflow events
///
/// This abstracts over the transport mechanism (channel, callback, etc.)
/// allowing the engine to be used without a rendering layer.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Partial update of a node's run state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<NodeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the result was served from the cache
    #[serde(default)]
    pub cached: bool,
}

impl NodeUpdate {
    pub fn idle() -> Self {
        Self {
            status: NodeStatus::Idle,
            result: None,
            error: None,
            cached: false,
        }
    }

    pub fn running() -> Self {
        Self {
            status: NodeStatus::Running,
            ..Self::idle()
        }
    }

    pub fn complete(result: NodeValue, cached: bool) -> Self {
        Self {
            status: NodeStatus::Complete,
            result: Some(result),
            error: None,
            cached,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: NodeStatus::Error,
            error: Some(message.into()),
            ..Self::idle()
        }
    }
}

/// Events emitted during workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    /// A run passed validation and started executing
    #[serde(rename_all = "camelCase")]
    RunStarted {
        execution_id: String,
        node_count: usize,
    },

    /// A node changed status
    #[serde(rename_all = "camelCase")]
    NodeUpdated { node_id: NodeId, update: NodeUpdate },

    /// Progress inside a long-running node (batch chunks)
    #[serde(rename_all = "camelCase")]
    NodeProgress {
        node_id: NodeId,
        completed: usize,
        total: usize,
    },

    /// The run finished successfully
    #[serde(rename_all = "camelCase")]
    RunCompleted {
        execution_id: String,
        results: HashMap<NodeId, NodeValue>,
    },

    /// The run was refused or aborted
    #[serde(rename_all = "camelCase")]
    RunFailed { execution_id: String, error: String },
}

impl WorkflowEvent {
    /// Create a node update event
    pub fn node_updated(node_id: &str, update: NodeUpdate) -> Self {
        Self::NodeUpdated {
            node_id: node_id.to_string(),
            update,
        }
    }

    /// Create a node progress event
    pub fn node_progress(node_id: &str, completed: usize, total: usize) -> Self {
        Self::NodeProgress {
            node_id: node_id.to_string(),
            completed,
            total,
        }
    }

    /// Create a run failed event
    pub fn run_failed(execution_id: &str, error: impl Into<String>) -> Self {
        Self::RunFailed {
            execution_id: execution_id.to_string(),
            error: error.into(),
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    /// Node updates in emission order
    pub fn node_updates(&self) -> Vec<(NodeId, NodeUpdate)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::NodeUpdated { node_id, update } => {
                    Some((node_id.clone(), update.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Forwards events over an unbounded tokio channel
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver that consumes its events
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.tx.send(event).map_err(|_| EventError::channel_closed())
    }
}

/// Invokes a `(node_id, update)` callback for every node transition
///
/// Run-level events are ignored. The callback runs synchronously on the
/// engine's task.
pub struct CallbackEventSink<F>
where
    F: Fn(&str, &NodeUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackEventSink<F>
where
    F: Fn(&str, &NodeUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for CallbackEventSink<F>
where
    F: Fn(&str, &NodeUpdate) + Send + Sync,
{
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        if let WorkflowEvent::NodeUpdated { node_id, update } = &event {
            (self.callback)(node_id, update);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(WorkflowEvent::node_progress("batch", 2, 5)).unwrap();
        sink.send(WorkflowEvent::node_updated("gen", NodeUpdate::running()))
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);

        match &events[0] {
            WorkflowEvent::NodeProgress { node_id, completed, total } => {
                assert_eq!(node_id, "batch");
                assert_eq!((*completed, *total), (2, 5));
            }
            _ => panic!("Expected NodeProgress event"),
        }

        let updates = sink.node_updates();
        assert_eq!(updates, vec![("gen".to_string(), NodeUpdate::running())]);
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(WorkflowEvent::run_failed("exec1", "boom")).unwrap();
    }

    #[tokio::test]
    async fn test_channel_event_sink() {
        let (sink, mut rx) = ChannelEventSink::new();
        sink.send(WorkflowEvent::node_updated("a", NodeUpdate::idle()))
            .unwrap();

        match rx.recv().await {
            Some(WorkflowEvent::NodeUpdated { node_id, .. }) => assert_eq!(node_id, "a"),
            other => panic!("Expected NodeUpdated, got {:?}", other),
        }

        drop(rx);
        assert!(sink
            .send(WorkflowEvent::node_updated("a", NodeUpdate::idle()))
            .is_err());
    }

    #[test]
    fn test_callback_sink_only_sees_node_updates() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();
        let sink = CallbackEventSink::new(move |node_id: &str, update: &NodeUpdate| {
            seen_in_cb.lock().push((node_id.to_string(), update.status));
        });

        sink.send(WorkflowEvent::run_failed("exec", "ignored")).unwrap();
        sink.send(WorkflowEvent::node_updated("n", NodeUpdate::error("bad")))
            .unwrap();

        assert_eq!(*seen.lock(), vec![("n".to_string(), NodeStatus::Error)]);
    }

    #[test]
    fn test_event_serialization() {
        let event = WorkflowEvent::node_updated(
            "gen",
            NodeUpdate::complete(NodeValue::image("img"), true),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "nodeUpdated");
        assert_eq!(json["nodeId"], "gen");
        assert_eq!(json["update"]["status"], "complete");
        assert_eq!(json["update"]["cached"], true);
    }
}
