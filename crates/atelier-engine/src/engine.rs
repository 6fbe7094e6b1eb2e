//! Workflow run controller
//!
//! The runner validates a graph, orders it, and walks the nodes one at a
//! time: resolve inputs, consult the cache, execute on a miss, and report
//! every status change through the event sink. The first failing node ends
//! the run.
//!
//! Node status changes are applied to the caller's graph as they are
//! reported, so after a run the graph reflects what the sink saw.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::GenerationBackend;
use crate::cache::{hash_inputs, ResultCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, NodeUpdate, WorkflowEvent};
use crate::executor::NodeExecutor;
use crate::resolver::resolve_inputs;
use crate::scheduler::{execution_order, execution_order_for};
use crate::types::{NodeId, WorkflowGraph};
use crate::validation::validate_workflow;
use crate::value::NodeValue;

/// Cooperative cancellation flag shared between a host and a run
///
/// Checked at every node boundary; a node already executing finishes first.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run holding this signal
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub execution_id: String,
    /// This run's result for every processed node
    pub results: HashMap<NodeId, NodeValue>,
    /// Processed nodes in execution order, cache hits included
    pub executed: Vec<NodeId>,
    /// How many of `executed` were served from the cache
    pub cache_hits: usize,
}

/// Runs workflow graphs against a generation backend
pub struct WorkflowRunner {
    executor: NodeExecutor,
    cache: Option<Arc<ResultCache>>,
}

impl WorkflowRunner {
    /// Create a runner with default executor settings and no cache
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            executor: NodeExecutor::new(backend),
            cache: None,
        }
    }

    /// Create a runner whose executor follows `config`
    pub fn from_config(backend: Arc<dyn GenerationBackend>, config: &EngineConfig) -> Self {
        let executor = NodeExecutor::new(backend)
            .with_timeout(Duration::from_secs(config.backend.timeout_secs))
            .with_parallel_limit(config.batch.parallel_limit);
        Self {
            executor,
            cache: None,
        }
    }

    /// Memoize results in `cache` (ignored if the cache is disabled)
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn active_cache(&self) -> Option<&ResultCache> {
        self.cache.as_deref().filter(|c| c.is_enabled())
    }

    /// Validate and execute the whole graph
    pub async fn run(
        &self,
        graph: &mut WorkflowGraph,
        sink: &dyn EventSink,
        abort: &AbortSignal,
    ) -> Result<RunSummary> {
        let execution_id = uuid::Uuid::new_v4().to_string();

        let report = validate_workflow(graph);
        if !report.valid {
            let message = report.message();
            log::warn!("Refusing to run '{}': {}", graph.name, message);
            emit(sink, WorkflowEvent::run_failed(&execution_id, &message));
            return Err(EngineError::ValidationFailed(message));
        }

        log::info!(
            "Starting run {} of '{}' ({} nodes)",
            execution_id,
            graph.name,
            graph.nodes.len()
        );
        emit(
            sink,
            WorkflowEvent::RunStarted {
                execution_id: execution_id.clone(),
                node_count: graph.nodes.len(),
            },
        );

        let node_ids: Vec<NodeId> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        for node_id in &node_ids {
            report_update(graph, sink, node_id, NodeUpdate::idle());
        }

        let order = execution_order(graph);
        self.execute_in_order(graph, order, sink, abort, execution_id)
            .await
    }

    /// Execute one node and everything it depends on
    ///
    /// Skips validation and leaves nodes outside the dependency closure
    /// untouched.
    pub async fn run_node(
        &self,
        graph: &mut WorkflowGraph,
        target: &str,
        sink: &dyn EventSink,
        abort: &AbortSignal,
    ) -> Result<RunSummary> {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let order = execution_order_for(graph, target)?;

        log::info!(
            "Starting run {} of '{}' up to '{}' ({} nodes)",
            execution_id,
            graph.name,
            target,
            order.len()
        );
        emit(
            sink,
            WorkflowEvent::RunStarted {
                execution_id: execution_id.clone(),
                node_count: order.len(),
            },
        );

        self.execute_in_order(graph, order, sink, abort, execution_id)
            .await
    }

    async fn execute_in_order(
        &self,
        graph: &mut WorkflowGraph,
        order: Vec<NodeId>,
        sink: &dyn EventSink,
        abort: &AbortSignal,
        execution_id: String,
    ) -> Result<RunSummary> {
        let mut results: HashMap<NodeId, NodeValue> = HashMap::new();
        let mut executed = Vec::with_capacity(order.len());
        let mut cache_hits = 0;

        for node_id in order {
            if abort.is_aborted() {
                log::info!("Run {} cancelled before '{}'", execution_id, node_id);
                emit(sink, WorkflowEvent::run_failed(&execution_id, "Workflow cancelled"));
                return Err(EngineError::Cancelled);
            }

            let node = graph
                .find_node(&node_id)
                .cloned()
                .ok_or_else(|| EngineError::NodeNotFound(node_id.clone()))?;

            report_update(graph, sink, &node_id, NodeUpdate::running());

            let inputs = resolve_inputs(graph, &node, &results);
            let cache = self.active_cache();
            let input_hash = cache.map(|_| hash_inputs(&node, &inputs));

            if let (Some(cache), Some(hash)) = (cache, input_hash.as_deref()) {
                if let Some(value) = cache.get(&node_id, hash) {
                    log::debug!("Cache hit for '{}'", node_id);
                    report_update(graph, sink, &node_id, NodeUpdate::complete(value.clone(), true));
                    results.insert(node_id.clone(), value);
                    executed.push(node_id);
                    cache_hits += 1;
                    continue;
                }
                log::debug!("Cache miss for '{}'", node_id);
            }

            match self.executor.execute(&node, &inputs, sink).await {
                Ok(value) => {
                    if let (Some(cache), Some(hash)) = (cache, input_hash.as_deref()) {
                        if let Err(e) = cache.set(&node_id, hash, value.clone(), &node.node_type) {
                            log::warn!("Failed to persist cache entry for '{}': {}", node_id, e);
                        }
                    }
                    report_update(graph, sink, &node_id, NodeUpdate::complete(value.clone(), false));
                    results.insert(node_id.clone(), value);
                    executed.push(node_id);
                }
                Err(source) => {
                    log::error!("Node '{}' ({}) failed: {}", node_id, node.node_type, source);
                    report_update(graph, sink, &node_id, NodeUpdate::error(source.to_string()));

                    let err = EngineError::NodeFailed {
                        node_id,
                        node_type: node.node_type,
                        source,
                    };
                    emit(sink, WorkflowEvent::run_failed(&execution_id, err.to_string()));
                    return Err(err);
                }
            }
        }

        log::info!(
            "Run {} complete: {} node(s), {} from cache",
            execution_id,
            executed.len(),
            cache_hits
        );
        emit(
            sink,
            WorkflowEvent::RunCompleted {
                execution_id: execution_id.clone(),
                results: results.clone(),
            },
        );

        Ok(RunSummary {
            execution_id,
            results,
            executed,
            cache_hits,
        })
    }
}

/// Apply an update to the graph snapshot and report it
fn report_update(graph: &mut WorkflowGraph, sink: &dyn EventSink, node_id: &str, update: NodeUpdate) {
    if let Some(node) = graph.find_node_mut(node_id) {
        node.apply(&update);
    }
    emit(sink, WorkflowEvent::node_updated(node_id, update));
}

fn emit(sink: &dyn EventSink, event: WorkflowEvent) {
    if let Err(e) = sink.send(event) {
        log::warn!("Failed to send workflow event: {}", e);
    }
}
