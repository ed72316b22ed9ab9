use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use super::history::{GraphMutation, HistoryHook};
use crate::channel::OperationTransport;
use crate::config::EngineConfig;
use crate::error::LibraryError;
use crate::evaluation::{ControlFlowEngine, DataflowEngine, SharedDataflow};
use crate::model::graph::{Graph, SharedGraph, read_graph};
use crate::plugin::{NodeDeps, NodeRegistry};

/// Public entry point for hosts driving a graph.
///
/// Owns one graph together with its engines. Cloning is cheap and clones
/// share the same graph.
#[derive(Clone)]
pub struct Editor {
    pub(super) graph: SharedGraph,
    pub(super) registry: Arc<NodeRegistry>,
    pub(super) dataflow: SharedDataflow,
    pub(super) control_flow: Arc<ControlFlowEngine>,
    pub(super) deps: NodeDeps,
    pub(super) history: Option<Arc<dyn HistoryHook>>,
}

impl Editor {
    pub fn new(registry: Arc<NodeRegistry>, config: EngineConfig) -> Self {
        let graph = Graph::new().into_shared();
        let dataflow = Arc::new(DataflowEngine::new(graph.clone()));
        let control_flow = Arc::new(ControlFlowEngine::new(graph.clone(), dataflow.clone()));
        Self {
            graph,
            registry,
            dataflow,
            control_flow,
            deps: NodeDeps::new(config),
            history: None,
        }
    }

    pub fn with_builtin_nodes(config: EngineConfig) -> Self {
        Self::new(Arc::new(NodeRegistry::with_builtin_nodes()), config)
    }

    /// Transport handed to nodes created from now on.
    pub fn with_transport(mut self, transport: Arc<dyn OperationTransport>) -> Self {
        self.deps = self.deps.with_transport(transport);
        self
    }

    pub fn with_history(mut self, hook: Arc<dyn HistoryHook>) -> Self {
        self.history = Some(hook);
        self
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn dataflow(&self) -> &SharedDataflow {
        &self.dataflow
    }

    pub fn control_flow(&self) -> &Arc<ControlFlowEngine> {
        &self.control_flow
    }

    pub fn config(&self) -> &EngineConfig {
        &self.deps.config
    }

    /// Access the graph immutably via a closure.
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> Result<R, LibraryError> {
        let graph = read_graph(&self.graph)?;
        Ok(f(&graph))
    }

    pub(super) fn record(&self, mutation: GraphMutation) {
        if let Some(hook) = &self.history {
            hook.record(&mutation);
        }
    }

    /// Drop cached outputs of `nodes` and everything downstream of them.
    pub(super) fn invalidate(&self, nodes: impl IntoIterator<Item = Uuid>) -> Result<(), LibraryError> {
        for id in nodes {
            debug!("Invalidating {} and its dependents", id);
            self.dataflow.reset_with_dependents(id)?;
        }
        Ok(())
    }
}
