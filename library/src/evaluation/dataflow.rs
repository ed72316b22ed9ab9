//! Pull-based dataflow evaluation with a per-node output cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use log::{debug, trace};
use uuid::Uuid;

use super::context::{DataContext, InputValues, OutputValues};
use crate::error::LibraryError;
use crate::model::graph::{SharedGraph, read_graph};
use crate::model::graph_analysis::data_dependents;
use crate::model::port::PortDirection;
use crate::util::timing::ScopedTimer;

/// Resolves node outputs on demand.
///
/// Each node's output set is memoized by node id until [`DataflowEngine::reset`]
/// is called for it. The engine does not track reverse dependencies on its own;
/// callers use [`DataflowEngine::reset_with_dependents`] after value-affecting
/// mutations.
pub struct DataflowEngine {
    graph: SharedGraph,
    cache: Mutex<HashMap<Uuid, OutputValues>>,
}

impl DataflowEngine {
    pub fn new(graph: SharedGraph) -> Self {
        Self {
            graph,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Resolve the inputs of `node_id`. `keys` of `None` means every data input.
    ///
    /// Each key yields the values of all connected upstream outputs in
    /// connection order. Upstream nodes that produce no value for the
    /// connected output contribute nothing.
    pub fn fetch_inputs(
        &self,
        node_id: Uuid,
        keys: Option<Vec<String>>,
    ) -> BoxFuture<'_, Result<InputValues, LibraryError>> {
        async move {
            let (plan, controls) = {
                let graph = read_graph(&self.graph)?;
                let entry = graph
                    .get_node(node_id)
                    .ok_or(LibraryError::NodeNotFound(node_id))?;
                let keys = match keys {
                    Some(keys) => {
                        for key in &keys {
                            if entry.core.port(PortDirection::Input, key).is_none() {
                                return Err(LibraryError::port_not_found(node_id, key));
                            }
                        }
                        keys
                    }
                    None => entry
                        .core
                        .inputs
                        .iter()
                        .filter(|p| !p.is_exec())
                        .map(|p| p.key.clone())
                        .collect(),
                };
                let plan: Vec<(String, Vec<(Uuid, String)>)> = keys
                    .into_iter()
                    .map(|key| {
                        let sources = graph
                            .incoming(node_id, &key)
                            .map(|c| (c.from.node_id, c.from.key.clone()))
                            .collect();
                        (key, sources)
                    })
                    .collect();
                (plan, entry.core.control_values())
            };

            let mut values = BTreeMap::new();
            for (key, sources) in plan {
                let mut resolved = Vec::with_capacity(sources.len());
                for (source_id, output_key) in sources {
                    let outputs = self.fetch_outputs(source_id).await?;
                    match outputs.get(&output_key) {
                        Some(value) => resolved.push(value.clone()),
                        None => trace!("{}.{} produced no value", source_id, output_key),
                    }
                }
                values.insert(key, resolved);
            }
            Ok(InputValues::new(values, controls))
        }
        .boxed()
    }

    /// Output values of `node_id`, evaluating it if it is not cached.
    pub fn fetch_outputs(&self, node_id: Uuid) -> BoxFuture<'_, Result<OutputValues, LibraryError>> {
        async move {
            if let Some(cached) = self.cached(node_id)? {
                return Ok(cached);
            }

            let (behavior, status, type_id) = {
                let graph = read_graph(&self.graph)?;
                let entry = graph
                    .get_node(node_id)
                    .ok_or(LibraryError::NodeNotFound(node_id))?;
                (
                    entry.behavior.clone(),
                    entry.status.clone(),
                    entry.core.type_id.clone(),
                )
            };

            let outputs = {
                let _timer = ScopedTimer::debug_lazy(|| format!("data {} ({})", node_id, type_id));
                let ctx = DataContext::new(self, node_id, status);
                behavior.data_with_fetch(&ctx).await?
            };

            self.lock_cache()?.insert(node_id, outputs.clone());
            Ok(outputs)
        }
        .boxed()
    }

    /// Invalidate exactly one node's cached outputs.
    pub fn reset(&self, node_id: Uuid) -> Result<(), LibraryError> {
        if self.lock_cache()?.remove(&node_id).is_some() {
            debug!("Reset dataflow cache for {}", node_id);
        }
        Ok(())
    }

    /// Invalidate a node and every node consuming its data, transitively.
    pub fn reset_with_dependents(&self, node_id: Uuid) -> Result<(), LibraryError> {
        let dependents = {
            let graph = read_graph(&self.graph)?;
            data_dependents(&graph, node_id)
        };
        let mut cache = self.lock_cache()?;
        cache.remove(&node_id);
        for id in dependents {
            cache.remove(&id);
        }
        Ok(())
    }

    pub fn reset_all(&self) -> Result<(), LibraryError> {
        self.lock_cache()?.clear();
        Ok(())
    }

    pub fn is_cached(&self, node_id: Uuid) -> bool {
        self.cached(node_id).ok().flatten().is_some()
    }

    fn cached(&self, node_id: Uuid) -> Result<Option<OutputValues>, LibraryError> {
        Ok(self.lock_cache()?.get(&node_id).cloned())
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, OutputValues>>, LibraryError> {
        self.cache
            .lock()
            .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))
    }
}

/// Shared handle used by the control-flow engine and the editor.
pub type SharedDataflow = Arc<DataflowEngine>;
