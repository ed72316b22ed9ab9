//! Execution of exec (control-flow) chains.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::context::ExecContext;
use super::dataflow::SharedDataflow;
use crate::error::LibraryError;
use crate::model::graph::{SharedGraph, read_graph};
use crate::model::node::NodeStatus;
use crate::model::port::PortDirection;
use crate::plugin::Retrigger;

/// Which nodes a call to [`ControlFlowEngine::execute`] touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecReport {
    /// Nodes whose `execute()` ran, in order. A node appears once per run.
    pub executed: Vec<Uuid>,
    /// Nodes that were RUNNING and dropped the trigger.
    pub ignored: Vec<Uuid>,
    /// Nodes that were RUNNING and got cancelled by the trigger.
    pub cancelled: Vec<Uuid>,
}

pub struct ControlFlowEngine {
    graph: SharedGraph,
    dataflow: SharedDataflow,
    running: Mutex<HashMap<Uuid, (u64, CancellationToken)>>,
    next_run: AtomicU64,
}

impl ControlFlowEngine {
    pub fn new(graph: SharedGraph, dataflow: SharedDataflow) -> Self {
        Self {
            graph,
            dataflow,
            running: Mutex::new(HashMap::new()),
            next_run: AtomicU64::new(0),
        }
    }

    /// Execute `node_id` through `input_key` and follow every forwarded exec
    /// output depth-first until the chain ends.
    ///
    /// An error returned by a node aborts the rest of the chain and is
    /// propagated to the caller.
    pub async fn execute(
        &self,
        node_id: Uuid,
        input_key: Option<&str>,
    ) -> Result<ExecReport, LibraryError> {
        let mut report = ExecReport::default();
        let mut stack: Vec<(Uuid, Option<String>)> = vec![(node_id, input_key.map(str::to_string))];

        while let Some((current, input)) = stack.pop() {
            let (behavior, status, controls) = {
                let graph = read_graph(&self.graph)?;
                let entry = graph
                    .get_node(current)
                    .ok_or(LibraryError::NodeNotFound(current))?;
                if let Some(key) = &input {
                    match entry.core.port(PortDirection::Input, key) {
                        Some(port) if port.is_exec() => {}
                        Some(_) => {
                            return Err(LibraryError::execution(format!(
                                "Input '{}' of {} is not an exec port",
                                key, current
                            )));
                        }
                        None => return Err(LibraryError::port_not_found(current, key)),
                    }
                }
                (
                    entry.behavior.clone(),
                    entry.status.clone(),
                    entry.core.control_values(),
                )
            };

            if status.get().is_running() || self.is_running(current) {
                match behavior.retrigger() {
                    Retrigger::Ignore => {
                        debug!("Node {} is running, ignoring trigger", current);
                        report.ignored.push(current);
                    }
                    Retrigger::Cancel => {
                        info!("Node {} re-triggered while running, cancelling", current);
                        self.cancel(current);
                        report.cancelled.push(current);
                    }
                }
                continue;
            }

            let (run_id, token) = self.begin(current)?;
            let ctx = ExecContext::new(&self.dataflow, current, status.clone(), token, controls);
            let result = behavior.execute(input.as_deref(), &ctx).await;
            drop(ctx);
            self.finish(current, run_id);
            report.executed.push(current);

            let forward = match result {
                Ok(forward) => forward,
                Err(err) => {
                    if status.get().is_running() {
                        status.change(NodeStatus::Error(err.to_string()));
                    }
                    warn!("Execution of {} failed: {}", current, err);
                    return Err(err);
                }
            };

            // Outputs may depend on state the execution just changed.
            self.dataflow.reset_with_dependents(current)?;

            {
                let graph = read_graph(&self.graph)?;
                for key in forward.keys().iter().rev() {
                    let targets: Vec<_> = graph.outgoing(current, key).collect();
                    if targets.is_empty() {
                        debug!("{}.{} forwards to nothing", current, key);
                    }
                    for conn in targets.into_iter().rev() {
                        stack.push((conn.to.node_id, Some(conn.to.key.clone())));
                    }
                }
            }
        }

        Ok(report)
    }

    /// Cancel a running execution of `node_id`. Returns whether one was running.
    pub fn cancel(&self, node_id: Uuid) -> bool {
        let Ok(running) = self.running.lock() else {
            return false;
        };
        match running.get(&node_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        if let Ok(running) = self.running.lock() {
            for (_, token) in running.values() {
                token.cancel();
            }
        }
    }

    pub fn is_running(&self, node_id: Uuid) -> bool {
        self.running
            .lock()
            .map(|r| r.contains_key(&node_id))
            .unwrap_or(false)
    }

    fn begin(&self, node_id: Uuid) -> Result<(u64, CancellationToken), LibraryError> {
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.running
            .lock()
            .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))?
            .insert(node_id, (run_id, token.clone()));
        Ok((run_id, token))
    }

    fn finish(&self, node_id: Uuid, run_id: u64) {
        if let Ok(mut running) = self.running.lock() {
            if running.get(&node_id).is_some_and(|(id, _)| *id == run_id) {
                running.remove(&node_id);
            }
        }
    }
}
