use log::info;
use tokio::sync::watch;
use uuid::Uuid;

use super::editor_service::Editor;
use super::handlers::GraphHandler;
use super::history::GraphMutation;
use crate::error::LibraryError;
use crate::evaluation::{ExecReport, InputValues, OutputValues};
use crate::model::connection::{Connection, PortRef};
use crate::model::graph::{NodeEntry, read_graph};
use crate::model::node::{NodeStatus, Position};
use crate::model::propagation::PropagationReport;
use crate::model::value::Value;

/// Graph mutations.
impl Editor {
    pub fn add_node(&self, type_id: &str, position: Position) -> Result<Uuid, LibraryError> {
        let mut entry = self.registry.create(type_id, None, &self.deps)?;
        entry.core.position = position;
        let id = GraphHandler::add_node(&self.graph, entry)?;
        info!("Added {} node {}", type_id, id);
        self.record(GraphMutation::NodeAdded {
            id,
            type_id: type_id.to_string(),
        });
        Ok(id)
    }

    /// Remove a node. A running execution of it is cancelled first, then its
    /// connections are removed with the usual invalidation and schema pass.
    pub fn remove_node(&self, node_id: Uuid) -> Result<NodeEntry, LibraryError> {
        if self.control_flow.cancel(node_id) {
            info!("Cancelled running execution of {} before removal", node_id);
        }
        self.invalidate([node_id])?;

        let (entry, report) = GraphHandler::remove_node(&self.graph, node_id)?;
        self.invalidate_after(&report, None, Some(node_id))?;

        self.record(GraphMutation::NodeRemoved {
            id: node_id,
            type_id: entry.core.type_id.clone(),
            connections: report.removed_connections.clone(),
        });
        Ok(entry)
    }

    pub fn move_node(&self, node_id: Uuid, position: Position) -> Result<(), LibraryError> {
        let from = GraphHandler::move_node(&self.graph, node_id, position)?;
        self.record(GraphMutation::NodeMoved {
            id: node_id,
            from,
            to: position,
        });
        Ok(())
    }

    /// Connect an output to an input. Returns the new connection id.
    pub fn connect(&self, from: PortRef, to: PortRef) -> Result<Uuid, LibraryError> {
        let (connection, report) = GraphHandler::add_connection(&self.graph, from, to)?;
        self.invalidate_after(&report, Some(connection.to.node_id), None)?;
        let id = connection.id;
        self.record(GraphMutation::Connected(connection));
        Ok(id)
    }

    pub fn disconnect(&self, connection_id: Uuid) -> Result<Connection, LibraryError> {
        let (connection, report) = GraphHandler::remove_connection(&self.graph, connection_id)?;
        self.invalidate_after(&report, Some(connection.to.node_id), None)?;
        self.record(GraphMutation::Disconnected(connection.clone()));
        Ok(connection)
    }

    /// Set a control value and invalidate the node and its data dependents.
    pub fn set_control(&self, node_id: Uuid, key: &str, value: Value) -> Result<(), LibraryError> {
        let previous = GraphHandler::set_control(&self.graph, node_id, key, value.clone())?;
        self.invalidate([node_id])?;
        self.record(GraphMutation::ControlChanged {
            node: node_id,
            key: key.to_string(),
            previous,
            value,
        });
        Ok(())
    }

    fn invalidate_after(
        &self,
        report: &PropagationReport,
        target: Option<Uuid>,
        removed: Option<Uuid>,
    ) -> Result<(), LibraryError> {
        let nodes = target
            .into_iter()
            .chain(report.touched_nodes())
            .filter(|id| Some(*id) != removed);
        self.invalidate(nodes)
    }
}

/// Evaluation and execution.
impl Editor {
    pub async fn execute(&self, node_id: Uuid, input: Option<&str>) -> Result<ExecReport, LibraryError> {
        self.control_flow.execute(node_id, input).await
    }

    /// Cancel a running execution. Returns whether one was running.
    pub fn cancel(&self, node_id: Uuid) -> bool {
        self.control_flow.cancel(node_id)
    }

    pub async fn fetch_inputs(
        &self,
        node_id: Uuid,
        keys: Option<Vec<String>>,
    ) -> Result<InputValues, LibraryError> {
        self.dataflow.fetch_inputs(node_id, keys).await
    }

    pub async fn fetch_outputs(&self, node_id: Uuid) -> Result<OutputValues, LibraryError> {
        self.dataflow.fetch_outputs(node_id).await
    }

    pub fn reset(&self, node_id: Uuid) -> Result<(), LibraryError> {
        self.dataflow.reset(node_id)
    }
}

/// Queries.
impl Editor {
    pub fn status(&self, node_id: Uuid) -> Result<NodeStatus, LibraryError> {
        let graph = read_graph(&self.graph)?;
        graph
            .get_node(node_id)
            .map(|entry| entry.status.get())
            .ok_or(LibraryError::NodeNotFound(node_id))
    }

    pub fn subscribe_status(&self, node_id: Uuid) -> Result<watch::Receiver<NodeStatus>, LibraryError> {
        let graph = read_graph(&self.graph)?;
        graph
            .get_node(node_id)
            .map(|entry| entry.status.subscribe())
            .ok_or(LibraryError::NodeNotFound(node_id))
    }

    /// Access one node immutably via a closure.
    pub fn with_node<R>(&self, node_id: Uuid, f: impl FnOnce(&NodeEntry) -> R) -> Result<R, LibraryError> {
        let graph = read_graph(&self.graph)?;
        let entry = graph
            .get_node(node_id)
            .ok_or(LibraryError::NodeNotFound(node_id))?;
        Ok(f(entry))
    }

    pub fn node_ids(&self) -> Result<Vec<Uuid>, LibraryError> {
        Ok(read_graph(&self.graph)?.node_ids().to_vec())
    }

    pub fn connections(&self) -> Result<Vec<Connection>, LibraryError> {
        Ok(read_graph(&self.graph)?.connections().to_vec())
    }
}
