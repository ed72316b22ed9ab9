use log::debug;
use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::connection::{Connection, PortRef};
use crate::model::graph::{Graph, NodeEntry, SharedGraph, write_graph};
use crate::model::graph_analysis::validate_connection;
use crate::model::node::Position;
use crate::model::port::PortDirection;
use crate::model::propagation::{PropagationReport, SchemaPropagator, merge_reports};
use crate::model::value::Value;

pub struct GraphHandler;

impl GraphHandler {
    pub fn add_node(graph: &SharedGraph, entry: NodeEntry) -> Result<Uuid, LibraryError> {
        let mut graph = write_graph(graph)?;
        graph.add_node(entry)
    }

    /// Remove a node together with all its connections. Each removed
    /// connection runs a schema pass on its far end before the node goes.
    pub fn remove_node(
        graph: &SharedGraph,
        node_id: Uuid,
    ) -> Result<(NodeEntry, PropagationReport), LibraryError> {
        let mut graph = write_graph(graph)?;
        if !graph.contains_node(node_id) {
            return Err(LibraryError::NodeNotFound(node_id));
        }

        let mut reports = Vec::new();
        for conn in graph.connections_for_node(node_id) {
            if graph.get_connection(conn.id).is_none() {
                // Already dropped by an earlier pass.
                continue;
            }
            let (removed, mut report) = Self::disconnect(&mut graph, conn.id)?;
            report.removed_connections.insert(0, removed);
            reports.push(report);
        }

        let entry = graph
            .remove_node(node_id)
            .ok_or(LibraryError::NodeNotFound(node_id))?;
        Ok((entry, merge_reports(reports)))
    }

    pub fn move_node(
        graph: &SharedGraph,
        node_id: Uuid,
        position: Position,
    ) -> Result<Position, LibraryError> {
        let mut graph = write_graph(graph)?;
        let entry = graph
            .get_node_mut(node_id)
            .ok_or(LibraryError::NodeNotFound(node_id))?;
        Ok(std::mem::replace(&mut entry.core.position, position))
    }

    /// Set a control value. Returns the previous value.
    pub fn set_control(
        graph: &SharedGraph,
        node_id: Uuid,
        key: &str,
        value: Value,
    ) -> Result<Value, LibraryError> {
        let mut graph = write_graph(graph)?;
        let entry = graph
            .get_node_mut(node_id)
            .ok_or(LibraryError::NodeNotFound(node_id))?;
        let previous = entry
            .core
            .control_value(key)
            .cloned()
            .ok_or_else(|| LibraryError::invalid(format!("Node {} has no control '{}'", node_id, key)))?;
        entry.core.set_control_value(key, value)?;
        Ok(previous)
    }

    pub fn add_connection(
        graph: &SharedGraph,
        from: PortRef,
        to: PortRef,
    ) -> Result<(Connection, PropagationReport), LibraryError> {
        let mut graph = write_graph(graph)?;
        let connection = Connection::new(from, to);
        let report = Self::connect(&mut graph, connection.clone())?;
        Ok((connection, report))
    }

    pub fn remove_connection(
        graph: &SharedGraph,
        connection_id: Uuid,
    ) -> Result<(Connection, PropagationReport), LibraryError> {
        let mut graph = write_graph(graph)?;
        Self::disconnect(&mut graph, connection_id)
    }

    /// Validate and insert a connection, then run a schema pass from its
    /// target. Nothing is inserted when validation fails.
    pub fn connect(graph: &mut Graph, connection: Connection) -> Result<PropagationReport, LibraryError> {
        validate_connection(graph, &connection)?;
        debug!(
            "Connecting {}.{} -> {}.{}",
            connection.from.node_id, connection.from.key, connection.to.node_id, connection.to.key
        );
        graph.insert_connection(connection.clone());
        if graph.is_exec_connection(&connection) {
            return Ok(PropagationReport::default());
        }
        SchemaPropagator::new(graph).connected(&connection)
    }

    /// Remove a connection, then run a schema pass from its former target.
    pub fn disconnect(
        graph: &mut Graph,
        connection_id: Uuid,
    ) -> Result<(Connection, PropagationReport), LibraryError> {
        let source = graph
            .get_connection(connection_id)
            .and_then(|c| graph.socket_snapshot(&c.from, PortDirection::Output));
        let connection = graph
            .remove_connection(connection_id)
            .ok_or(LibraryError::ConnectionNotFound(connection_id))?;

        let report = match source {
            Some(source) if !source.is_exec() => {
                SchemaPropagator::new(graph).disconnected(&connection, source)?
            }
            _ => PropagationReport::default(),
        };
        Ok((connection, report))
    }
}
