//! Conversion between a live [`Graph`] and a [`GraphDocument`].

use std::collections::HashSet;

use log::{debug, info, warn};
use uuid::Uuid;

use super::DOCUMENT_VERSION;
use super::document::{ConnectionDocument, GraphDocument, NodeDocument};
use crate::editor::handlers::GraphHandler;
use crate::error::LibraryError;
use crate::model::connection::{Connection, PortRef};
use crate::model::graph::{Graph, NodeEntry};
use crate::plugin::{NodeDeps, NodeRegistry};

/// What a load actually restored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Ids of the nodes created, in document order.
    pub nodes: Vec<Uuid>,
    pub connections: Vec<Uuid>,
    /// Document node ids that were skipped, with the reason.
    pub skipped_nodes: Vec<(Uuid, String)>,
    pub skipped_connections: Vec<(Uuid, String)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_nodes.is_empty() && self.skipped_connections.is_empty()
    }
}

fn node_document(entry: &NodeEntry) -> NodeDocument {
    NodeDocument {
        id: entry.id(),
        type_id: entry.core.type_id.clone(),
        position: entry.core.position,
        control_data: entry.behavior.serialize_control_value(&entry.core),
    }
}

fn connection_document(conn: &Connection) -> ConnectionDocument {
    ConnectionDocument {
        id: conn.id,
        source: conn.from.node_id,
        source_output: conn.from.key.clone(),
        target: conn.to.node_id,
        target_input: conn.to.key.clone(),
    }
}

pub fn serialize_graph(graph: &Graph, version: &str) -> GraphDocument {
    let mut doc = GraphDocument::new(version);
    doc.nodes = graph.nodes().map(node_document).collect();
    doc.connections = graph.connections().iter().map(connection_document).collect();
    doc.groups = graph.groups().to_vec();
    doc
}

/// Document holding only `ids`, the connections between them, and the
/// groups whose members are all selected.
pub fn serialize_selection(graph: &Graph, ids: &[Uuid], version: &str) -> GraphDocument {
    let selected: HashSet<Uuid> = ids.iter().copied().filter(|id| graph.contains_node(*id)).collect();

    let mut doc = GraphDocument::new(version);
    doc.nodes = graph
        .nodes()
        .filter(|entry| selected.contains(&entry.id()))
        .map(node_document)
        .collect();
    doc.connections = graph
        .connections()
        .iter()
        .filter(|c| selected.contains(&c.from.node_id) && selected.contains(&c.to.node_id))
        .map(connection_document)
        .collect();
    doc.groups = graph
        .groups()
        .iter()
        .filter(|g| !g.links.is_empty() && g.links.iter().all(|id| selected.contains(id)))
        .cloned()
        .collect();
    doc
}

/// Add the document's content to `graph`.
///
/// Nodes are created through the registry, get their control data, then
/// rebuild their schema. Connections are replayed until no more can be
/// made, so that ports created by schema propagation exist before the
/// connections that need them. Unknown node types, missing endpoints and
/// rejected connections are skipped and listed in the report.
pub fn deserialize_into(
    graph: &mut Graph,
    registry: &NodeRegistry,
    deps: &NodeDeps,
    doc: &GraphDocument,
) -> Result<LoadReport, LibraryError> {
    if doc.version != DOCUMENT_VERSION {
        warn!(
            "Loading document version {} (expected {})",
            doc.version, DOCUMENT_VERSION
        );
    }
    let mut report = LoadReport::default();

    for node_doc in &doc.nodes {
        match restore_node(registry, deps, node_doc).and_then(|entry| graph.add_node(entry)) {
            Ok(id) => report.nodes.push(id),
            Err(e) if e.is_recoverable() || matches!(e, LibraryError::InvalidArgument(_)) => {
                warn!("Skipping node {} ({}): {}", node_doc.id, node_doc.type_id, e);
                report.skipped_nodes.push((node_doc.id, e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    let mut pending: Vec<&ConnectionDocument> = doc.connections.iter().collect();
    loop {
        let mut progressed = false;
        let mut retry = Vec::new();
        for conn_doc in pending {
            let connection = Connection::with_id(
                conn_doc.id,
                PortRef::new(conn_doc.source, &conn_doc.source_output),
                PortRef::new(conn_doc.target, &conn_doc.target_input),
            );
            match GraphHandler::connect(graph, connection) {
                Ok(_) => {
                    progressed = true;
                    report.connections.push(conn_doc.id);
                }
                Err(LibraryError::PortNotFound { .. }) => retry.push(conn_doc),
                Err(e) if e.is_recoverable() || matches!(e, LibraryError::InvalidArgument(_)) => {
                    warn!("Skipping connection {}: {}", conn_doc.id, e);
                    report.skipped_connections.push((conn_doc.id, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        if retry.is_empty() || !progressed {
            for conn_doc in retry {
                let reason = LibraryError::port_not_found(conn_doc.target, &conn_doc.target_input);
                warn!("Skipping connection {}: {}", conn_doc.id, reason);
                report.skipped_connections.push((conn_doc.id, reason.to_string()));
            }
            break;
        }
        debug!("Retrying {} connections", retry.len());
        pending = retry;
    }

    for group in &doc.groups {
        if let Err(e) = graph.add_group(group.clone()) {
            warn!("Skipping group {}: {}", group.id, e);
        }
    }

    info!(
        "Loaded {} nodes and {} connections ({} nodes, {} connections skipped)",
        report.nodes.len(),
        report.connections.len(),
        report.skipped_nodes.len(),
        report.skipped_connections.len()
    );
    Ok(report)
}

fn restore_node(
    registry: &NodeRegistry,
    deps: &NodeDeps,
    node_doc: &NodeDocument,
) -> Result<NodeEntry, LibraryError> {
    let mut entry = registry.create(&node_doc.type_id, Some(node_doc.id), deps)?;
    entry.core.position = node_doc.position;
    if let Err(e) = entry
        .behavior
        .deserialize_control_value(&mut entry.core, &node_doc.control_data)
    {
        warn!("Node {} keeps default controls: {}", node_doc.id, e);
    }
    entry.behavior.setup_schema(&mut entry.core)?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::group::{Group, Rect};
    use crate::model::node::Position;

    #[test]
    fn test_unknown_type_and_missing_port_are_skipped() {
        let registry = NodeRegistry::with_builtin_nodes();
        let deps = NodeDeps::default();
        let number = Uuid::new_v4();
        let relay = Uuid::new_v4();
        let ghost = Uuid::new_v4();

        let mut doc = GraphDocument::new(DOCUMENT_VERSION);
        for (id, type_id) in [(number, "value.number"), (relay, "util.relay"), (ghost, "nope.missing")] {
            doc.nodes.push(NodeDocument {
                id,
                type_id: type_id.to_string(),
                position: Position::default(),
                control_data: serde_json::json!({}),
            });
        }
        let good = Uuid::new_v4();
        let missing_port = Uuid::new_v4();
        let missing_node = Uuid::new_v4();
        for (id, source, target, input) in [
            (good, number, relay, "value"),
            (missing_port, number, relay, "nothing"),
            (missing_node, ghost, relay, "value"),
        ] {
            doc.connections.push(ConnectionDocument {
                id,
                source,
                source_output: "value".to_string(),
                target,
                target_input: input.to_string(),
            });
        }

        let mut graph = Graph::new();
        let report = deserialize_into(&mut graph, &registry, &deps, &doc).unwrap();

        assert_eq!(report.nodes, vec![number, relay]);
        assert_eq!(report.skipped_nodes.len(), 1);
        assert_eq!(report.skipped_nodes[0].0, ghost);
        assert_eq!(report.connections, vec![good]);
        let skipped: Vec<Uuid> = report.skipped_connections.iter().map(|(id, _)| *id).collect();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.contains(&missing_port));
        assert!(skipped.contains(&missing_node));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_selection_keeps_internal_connections_only() {
        let registry = NodeRegistry::with_builtin_nodes();
        let deps = NodeDeps::default();
        let mut graph = Graph::new();
        let a = graph.add_node(registry.create("value.number", None, &deps).unwrap()).unwrap();
        let b = graph.add_node(registry.create("util.relay", None, &deps).unwrap()).unwrap();
        let c = graph.add_node(registry.create("util.relay", None, &deps).unwrap()).unwrap();
        GraphHandler::connect(&mut graph, Connection::new(PortRef::new(a, "value"), PortRef::new(b, "value")))
            .unwrap();
        GraphHandler::connect(&mut graph, Connection::new(PortRef::new(b, "value"), PortRef::new(c, "value")))
            .unwrap();
        graph
            .add_group(Group::new("ab", Rect::default(), vec![a, b]))
            .unwrap();
        graph
            .add_group(Group::new("abc", Rect::default(), vec![a, b, c]))
            .unwrap();

        let doc = serialize_selection(&graph, &[a, b], DOCUMENT_VERSION);
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.connections.len(), 1);
        assert_eq!(doc.connections[0].target, b);
        assert_eq!(doc.groups.len(), 1);
        assert_eq!(doc.groups[0].text, "ab");
    }
}
