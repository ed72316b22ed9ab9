//! Graph analysis utilities: connection validation, cycle detection and ordering.
//!
//! Data edges must form a DAG. Exec edges may loop back (counter loops rely on
//! this), so every traversal here ignores exec connections.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use super::connection::Connection;
use super::graph::Graph;
use super::port::PortDirection;
use crate::error::LibraryError;

/// Validate a connection before adding it.
///
/// Checks:
/// - Both nodes exist, no self-connections
/// - Source is an output port, destination is an input port
/// - The sockets are compatible (exec with exec, data by schema)
/// - No identical connection already exists
/// - Data connections do not create a cycle
pub fn validate_connection(graph: &Graph, conn: &Connection) -> Result<(), LibraryError> {
    let source = graph
        .get_node(conn.from.node_id)
        .ok_or(LibraryError::NodeNotFound(conn.from.node_id))?;
    let target = graph
        .get_node(conn.to.node_id)
        .ok_or(LibraryError::NodeNotFound(conn.to.node_id))?;

    if conn.from.node_id == conn.to.node_id {
        return Err(LibraryError::rejected("Cannot connect a node to itself"));
    }

    let source_port = source
        .core
        .port(PortDirection::Output, &conn.from.key)
        .ok_or_else(|| LibraryError::port_not_found(conn.from.node_id, &conn.from.key))?;
    let target_port = target
        .core
        .port(PortDirection::Input, &conn.to.key)
        .ok_or_else(|| LibraryError::port_not_found(conn.to.node_id, &conn.to.key))?;

    let source_socket = source_port.socket.snapshot();
    let target_socket = target_port.socket.snapshot();
    if !source_socket.is_compatible_with(&target_socket) {
        return Err(LibraryError::rejected(format!(
            "{}.{} ({}) is not compatible with {}.{} ({})",
            source.core.type_id,
            conn.from.key,
            describe(&source_socket.kind),
            target.core.type_id,
            conn.to.key,
            describe(&target_socket.kind),
        )));
    }

    if graph
        .connections()
        .iter()
        .any(|c| c.from == conn.from && c.to == conn.to)
    {
        return Err(LibraryError::rejected(format!(
            "{}.{} is already connected to {}.{}",
            conn.from.node_id, conn.from.key, conn.to.node_id, conn.to.key
        )));
    }

    if !source_socket.is_exec() && would_create_cycle(graph, conn.from.node_id, conn.to.node_id) {
        return Err(LibraryError::rejected("Connection would create a cycle"));
    }

    Ok(())
}

fn describe(kind: &super::socket::SocketKind) -> String {
    match kind {
        super::socket::SocketKind::Exec => "exec".to_string(),
        super::socket::SocketKind::Data(schema) => schema.to_string(),
    }
}

/// Check if a data connection from_node → to_node would create a cycle.
/// Returns true if to_node can already reach from_node via data connections.
fn would_create_cycle(graph: &Graph, from_node: Uuid, to_node: Uuid) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(to_node);

    while let Some(current) = queue.pop_front() {
        if current == from_node {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        for conn in data_connections(graph) {
            if conn.from.node_id == current {
                queue.push_back(conn.to.node_id);
            }
        }
    }
    false
}

fn data_connections(graph: &Graph) -> impl Iterator<Item = &Connection> {
    graph
        .connections()
        .iter()
        .filter(|c| !graph.is_exec_connection(c))
}

/// Every node that (transitively) consumes a data output of `node_id`,
/// in breadth-first order. `node_id` itself is not included.
pub fn data_dependents(graph: &Graph, node_id: Uuid) -> Vec<Uuid> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();
    visited.insert(node_id);
    queue.push_back(node_id);

    while let Some(current) = queue.pop_front() {
        for conn in data_connections(graph) {
            if conn.from.node_id == current && visited.insert(conn.to.node_id) {
                order.push(conn.to.node_id);
                queue.push_back(conn.to.node_id);
            }
        }
    }
    order
}

/// Topological sort of all nodes over data connections.
///
/// Returns nodes in dependency order (sources first, sinks last), keeping
/// insertion order among independent nodes. Returns Err if there's a cycle.
pub fn topological_sort(graph: &Graph) -> Result<Vec<Uuid>, LibraryError> {
    let ids = graph.node_ids();
    let mut in_degree: HashMap<Uuid, usize> = ids.iter().map(|id| (*id, 0)).collect();
    let mut adj: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

    for conn in data_connections(graph) {
        adj.entry(conn.from.node_id).or_default().push(conn.to.node_id);
        if let Some(deg) = in_degree.get_mut(&conn.to.node_id) {
            *deg += 1;
        }
    }

    // Kahn's algorithm
    let mut queue: VecDeque<Uuid> = ids
        .iter()
        .filter(|id| in_degree.get(id) == Some(&0))
        .copied()
        .collect();
    let mut sorted = Vec::with_capacity(ids.len());

    while let Some(node) = queue.pop_front() {
        sorted.push(node);
        if let Some(neighbors) = adj.get(&node) {
            for neighbor in neighbors {
                if let Some(deg) = in_degree.get_mut(neighbor) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(*neighbor);
                    }
                }
            }
        }
    }

    if sorted.len() != ids.len() {
        return Err(LibraryError::evaluation("Cycle detected in data graph"));
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connection::PortRef;
    use crate::plugin::{NodeDeps, NodeRegistry};

    fn add(graph: &mut Graph, registry: &NodeRegistry, type_id: &str) -> Uuid {
        let entry = registry
            .create(type_id, None, &NodeDeps::default())
            .unwrap();
        graph.add_node(entry).unwrap()
    }

    fn link(graph: &mut Graph, from: Uuid, out: &str, to: Uuid, inp: &str) -> Result<(), LibraryError> {
        let conn = Connection::new(PortRef::new(from, out), PortRef::new(to, inp));
        validate_connection(graph, &conn)?;
        graph.insert_connection(conn);
        Ok(())
    }

    #[test]
    fn test_validate_connection_self_loop() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut graph = Graph::new();
        let relay = add(&mut graph, &registry, "util.relay");

        let err = link(&mut graph, relay, "value", relay, "value").unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn test_validate_connection_incompatible_types() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut graph = Graph::new();
        let number = add(&mut graph, &registry, "value.number");
        let convert = add(&mut graph, &registry, "convert.string_to_number");

        let err = link(&mut graph, number, "value", convert, "value").unwrap_err();
        assert!(matches!(err, LibraryError::ConnectionRejected(_)));
        assert!(graph.connections().is_empty());
    }

    #[test]
    fn test_validate_connection_missing_port() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut graph = Graph::new();
        let text = add(&mut graph, &registry, "value.string");
        let convert = add(&mut graph, &registry, "convert.string_to_number");

        let err = link(&mut graph, text, "nope", convert, "value").unwrap_err();
        assert!(matches!(err, LibraryError::PortNotFound { .. }));
    }

    #[test]
    fn test_cycle_detection() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut graph = Graph::new();
        let a = add(&mut graph, &registry, "util.relay");
        let b = add(&mut graph, &registry, "util.relay");

        link(&mut graph, a, "value", b, "value").unwrap();
        let err = link(&mut graph, b, "value", a, "value").unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_exec_connections_may_loop() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut graph = Graph::new();
        let lp = add(&mut graph, &registry, "flow.counter_loop");
        let log = add(&mut graph, &registry, "debug.log");

        link(&mut graph, lp, "loop", log, "exec").unwrap();
        link(&mut graph, log, "exec", lp, "next").unwrap();
        assert_eq!(graph.connections().len(), 2);
    }

    #[test]
    fn test_topological_sort_and_dependents() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut graph = Graph::new();
        let c = add(&mut graph, &registry, "util.relay");
        let a = add(&mut graph, &registry, "value.string");
        let b = add(&mut graph, &registry, "util.relay");

        link(&mut graph, a, "value", b, "value").unwrap();
        link(&mut graph, b, "value", c, "value").unwrap();

        let sorted = topological_sort(&graph).unwrap();
        let pos = |id: Uuid| sorted.iter().position(|n| *n == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));

        assert_eq!(data_dependents(&graph, a), vec![b, c]);
        assert!(data_dependents(&graph, c).is_empty());
    }
}
