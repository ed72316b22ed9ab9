//! The live node graph: nodes, connections and groups.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::connection::{Connection, PortRef};
use super::group::Group;
use super::node::{NodeCore, StatusHandle};
use super::port::PortDirection;
use super::socket::SocketSnapshot;
use crate::error::LibraryError;
use crate::plugin::Node;

/// A node instance: structural core, behaviour and status.
pub struct NodeEntry {
    pub core: NodeCore,
    pub behavior: Arc<dyn Node>,
    pub status: StatusHandle,
}

impl NodeEntry {
    pub fn id(&self) -> Uuid {
        self.core.id
    }
}

impl std::fmt::Debug for NodeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEntry")
            .field("core", &self.core)
            .field("status", &self.status)
            .finish()
    }
}

#[derive(Default)]
pub struct Graph {
    nodes: HashMap<Uuid, NodeEntry>,
    /// Insertion order, used for deterministic iteration and serialization.
    order: Vec<Uuid>,
    connections: Vec<Connection>,
    groups: Vec<Group>,
}

pub type SharedGraph = Arc<RwLock<Graph>>;

/// Acquire a read lock on the graph, converting poison errors to LibraryError.
pub fn read_graph(graph: &SharedGraph) -> Result<RwLockReadGuard<'_, Graph>, LibraryError> {
    graph
        .read()
        .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))
}

/// Acquire a write lock on the graph, converting poison errors to LibraryError.
pub fn write_graph(graph: &SharedGraph) -> Result<RwLockWriteGuard<'_, Graph>, LibraryError> {
    graph
        .write()
        .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    pub fn add_node(&mut self, entry: NodeEntry) -> Result<Uuid, LibraryError> {
        let id = entry.id();
        if self.nodes.contains_key(&id) {
            return Err(LibraryError::invalid(format!("Node {} already exists", id)));
        }
        self.nodes.insert(id, entry);
        self.order.push(id);
        Ok(id)
    }

    /// Remove a node. Its connections must already have been removed.
    pub fn remove_node(&mut self, id: Uuid) -> Option<NodeEntry> {
        let entry = self.nodes.remove(&id)?;
        self.order.retain(|n| *n != id);
        Some(entry)
    }

    pub fn get_node(&self, id: Uuid) -> Option<&NodeEntry> {
        self.nodes.get(&id)
    }

    pub fn get_node_mut(&mut self, id: Uuid) -> Option<&mut NodeEntry> {
        self.nodes.get_mut(&id)
    }

    pub fn contains_node(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_ids(&self) -> &[Uuid] {
        &self.order
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeEntry> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.connections.clear();
        self.groups.clear();
    }

    /// Snapshot of the socket behind a port, if both node and port exist.
    pub fn socket_snapshot(&self, port: &PortRef, direction: PortDirection) -> Option<SocketSnapshot> {
        self.get_node(port.node_id)
            .and_then(|entry| entry.core.port(direction, &port.key))
            .map(|p| p.socket.snapshot())
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn get_connection(&self, id: Uuid) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Insert without validation. Use `graph_analysis::validate_connection` first.
    pub(crate) fn insert_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    pub fn remove_connection(&mut self, id: Uuid) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        Some(self.connections.remove(index))
    }

    /// Connections feeding an input port, in creation order.
    pub fn incoming(&self, node_id: Uuid, key: &str) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.to.node_id == node_id && c.to.key == key)
    }

    /// Connections leaving an output port, in creation order.
    pub fn outgoing(&self, node_id: Uuid, key: &str) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.from.node_id == node_id && c.from.key == key)
    }

    pub fn connections_for_node(&self, node_id: Uuid) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.involves(node_id))
            .cloned()
            .collect()
    }

    /// Connections of `node_id` that reference a port the node no longer has.
    pub fn dangling_connections(&self, node_id: Uuid) -> Vec<Connection> {
        let Some(entry) = self.get_node(node_id) else {
            return self.connections_for_node(node_id);
        };
        self.connections
            .iter()
            .filter(|c| {
                (c.from.node_id == node_id && !entry.core.outputs.contains(&c.from.key))
                    || (c.to.node_id == node_id && !entry.core.inputs.contains(&c.to.key))
            })
            .cloned()
            .collect()
    }

    /// Whether the connection carries control flow rather than data.
    pub fn is_exec_connection(&self, connection: &Connection) -> bool {
        self.socket_snapshot(&connection.from, PortDirection::Output)
            .is_some_and(|s| s.is_exec())
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn get_group(&self, id: Uuid) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn get_group_mut(&mut self, id: Uuid) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    pub fn add_group(&mut self, group: Group) -> Result<Uuid, LibraryError> {
        if self.get_group(group.id).is_some() {
            return Err(LibraryError::invalid(format!(
                "Group {} already exists",
                group.id
            )));
        }
        let id = group.id;
        self.groups.push(group);
        Ok(id)
    }

    pub fn remove_group(&mut self, id: Uuid) -> Option<Group> {
        let index = self.groups.iter().position(|g| g.id == id)?;
        Some(self.groups.remove(index))
    }
}
