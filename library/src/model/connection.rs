//! Connection model for the node graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a specific port on a specific node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node_id: Uuid,
    pub key: String,
}

impl PortRef {
    pub fn new(node_id: Uuid, key: &str) -> Self {
        Self {
            node_id,
            key: key.to_string(),
        }
    }
}

/// A directed edge from an output port to an input port.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: Uuid,
    /// Source port (output)
    pub from: PortRef,
    /// Destination port (input)
    pub to: PortRef,
}

impl Connection {
    pub fn new(from: PortRef, to: PortRef) -> Self {
        Self::with_id(Uuid::new_v4(), from, to)
    }

    pub fn with_id(id: Uuid, from: PortRef, to: PortRef) -> Self {
        Self { id, from, to }
    }

    pub fn involves(&self, node_id: Uuid) -> bool {
        self.from.node_id == node_id || self.to.node_id == node_id
    }
}
