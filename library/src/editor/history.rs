//! Undo-recordable mutation notifications.
//!
//! The editor does not keep an undo stack itself. A host that wants one
//! installs a [`HistoryHook`] and receives a [`GraphMutation`] after every
//! mutation that succeeded.

use std::sync::Mutex;

use uuid::Uuid;

use crate::model::connection::Connection;
use crate::model::group::Group;
use crate::model::node::Position;
use crate::model::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum GraphMutation {
    NodeAdded {
        id: Uuid,
        type_id: String,
    },
    NodeRemoved {
        id: Uuid,
        type_id: String,
        /// Connections removed together with the node.
        connections: Vec<Connection>,
    },
    NodeMoved {
        id: Uuid,
        from: Position,
        to: Position,
    },
    Connected(Connection),
    Disconnected(Connection),
    ControlChanged {
        node: Uuid,
        key: String,
        previous: Value,
        value: Value,
    },
    GroupAdded(Group),
    GroupRemoved(Group),
    Loaded {
        nodes: Vec<Uuid>,
    },
    Pasted {
        nodes: Vec<Uuid>,
    },
}

pub trait HistoryHook: Send + Sync {
    fn record(&self, mutation: &GraphMutation);
}

/// Hook that appends every mutation to an in-memory list.
#[derive(Default)]
pub struct MutationLog {
    entries: Mutex<Vec<GraphMutation>>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<GraphMutation> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl HistoryHook for MutationLog {
    fn record(&self, mutation: &GraphMutation) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(mutation.clone());
        }
    }
}
