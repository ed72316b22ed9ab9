//! Node type registry: the factory keyed by type name.

use std::collections::HashMap;
use std::sync::RwLock;

use log::{debug, warn};
use uuid::Uuid;

use super::node_definitions::register_all_node_types;
use super::node_types::{NodeDeps, NodeTypeDefinition};
use crate::error::LibraryError;
use crate::model::graph::NodeEntry;

#[derive(Default)]
pub struct NodeRegistry {
    node_types: RwLock<HashMap<String, NodeTypeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in node type.
    pub fn with_builtin_nodes() -> Self {
        let registry = Self::new();
        register_all_node_types(&registry);
        registry
    }

    /// Register a node type. A later registration replaces an earlier one
    /// with the same type id.
    pub fn register_node_type(&self, def: NodeTypeDefinition) {
        match self.node_types.write() {
            Ok(mut types) => {
                debug!("Registering node type {}", def.type_id);
                if let Some(previous) = types.insert(def.type_id.clone(), def) {
                    warn!("Node type {} was registered twice", previous.type_id);
                }
            }
            Err(_) => warn!("Node registry lock poisoned, dropping {}", def.type_id),
        }
    }

    pub fn get_node_type(&self, type_id: &str) -> Option<NodeTypeDefinition> {
        self.node_types.read().ok()?.get(type_id).cloned()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.get_node_type(type_id).is_some()
    }

    /// All registered types, sorted by type id.
    pub fn available_node_types(&self) -> Vec<NodeTypeDefinition> {
        let Ok(types) = self.node_types.read() else {
            return Vec::new();
        };
        let mut defs: Vec<_> = types.values().cloned().collect();
        defs.sort_by(|a, b| a.type_id.cmp(&b.type_id));
        defs
    }

    /// Construct a node of the given type. A fresh id is generated when `id` is `None`.
    pub fn create(
        &self,
        type_id: &str,
        id: Option<Uuid>,
        deps: &NodeDeps,
    ) -> Result<NodeEntry, LibraryError> {
        let def = self
            .get_node_type(type_id)
            .ok_or_else(|| LibraryError::UnknownNodeType(type_id.to_string()))?;
        def.instantiate(id.unwrap_or_else(Uuid::new_v4), deps)
    }
}
