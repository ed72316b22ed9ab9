//! Per-node state owned by the graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::control::Control;
use super::port::{Port, PortDirection, PortMap};
use super::schema::StructuralType;
use super::value::Value;
use crate::error::LibraryError;

/// Canvas position in graph space.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Structural part of a node: identity, ports and controls.
///
/// Behaviour lives in the node's [`crate::plugin::Node`] implementation;
/// the core is what schema hooks and serialization operate on.
#[derive(Debug)]
pub struct NodeCore {
    pub id: Uuid,
    pub type_id: String,
    pub label: String,
    pub position: Position,
    pub inputs: PortMap,
    pub outputs: PortMap,
    pub controls: BTreeMap<String, Control>,
}

impl NodeCore {
    pub fn new(id: Uuid, type_id: &str, label: &str) -> Self {
        Self {
            id,
            type_id: type_id.to_string(),
            label: label.to_string(),
            position: Position::default(),
            inputs: PortMap::new(),
            outputs: PortMap::new(),
            controls: BTreeMap::new(),
        }
    }

    pub fn ports(&self, direction: PortDirection) -> &PortMap {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    pub fn port(&self, direction: PortDirection, key: &str) -> Option<&Port> {
        self.ports(direction).get(key)
    }

    pub fn add_control(&mut self, control: Control) {
        self.controls.insert(control.key.clone(), control);
    }

    /// Control value by key. Node-level controls shadow inline port controls.
    pub fn control_value(&self, key: &str) -> Option<&Value> {
        if let Some(control) = self.controls.get(key) {
            return Some(control.value());
        }
        self.inputs
            .get(key)
            .and_then(|p| p.control.as_ref())
            .map(|c| c.value())
    }

    pub fn set_control_value(&mut self, key: &str, value: Value) -> Result<(), LibraryError> {
        if let Some(control) = self.controls.get_mut(key) {
            return control.set_value(value);
        }
        match self.inputs.get_mut(key).and_then(|p| p.control.as_mut()) {
            Some(control) => control.set_value(value),
            None => Err(LibraryError::invalid(format!(
                "Node {} ({}) has no control '{}'",
                self.id, self.type_id, key
            ))),
        }
    }

    /// Every control value, inline port controls included.
    pub fn control_values(&self) -> BTreeMap<String, Value> {
        let mut values: BTreeMap<String, Value> = self
            .inputs
            .iter()
            .filter_map(|p| p.control.as_ref().map(|c| (p.key.clone(), c.value().clone())))
            .collect();
        for (key, control) in &self.controls {
            values.insert(key.clone(), control.value().clone());
        }
        values
    }

    pub fn input_schema(&self, key: &str) -> Option<StructuralType> {
        self.inputs.get(key).and_then(|p| p.socket.schema())
    }

    pub fn output_schema(&self, key: &str) -> Option<StructuralType> {
        self.outputs.get(key).and_then(|p| p.socket.schema())
    }

    /// Retype an existing data input. Returns whether the schema changed.
    pub fn set_input_schema(&mut self, key: &str, schema: StructuralType) -> Result<bool, LibraryError> {
        let port = self
            .inputs
            .get(key)
            .ok_or_else(|| LibraryError::port_not_found(self.id, key))?;
        port.socket.set_schema(key, schema)
    }

    /// Retype an existing data output. Returns whether the schema changed.
    pub fn set_output_schema(&mut self, key: &str, schema: StructuralType) -> Result<bool, LibraryError> {
        let port = self
            .outputs
            .get(key)
            .ok_or_else(|| LibraryError::port_not_found(self.id, key))?;
        port.socket.set_schema(key, schema)
    }
}

/// Execution state of a node.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Warning(String),
    Error(String),
}

impl NodeStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, NodeStatus::Running)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, NodeStatus::Error(_))
    }
}

/// Shared, observable status cell for one node.
///
/// Kept outside the node behaviour so the status can be read while the node
/// is busy executing.
#[derive(Clone)]
pub struct StatusHandle {
    node_id: Uuid,
    sender: Arc<watch::Sender<NodeStatus>>,
}

impl StatusHandle {
    pub fn new(node_id: Uuid) -> Self {
        let (sender, _) = watch::channel(NodeStatus::Idle);
        Self {
            node_id,
            sender: Arc::new(sender),
        }
    }

    pub fn get(&self) -> NodeStatus {
        self.sender.borrow().clone()
    }

    pub fn change(&self, status: NodeStatus) {
        let previous = self.sender.send_replace(status.clone());
        if previous != status {
            debug!("Node {} status {:?} -> {:?}", self.node_id, previous, status);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NodeStatus> {
        self.sender.subscribe()
    }
}

impl std::fmt::Debug for StatusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusHandle")
            .field("node_id", &self.node_id)
            .field("status", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_values_include_inline_port_controls() {
        let mut core = NodeCore::new(Uuid::new_v4(), "test.node", "Test");
        core.inputs
            .insert(
                Port::input("value", "Value", StructuralType::string())
                    .with_control(Control::text("value", "Value", "inline")),
            )
            .unwrap();
        core.add_control(Control::number("count", "Count", 2.0));

        let values = core.control_values();
        assert_eq!(values.get("value"), Some(&Value::from("inline")));
        assert_eq!(values.get("count"), Some(&Value::from(2.0)));

        core.set_control_value("value", Value::from("edited")).unwrap();
        assert_eq!(core.control_value("value"), Some(&Value::from("edited")));
        assert!(core.set_control_value("missing", Value::Null).is_err());
    }

    #[test]
    fn test_status_handle_is_observable() {
        let status = StatusHandle::new(Uuid::new_v4());
        let mut rx = status.subscribe();
        status.change(NodeStatus::Running);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), NodeStatus::Running);
        assert!(status.get().is_running());
    }
}
