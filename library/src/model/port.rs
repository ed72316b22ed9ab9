//! Named attachment points on a node.

use super::control::Control;
use super::schema::StructuralType;
use super::socket::{SocketKind, TypedSocket};
use crate::error::LibraryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Debug)]
pub struct Port {
    pub key: String,
    pub label: String,
    pub direction: PortDirection,
    pub socket: TypedSocket,
    /// Inline widget used as the value of an unconnected input.
    pub control: Option<Control>,
    pub required: bool,
    pub tooltip: Option<String>,
}

impl Port {
    pub fn new(key: &str, label: &str, direction: PortDirection, kind: SocketKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            direction,
            socket: TypedSocket::new(key, kind),
            control: None,
            required: false,
            tooltip: None,
        }
    }

    pub fn input(key: &str, label: &str, schema: StructuralType) -> Self {
        Self::new(key, label, PortDirection::Input, SocketKind::Data(schema))
    }

    pub fn output(key: &str, label: &str, schema: StructuralType) -> Self {
        Self::new(key, label, PortDirection::Output, SocketKind::Data(schema))
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.control = Some(control);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_tooltip(mut self, tooltip: &str) -> Self {
        self.tooltip = Some(tooltip.to_string());
        self
    }

    pub fn is_exec(&self) -> bool {
        self.socket.is_exec()
    }
}

/// Ordered, key-unique collection of ports owned by one node.
#[derive(Debug, Default)]
pub struct PortMap {
    ports: Vec<Port>,
}

impl PortMap {
    pub fn new() -> Self {
        Self { ports: Vec::new() }
    }

    pub fn get(&self, key: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, port: Port) -> Result<(), LibraryError> {
        if self.contains(&port.key) {
            return Err(LibraryError::invalid(format!(
                "Duplicate port key '{}'",
                port.key
            )));
        }
        self.ports.push(port);
        Ok(())
    }

    /// Remove a port. Connections bound to it must be detached by the caller.
    pub fn remove(&mut self, key: &str) -> Option<Port> {
        let index = self.ports.iter().position(|p| p.key == key)?;
        Some(self.ports.remove(index))
    }

    pub fn keys(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.key.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Port> {
        self.ports.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_map_rejects_duplicates_and_keeps_order() {
        let mut ports = PortMap::new();
        ports.insert(Port::output("b", "B", StructuralType::Any)).unwrap();
        ports.insert(Port::output("a", "A", StructuralType::Any)).unwrap();
        assert!(ports.insert(Port::output("a", "A2", StructuralType::Any)).is_err());
        assert_eq!(ports.keys(), vec!["b".to_string(), "a".to_string()]);

        assert!(ports.remove("b").is_some());
        assert!(ports.remove("b").is_none());
        assert_eq!(ports.len(), 1);
    }
}
