//! Node type definitions for the node graph.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::traits::Node;
use crate::channel::OperationTransport;
use crate::config::EngineConfig;
use crate::error::LibraryError;
use crate::model::control::Control;
use crate::model::graph::NodeEntry;
use crate::model::node::{NodeCore, StatusHandle};
use crate::model::port::{Port, PortDirection};
use crate::model::schema::StructuralType;
use crate::model::socket::SocketKind;

/// Category of a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Constant sources (string, number, boolean)
    Value,
    /// Type conversion (string_to_number)
    Convert,
    /// Branching and comparison (if, compare)
    Logic,
    /// Control-flow sequencing (start, sequence, counter_loop)
    Flow,
    /// Generic collection builders (array_build, object_pick)
    Collection,
    /// JSON handling (parse)
    Json,
    /// Inspection helpers (log)
    Debug,
    /// Long-running external operations (stream)
    Remote,
    /// Plugin-defined custom category
    Custom,
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeCategory::Value => "Value",
            NodeCategory::Convert => "Convert",
            NodeCategory::Logic => "Logic",
            NodeCategory::Flow => "Flow",
            NodeCategory::Collection => "Collection",
            NodeCategory::Json => "JSON",
            NodeCategory::Debug => "Debug",
            NodeCategory::Remote => "Remote",
            NodeCategory::Custom => "Custom",
        };
        write!(f, "{}", s)
    }
}

/// Port template of a node type.
#[derive(Debug, Clone)]
pub struct PortDefinition {
    pub key: String,
    pub label: String,
    pub direction: PortDirection,
    pub kind: SocketKind,
    pub required: bool,
    pub tooltip: Option<String>,
    pub control: Option<Control>,
}

impl PortDefinition {
    pub fn new(key: &str, label: &str, direction: PortDirection, kind: SocketKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            direction,
            kind,
            required: false,
            tooltip: None,
            control: None,
        }
    }

    pub fn input(key: &str, label: &str, schema: StructuralType) -> Self {
        Self::new(key, label, PortDirection::Input, SocketKind::Data(schema))
    }

    pub fn output(key: &str, label: &str, schema: StructuralType) -> Self {
        Self::new(key, label, PortDirection::Output, SocketKind::Data(schema))
    }

    pub fn exec_input(key: &str, label: &str) -> Self {
        Self::new(key, label, PortDirection::Input, SocketKind::Exec)
    }

    pub fn exec_output(key: &str, label: &str) -> Self {
        Self::new(key, label, PortDirection::Output, SocketKind::Exec)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_tooltip(mut self, tooltip: &str) -> Self {
        self.tooltip = Some(tooltip.to_string());
        self
    }

    /// Inline control used when the input is unconnected. Its key is the port key.
    pub fn with_control(mut self, control: Control) -> Self {
        self.control = Some(control);
        self
    }

    pub fn instantiate(&self) -> Port {
        let mut port = Port::new(&self.key, &self.label, self.direction, self.kind.clone());
        port.required = self.required;
        port.tooltip = self.tooltip.clone();
        port.control = self.control.clone();
        port
    }
}

/// Services handed to node constructors.
#[derive(Clone, Default)]
pub struct NodeDeps {
    pub transport: Option<Arc<dyn OperationTransport>>,
    pub config: EngineConfig,
}

impl NodeDeps {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            transport: None,
            config,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn OperationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

impl fmt::Debug for NodeDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDeps")
            .field("transport", &self.transport.is_some())
            .field("config", &self.config)
            .finish()
    }
}

pub type NodeConstructor = Arc<dyn Fn(&NodeDeps) -> Arc<dyn Node> + Send + Sync>;

/// Definition of a node type, registered in the [`super::NodeRegistry`].
///
/// Describes what a node of this type looks like (ports, controls, metadata)
/// and how to build its behaviour.
#[derive(Clone)]
pub struct NodeTypeDefinition {
    /// Unique type identifier (e.g. "logic.if", "value.string")
    pub type_id: String,
    /// Human-readable name (e.g. "If")
    pub display_name: String,
    pub category: NodeCategory,
    /// Description shown in tooltips
    pub description: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
    /// Node-level controls (not bound to a port)
    pub controls: Vec<Control>,
    constructor: NodeConstructor,
}

impl NodeTypeDefinition {
    pub fn new<N, F>(type_id: &str, display_name: &str, category: NodeCategory, constructor: F) -> Self
    where
        N: Node + 'static,
        F: Fn(&NodeDeps) -> N + Send + Sync + 'static,
    {
        Self {
            type_id: type_id.to_string(),
            display_name: display_name.to_string(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            controls: Vec::new(),
            constructor: Arc::new(move |deps| Arc::new(constructor(deps)) as Arc<dyn Node>),
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<PortDefinition>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<PortDefinition>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = controls;
        self
    }

    /// Build a fresh node instance with the given id.
    pub fn instantiate(&self, id: Uuid, deps: &NodeDeps) -> Result<NodeEntry, LibraryError> {
        let mut core = NodeCore::new(id, &self.type_id, &self.display_name);
        for def in &self.inputs {
            core.inputs.insert(def.instantiate())?;
        }
        for def in &self.outputs {
            core.outputs.insert(def.instantiate())?;
        }
        for control in &self.controls {
            core.add_control(control.clone());
        }

        let behavior = (self.constructor)(deps);
        behavior.setup_schema(&mut core)?;

        Ok(NodeEntry {
            core,
            behavior,
            status: StatusHandle::new(id),
        })
    }
}

impl fmt::Debug for NodeTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeDefinition")
            .field("type_id", &self.type_id)
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish()
    }
}
