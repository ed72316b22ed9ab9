//! Built-in node types.

mod collections;
mod convert;
mod debug;
mod flow;
mod json;
mod logic;
mod remote;
mod util;
mod values;

pub use collections::{ArrayBuildNode, ObjectPickNode};
pub use convert::StringToNumberNode;
pub use debug::LogNode;
pub use flow::{CounterLoopNode, SequenceNode, StartNode};
pub use json::JsonParseNode;
pub use logic::{CompareNode, IfNode};
pub use remote::RemoteStreamNode;
pub use util::RelayNode;
pub use values::ConstantNode;

use crate::model::schema::StructuralType;
use crate::plugin::node_types::{NodeCategory, NodeDeps, NodeTypeDefinition, PortDefinition};
use crate::plugin::registry::NodeRegistry;
use crate::plugin::traits::Node;

/// Register all built-in node type definitions.
pub(crate) fn register_all_node_types(registry: &NodeRegistry) {
    for def in all_node_definitions() {
        registry.register_node_type(def);
    }
}

fn all_node_definitions() -> Vec<NodeTypeDefinition> {
    let mut defs = Vec::new();
    defs.extend(values::value_nodes());
    defs.extend(convert::convert_nodes());
    defs.extend(logic::logic_nodes());
    defs.extend(flow::flow_nodes());
    defs.extend(collections::collection_nodes());
    defs.extend(util::util_nodes());
    defs.extend(json::json_nodes());
    defs.extend(debug::debug_nodes());
    defs.extend(remote::remote_nodes());
    defs
}

// ---------------------------------------------------------------------------
// Port helpers
// ---------------------------------------------------------------------------

fn inp(key: &str, label: &str, schema: StructuralType) -> PortDefinition {
    PortDefinition::input(key, label, schema)
}

fn out(key: &str, label: &str, schema: StructuralType) -> PortDefinition {
    PortDefinition::output(key, label, schema)
}

fn exec_in(key: &str, label: &str) -> PortDefinition {
    PortDefinition::exec_input(key, label)
}

fn exec_out(key: &str, label: &str) -> PortDefinition {
    PortDefinition::exec_output(key, label)
}

fn node<N, F>(type_id: &str, name: &str, cat: NodeCategory, ctor: F) -> NodeTypeDefinition
where
    N: Node + 'static,
    F: Fn(&NodeDeps) -> N + Send + Sync + 'static,
{
    NodeTypeDefinition::new(type_id, name, cat, ctor)
}
