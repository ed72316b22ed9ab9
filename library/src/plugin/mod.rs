pub mod node_definitions;
pub mod node_types;
pub mod registry;
pub mod traits;

pub use node_types::{NodeCategory, NodeConstructor, NodeDeps, NodeTypeDefinition, PortDefinition};
pub use registry::NodeRegistry;
pub use traits::{ConnectionChange, Node, Retrigger};
