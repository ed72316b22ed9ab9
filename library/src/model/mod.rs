pub mod connection;
pub mod control;
pub mod graph;
pub mod graph_analysis;
pub mod group;
pub mod node;
pub mod port;
pub mod propagation;
pub mod schema;
pub mod socket;
pub mod value;

pub use connection::{Connection, PortRef};
pub use control::{Control, ControlKind};
pub use graph::{Graph, NodeEntry, SharedGraph, read_graph, write_graph};
pub use group::{Group, Rect};
pub use node::{NodeCore, NodeStatus, Position, StatusHandle};
pub use port::{Port, PortDirection, PortMap};
pub use propagation::{PropagationReport, SchemaPropagator};
pub use schema::{PrimitiveType, StructuralType};
pub use socket::{SocketKind, SocketSnapshot, TypedSocket};
pub use value::Value;
