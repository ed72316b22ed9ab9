pub mod channel;
mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod model;
pub mod plugin;
pub mod util;

pub use cli::run;
pub use config::EngineConfig;
pub use editor::{Editor, GraphMutation, HistoryHook, MutationLog};
pub use error::LibraryError;
pub use evaluation::{ExecReport, Forward, InputValues, OutputValues};
pub use io::{GraphDocument, LoadReport};
pub use model::{Connection, NodeStatus, PortRef, Position, StructuralType, Value};
pub use plugin::{Node, NodeDeps, NodeRegistry, NodeTypeDefinition};
