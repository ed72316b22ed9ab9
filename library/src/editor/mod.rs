//! Editor facade: the public API hosts use to build, run and persist a graph.

mod editor_graph_ops;
mod editor_io_ops;
pub mod editor_service;
pub mod handlers;
pub mod history;

pub use editor_service::Editor;
pub use history::{GraphMutation, HistoryHook, MutationLog};
