pub mod graph_handler;
pub mod group_handler;

pub use graph_handler::GraphHandler;
pub use group_handler::GroupHandler;
