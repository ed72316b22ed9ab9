//! Dataflow and control-flow evaluation.

pub mod context;
pub mod control_flow;
pub mod dataflow;

pub use context::{DataContext, ExecContext, Forward, InputValues, OutputValues};
pub use control_flow::{ControlFlowEngine, ExecReport};
pub use dataflow::{DataflowEngine, SharedDataflow};
