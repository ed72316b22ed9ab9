use std::sync::Mutex;

use async_trait::async_trait;
use log::info;

use super::{exec_in, exec_out, inp, node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, ExecContext, Forward, InputValues, OutputValues};
use crate::model::control::Control;
use crate::model::node::NodeStatus;
use crate::model::schema::StructuralType;
use crate::model::value::Value;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::Node;

/// Logs its `value` input each time it is executed and keeps the history.
#[derive(Default)]
pub struct LogNode {
    history: Mutex<Vec<Value>>,
}

impl LogNode {
    pub fn history(&self) -> Vec<Value> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Node for LogNode {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        _inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let history = self.history();
        Ok(OutputValues::new()
            .with("last", history.last().cloned().unwrap_or_default())
            .with("history", history))
    }

    async fn execute(
        &self,
        _input: Option<&str>,
        ctx: &ExecContext<'_>,
    ) -> Result<Forward, LibraryError> {
        ctx.set_status(NodeStatus::Running);
        let inputs = ctx.fetch_inputs(Some(&["value"])).await?;
        let value = inputs.first("value").cloned().unwrap_or_default();
        let label = ctx
            .control("label")
            .and_then(Value::as_str)
            .unwrap_or("log")
            .to_string();
        info!("[{}] {}", label, value);
        self.history
            .lock()
            .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))?
            .push(value);
        ctx.set_status(NodeStatus::Completed);
        Ok(Forward::output("exec"))
    }
}

pub(super) fn debug_nodes() -> Vec<NodeTypeDefinition> {
    vec![
        node("debug.log", "Log", NodeCategory::Debug, |_| LogNode::default())
            .with_description("Log a value and continue")
            .with_inputs(vec![
                exec_in("exec", "Exec"),
                inp("value", "Value", StructuralType::Any),
            ])
            .with_outputs(vec![
                exec_out("exec", "Exec"),
                out("last", "Last", StructuralType::Any),
                out("history", "History", StructuralType::array(StructuralType::Any)),
            ])
            .with_controls(vec![Control::text("label", "Label", "log")]),
    ]
}
