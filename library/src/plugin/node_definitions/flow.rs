use std::sync::Mutex;

use async_trait::async_trait;
use log::debug;

use super::{exec_in, exec_out, node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, ExecContext, Forward, InputValues, OutputValues};
use crate::model::control::Control;
use crate::model::node::NodeStatus;
use crate::model::schema::StructuralType;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::Node;

/// Entry point of an exec chain.
pub struct StartNode;

#[async_trait]
impl Node for StartNode {
    async fn execute(
        &self,
        _input: Option<&str>,
        ctx: &ExecContext<'_>,
    ) -> Result<Forward, LibraryError> {
        ctx.set_status(NodeStatus::Completed);
        Ok(Forward::output("exec"))
    }
}

pub const SEQUENCE_OUTPUTS: [&str; 3] = ["then_0", "then_1", "then_2"];

/// Fans out to every `then_*` output in order.
pub struct SequenceNode;

#[async_trait]
impl Node for SequenceNode {
    async fn execute(
        &self,
        _input: Option<&str>,
        ctx: &ExecContext<'_>,
    ) -> Result<Forward, LibraryError> {
        ctx.set_status(NodeStatus::Completed);
        Ok(SEQUENCE_OUTPUTS
            .iter()
            .fold(Forward::none(), |forward, key| forward.and(key)))
    }
}

#[derive(Debug, Default)]
struct LoopState {
    remaining: i64,
    index: i64,
}

/// Runs its `loop` output `count` times, one iteration per trigger.
///
/// `exec` starts (or restarts) the loop and runs the first iteration; the loop
/// body triggers `next` for each following one. `stop` ends the loop early.
/// `done` fires once the count is exhausted or the loop is stopped.
#[derive(Default)]
pub struct CounterLoopNode {
    state: Mutex<LoopState>,
}

impl CounterLoopNode {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LoopState>, LibraryError> {
        self.state
            .lock()
            .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))
    }
}

#[async_trait]
impl Node for CounterLoopNode {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        _inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let index = self.lock()?.index;
        Ok(OutputValues::new().with("index", index))
    }

    async fn execute(
        &self,
        input: Option<&str>,
        ctx: &ExecContext<'_>,
    ) -> Result<Forward, LibraryError> {
        ctx.set_status(NodeStatus::Running);
        let count = ctx
            .control("count")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .max(0.0) as i64;

        let forward = {
            let mut state = self.lock()?;
            match input.unwrap_or("exec") {
                "stop" => {
                    state.remaining = 0;
                    Forward::output("done")
                }
                key => {
                    if key != "next" {
                        state.remaining = count;
                    }
                    if state.remaining > 0 {
                        state.index = count - state.remaining;
                        state.remaining -= 1;
                        debug!("Loop {} iteration {}", ctx.node_id(), state.index);
                        Forward::output("loop")
                    } else {
                        Forward::output("done")
                    }
                }
            }
        };

        ctx.set_status(NodeStatus::Completed);
        Ok(forward)
    }
}

pub(super) fn flow_nodes() -> Vec<NodeTypeDefinition> {
    let nc = NodeCategory::Flow;
    vec![
        node("flow.start", "Start", nc, |_| StartNode)
            .with_description("Begin an exec chain")
            .with_outputs(vec![exec_out("exec", "Exec")]),
        node("flow.sequence", "Sequence", nc, |_| SequenceNode)
            .with_description("Run several exec chains one after another")
            .with_inputs(vec![exec_in("exec", "Exec")])
            .with_outputs(
                SEQUENCE_OUTPUTS
                    .iter()
                    .enumerate()
                    .map(|(i, key)| exec_out(key, &format!("Then {}", i)))
                    .collect(),
            ),
        node("flow.counter_loop", "Counter Loop", nc, |_| CounterLoopNode::default())
            .with_description("Repeat an exec chain a fixed number of times")
            .with_inputs(vec![
                exec_in("exec", "Start"),
                exec_in("next", "Next"),
                exec_in("stop", "Stop"),
            ])
            .with_outputs(vec![
                exec_out("loop", "Loop"),
                exec_out("done", "Done"),
                out("index", "Index", StructuralType::integer()),
            ])
            .with_controls(vec![Control::number("count", "Count", 3.0)]),
    ]
}
