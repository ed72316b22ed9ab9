use std::cmp::Ordering;

use async_trait::async_trait;

use super::{exec_in, exec_out, inp, node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, ExecContext, Forward, InputValues, OutputValues};
use crate::model::control::Control;
use crate::model::node::NodeStatus;
use crate::model::schema::StructuralType;
use crate::model::value::Value;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::Node;

/// Forwards `exec` when the condition is truthy, `exec2` otherwise.
pub struct IfNode;

#[async_trait]
impl Node for IfNode {
    async fn execute(
        &self,
        _input: Option<&str>,
        ctx: &ExecContext<'_>,
    ) -> Result<Forward, LibraryError> {
        ctx.set_status(NodeStatus::Running);
        let inputs = ctx.fetch_inputs(Some(&["condition"])).await?;
        let condition = inputs
            .first_or_control("condition")
            .is_some_and(|v| v.is_truthy());
        ctx.set_status(NodeStatus::Completed);
        Ok(Forward::output(if condition { "exec" } else { "exec2" }))
    }
}

const OPERATORS: [&str; 6] = [">", ">=", "<", "<=", "==", "!="];

/// Compares `a` and `b` with the operator selected in its control.
pub struct CompareNode;

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => Some(x.cmp(y)),
            _ => None,
        },
    }
}

#[async_trait]
impl Node for CompareNode {
    async fn data(
        &self,
        ctx: &DataContext<'_>,
        inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let a = inputs.first("a").cloned().unwrap_or_default();
        let b = inputs.first("b").cloned().unwrap_or_default();
        let op = inputs
            .control("operator")
            .and_then(Value::as_str)
            .unwrap_or("==")
            .to_string();

        let ordering = compare(&a, &b);
        let result = match op.as_str() {
            "==" => ordering.map_or(a == b, |o| o == Ordering::Equal),
            "!=" => ordering.map_or(a != b, |o| o != Ordering::Equal),
            _ => match ordering {
                Some(o) => match op.as_str() {
                    ">" => o == Ordering::Greater,
                    ">=" => o != Ordering::Less,
                    "<" => o == Ordering::Less,
                    _ => o != Ordering::Greater,
                },
                None => {
                    ctx.set_status(NodeStatus::Warning(format!(
                        "Cannot order {} and {}",
                        a, b
                    )));
                    return Ok(OutputValues::new().with("result", false));
                }
            },
        };
        if matches!(ctx.status(), NodeStatus::Warning(_)) {
            ctx.set_status(NodeStatus::Idle);
        }
        Ok(OutputValues::new().with("result", result))
    }
}

pub(super) fn logic_nodes() -> Vec<NodeTypeDefinition> {
    let nc = NodeCategory::Logic;
    vec![
        node("logic.if", "If", nc, |_| IfNode)
            .with_description("Branch on a condition")
            .with_inputs(vec![
                exec_in("exec", "Exec"),
                inp("condition", "Condition", StructuralType::Any)
                    .with_tooltip("Positive numbers, true and non-empty values take the first branch"),
            ])
            .with_outputs(vec![exec_out("exec", "True"), exec_out("exec2", "False")]),
        node("logic.compare", "Compare", nc, |_| CompareNode)
            .with_inputs(vec![
                inp("a", "A", StructuralType::Any),
                inp("b", "B", StructuralType::Any),
            ])
            .with_outputs(vec![out("result", "Result", StructuralType::boolean())])
            .with_controls(vec![Control::select("operator", "Operator", &OPERATORS, ">")]),
    ]
}
