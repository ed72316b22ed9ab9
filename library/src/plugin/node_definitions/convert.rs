use async_trait::async_trait;

use super::{inp, node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, InputValues, OutputValues};
use crate::model::control::Control;
use crate::model::node::NodeStatus;
use crate::model::schema::StructuralType;
use crate::model::value::Value;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::Node;

/// Parses text into a number. Unparseable text puts the node in ERROR and
/// yields `null`.
pub struct StringToNumberNode;

#[async_trait]
impl Node for StringToNumberNode {
    async fn data(
        &self,
        ctx: &DataContext<'_>,
        inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let text = inputs
            .first_or_control("value")
            .map(|v| v.to_string())
            .unwrap_or_default();
        match text.trim().parse::<f64>() {
            Ok(n) => {
                if ctx.status().is_error() {
                    ctx.set_status(NodeStatus::Idle);
                }
                Ok(OutputValues::new().with("value", n))
            }
            Err(_) => {
                ctx.set_status(NodeStatus::Error(format!(
                    "Cannot convert '{}' to a number",
                    text
                )));
                Ok(OutputValues::new().with("value", Value::Null))
            }
        }
    }
}

pub(super) fn convert_nodes() -> Vec<NodeTypeDefinition> {
    vec![
        node(
            "convert.string_to_number",
            "String to Number",
            NodeCategory::Convert,
            |_| StringToNumberNode,
        )
        .with_description("Parse text as a number")
        .with_inputs(vec![
            inp("value", "Text", StructuralType::string())
                .with_control(Control::text("value", "Text", "0")),
        ])
        .with_outputs(vec![out("value", "Number", StructuralType::number())]),
    ]
}
