use async_trait::async_trait;

use super::{node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, InputValues, OutputValues};
use crate::model::control::Control;
use crate::model::schema::StructuralType;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::Node;

/// Emits the value of its `value` control.
pub struct ConstantNode;

#[async_trait]
impl Node for ConstantNode {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let value = inputs.control("value").cloned().unwrap_or_default();
        Ok(OutputValues::new().with("value", value))
    }
}

pub(super) fn value_nodes() -> Vec<NodeTypeDefinition> {
    let nc = NodeCategory::Value;
    vec![
        node("value.string", "String", nc, |_| ConstantNode)
            .with_description("Constant text")
            .with_outputs(vec![out("value", "Value", StructuralType::string())])
            .with_controls(vec![Control::text("value", "Value", "")]),
        node("value.number", "Number", nc, |_| ConstantNode)
            .with_description("Constant number")
            .with_outputs(vec![out("value", "Value", StructuralType::number())])
            .with_controls(vec![Control::number("value", "Value", 0.0)]),
        node("value.boolean", "Boolean", nc, |_| ConstantNode)
            .with_description("Constant true/false")
            .with_outputs(vec![out("value", "Value", StructuralType::boolean())])
            .with_controls(vec![Control::toggle("value", "Value", false)]),
    ]
}
