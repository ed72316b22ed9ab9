use async_trait::async_trait;

use super::{inp, node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, InputValues, OutputValues};
use crate::model::node::NodeCore;
use crate::model::schema::StructuralType;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::{ConnectionChange, Node};

/// Generic passthrough. Its output takes the schema of whatever feeds it.
pub struct RelayNode;

#[async_trait]
impl Node for RelayNode {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let mut outputs = OutputValues::new();
        if let Some(value) = inputs.first("value") {
            outputs.insert("value", value.clone());
        }
        Ok(outputs)
    }

    fn on_connection_changed_schema(
        &self,
        core: &mut NodeCore,
        change: &ConnectionChange,
    ) -> Result<Vec<String>, LibraryError> {
        let schema = change.merged_schema().unwrap_or_default();
        core.set_input_schema("value", schema.clone())?;
        if core.set_output_schema("value", schema)? {
            Ok(vec!["value".to_string()])
        } else {
            Ok(Vec::new())
        }
    }
}

pub(super) fn util_nodes() -> Vec<NodeTypeDefinition> {
    vec![
        node("util.relay", "Relay", NodeCategory::Custom, |_| RelayNode)
            .with_description("Pass a value through unchanged")
            .with_inputs(vec![inp("value", "Value", StructuralType::Any)])
            .with_outputs(vec![out("value", "Value", StructuralType::Any)]),
    ]
}
