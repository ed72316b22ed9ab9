use async_trait::async_trait;

use super::{inp, node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, OutputValues};
use crate::model::control::Control;
use crate::model::node::{NodeCore, NodeStatus};
use crate::model::schema::StructuralType;
use crate::model::value::Value;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::Node;

/// Parses JSON text and retypes its `value` output to the parsed shape.
///
/// The derived schema is kept in the hidden `schema` control so a loaded
/// document gets the typed output back before its connections are replayed.
pub struct JsonParseNode;

const SCHEMA_CONTROL: &str = "schema";

#[async_trait]
impl Node for JsonParseNode {
    async fn data_with_fetch(&self, ctx: &DataContext<'_>) -> Result<OutputValues, LibraryError> {
        let inputs = ctx.fetch_inputs(Some(&["text"])).await?;
        let text = inputs
            .first_or_control("text")
            .map(|v| v.to_string())
            .unwrap_or_default();

        let value = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => {
                if ctx.status().is_error() {
                    ctx.set_status(NodeStatus::Idle);
                }
                Value::from(json)
            }
            Err(e) => {
                ctx.set_status(NodeStatus::Error(format!("Invalid JSON: {}", e)));
                return Ok(OutputValues::new().with("value", Value::Null));
            }
        };

        let schema = value.schema();
        let stored = Value::from(serde_json::to_value(&schema)?);
        ctx.update_core(|core| {
            core.set_control_value(SCHEMA_CONTROL, stored)?;
            if core.set_output_schema("value", schema)? {
                Ok(vec!["value".to_string()])
            } else {
                Ok(Vec::new())
            }
        })?;
        Ok(OutputValues::new().with("value", value))
    }

    fn setup_schema(&self, core: &mut NodeCore) -> Result<(), LibraryError> {
        let schema = match core.control_value(SCHEMA_CONTROL) {
            None | Some(Value::Null) => return Ok(()),
            Some(value) => serde_json::from_value::<StructuralType>(value.to_json())?,
        };
        core.set_output_schema("value", schema)?;
        Ok(())
    }
}

pub(super) fn json_nodes() -> Vec<NodeTypeDefinition> {
    vec![
        node("json.parse", "Parse JSON", NodeCategory::Json, |_| JsonParseNode)
            .with_description("Parse text as JSON; the output takes the parsed shape")
            .with_inputs(vec![
                inp("text", "Text", StructuralType::string())
                    .with_control(Control::text("text", "Text", "{}")),
            ])
            .with_outputs(vec![out("value", "Value", StructuralType::Any)])
            .with_controls(vec![Control::json(SCHEMA_CONTROL, "Schema", Value::Null)]),
    ]
}
