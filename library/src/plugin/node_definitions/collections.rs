use std::collections::BTreeMap;

use async_trait::async_trait;
use log::debug;

use super::{inp, node, out};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, InputValues, OutputValues};
use crate::model::control::Control;
use crate::model::node::NodeCore;
use crate::model::port::Port;
use crate::model::schema::StructuralType;
use crate::model::value::Value;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::{ConnectionChange, Node};

/// Collects every value connected to `items` into an array.
///
/// `items` adopts the schema `T` of its sources and `array` becomes `Array<T>`.
pub struct ArrayBuildNode;

#[async_trait]
impl Node for ArrayBuildNode {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        Ok(OutputValues::new().with("array", inputs.get("items").to_vec()))
    }

    fn on_connection_changed_schema(
        &self,
        core: &mut NodeCore,
        change: &ConnectionChange,
    ) -> Result<Vec<String>, LibraryError> {
        if change.target_port != "items" {
            return Ok(Vec::new());
        }
        let item = change.merged_schema().unwrap_or_default();
        core.set_input_schema("items", item.clone())?;
        let mut changed = Vec::new();
        if core.set_output_schema("array", StructuralType::array(item))? {
            changed.push("array".to_string());
        }
        Ok(changed)
    }
}

/// Exposes one output per field of the connected object's schema.
///
/// The object schema is kept in the hidden `schema` control so the outputs
/// can be rebuilt when a document is loaded.
pub struct ObjectPickNode;

const SCHEMA_CONTROL: &str = "schema";

impl ObjectPickNode {
    fn stored_schema(core: &NodeCore) -> Result<Option<StructuralType>, LibraryError> {
        match core.control_value(SCHEMA_CONTROL) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.to_json())?)),
        }
    }

    /// Make the outputs match `fields` exactly. Returns the keys of outputs
    /// that were added or retyped; removed outputs are left to the caller's
    /// dangling-connection cleanup.
    fn rebuild_outputs(
        core: &mut NodeCore,
        fields: &BTreeMap<String, StructuralType>,
    ) -> Result<Vec<String>, LibraryError> {
        for key in core.outputs.keys() {
            if !fields.contains_key(&key) {
                debug!("Object pick {} drops output {}", core.id, key);
                core.outputs.remove(&key);
            }
        }

        let mut changed = Vec::new();
        for (key, schema) in fields {
            if core.outputs.contains(key) {
                if core.set_output_schema(key, schema.clone())? {
                    changed.push(key.clone());
                }
            } else {
                core.outputs.insert(Port::output(key, key, schema.clone()))?;
                changed.push(key.clone());
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl Node for ObjectPickNode {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let mut outputs = OutputValues::new();
        if let Some(fields) = inputs.first("object").and_then(Value::as_object) {
            for (key, value) in fields {
                outputs.insert(key, value.clone());
            }
        }
        Ok(outputs)
    }

    fn on_connection_changed_schema(
        &self,
        core: &mut NodeCore,
        change: &ConnectionChange,
    ) -> Result<Vec<String>, LibraryError> {
        if change.target_port != "object" {
            return Ok(Vec::new());
        }
        let schema = change.merged_schema().filter(|s| s.object_fields().is_some());
        let stored = match &schema {
            Some(schema) => Value::from(serde_json::to_value(schema)?),
            None => Value::Null,
        };
        core.set_control_value(SCHEMA_CONTROL, stored)?;
        core.set_input_schema("object", schema.clone().unwrap_or_default())?;

        let fields = schema
            .as_ref()
            .and_then(|s| s.object_fields())
            .cloned()
            .unwrap_or_default();
        Self::rebuild_outputs(core, &fields)
    }

    fn setup_schema(&self, core: &mut NodeCore) -> Result<(), LibraryError> {
        let schema = Self::stored_schema(core)?;
        let fields = schema
            .as_ref()
            .and_then(|s| s.object_fields())
            .cloned()
            .unwrap_or_default();
        core.set_input_schema("object", schema.unwrap_or_default())?;
        Self::rebuild_outputs(core, &fields)?;
        Ok(())
    }
}

pub(super) fn collection_nodes() -> Vec<NodeTypeDefinition> {
    let nc = NodeCategory::Collection;
    vec![
        node("collection.array_build", "Array Builder", nc, |_| ArrayBuildNode)
            .with_description("Build an array from every connected value")
            .with_inputs(vec![inp("items", "Items", StructuralType::Any)])
            .with_outputs(vec![out(
                "array",
                "Array",
                StructuralType::array(StructuralType::Any),
            )]),
        node("collection.object_pick", "Object Pick", nc, |_| ObjectPickNode)
            .with_description("Split an object into one output per field")
            .with_inputs(vec![inp("object", "Object", StructuralType::Any)])
            .with_controls(vec![Control::json(SCHEMA_CONTROL, "Schema", Value::Null)]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::port::PortDirection;
    use crate::model::socket::{SocketKind, SocketSnapshot};
    use crate::plugin::{NodeDeps, NodeRegistry};

    fn snapshot(schema: StructuralType) -> SocketSnapshot {
        SocketSnapshot {
            name: "value".to_string(),
            kind: SocketKind::Data(schema),
            revision: 0,
        }
    }

    fn change(port: &str, sources: Vec<StructuralType>) -> ConnectionChange {
        let sources: Vec<_> = sources.into_iter().map(snapshot).collect();
        ConnectionChange {
            is_connected: !sources.is_empty(),
            source: snapshot(StructuralType::Any),
            target_port: port.to_string(),
            sources,
        }
    }

    #[test]
    fn test_array_build_mirrors_item_type() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut entry = registry
            .create("collection.array_build", None, &NodeDeps::default())
            .unwrap();
        let behavior = entry.behavior.clone();

        let changed = behavior
            .on_connection_changed_schema(&mut entry.core, &change("items", vec![StructuralType::string()]))
            .unwrap();
        assert_eq!(changed, vec!["array".to_string()]);
        assert_eq!(
            entry.core.output_schema("array"),
            Some(StructuralType::array(StructuralType::string()))
        );

        behavior
            .on_connection_changed_schema(&mut entry.core, &change("items", vec![]))
            .unwrap();
        assert_eq!(entry.core.input_schema("items"), Some(StructuralType::Any));
        assert_eq!(
            entry.core.output_schema("array"),
            Some(StructuralType::array(StructuralType::Any))
        );
    }

    #[test]
    fn test_object_pick_restores_outputs_from_control() {
        let registry = NodeRegistry::with_builtin_nodes();
        let mut entry = registry
            .create("collection.object_pick", None, &NodeDeps::default())
            .unwrap();
        let schema = StructuralType::object([("name", StructuralType::string())]);
        let stored = Value::from(serde_json::to_value(&schema).unwrap());
        entry.core.set_control_value("schema", stored).unwrap();

        let behavior = entry.behavior.clone();
        behavior.setup_schema(&mut entry.core).unwrap();
        assert_eq!(entry.core.outputs.keys(), vec!["name".to_string()]);
        assert!(entry.core.port(PortDirection::Output, "name").is_some());
        assert_eq!(entry.core.input_schema("object"), Some(schema));
    }
}
