use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::group::Group;
use crate::model::node::Position;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub version: String,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub connections: Vec<ConnectionDocument>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default)]
    pub position: Position,
    /// Opaque per-type payload produced by the node's serialization hook.
    #[serde(default)]
    pub control_data: serde_json::Value,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDocument {
    pub id: Uuid,
    pub source: Uuid,
    pub source_output: String,
    pub target: Uuid,
    pub target_input: String,
}

impl GraphDocument {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            nodes: Vec::new(),
            connections: Vec::new(),
            groups: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn load(json_str: &str) -> Result<Self, LibraryError> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn save(&self) -> Result<String, LibraryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, LibraryError> {
        let content = fs::read_to_string(path)?;
        Self::load(&content)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), LibraryError> {
        fs::write(path, self.save()?)?;
        Ok(())
    }

    pub fn node(&self, id: Uuid) -> Option<&NodeDocument> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_field_names() {
        let json = r#"{
            "version": "1.0",
            "nodes": [
                {"id": "6f1c2f0e-9f55-4d0e-8d1e-0d5c0b0f6b11", "type": "value.number",
                 "position": {"x": 10.0, "y": 20.0}, "controlData": {"value": 4}}
            ],
            "connections": [
                {"id": "0b8d9d3c-2a0f-4a52-9d0e-8f5e6a1c7d22",
                 "source": "6f1c2f0e-9f55-4d0e-8d1e-0d5c0b0f6b11", "sourceOutput": "value",
                 "target": "6f1c2f0e-9f55-4d0e-8d1e-0d5c0b0f6b11", "targetInput": "value"}
            ]
        }"#;
        let doc = GraphDocument::load(json).unwrap();
        assert_eq!(doc.nodes[0].type_id, "value.number");
        assert_eq!(doc.nodes[0].control_data["value"], 4);
        assert_eq!(doc.connections[0].source_output, "value");
        assert!(doc.groups.is_empty());

        let out: serde_json::Value = serde_json::from_str(&doc.save().unwrap()).unwrap();
        assert_eq!(out["nodes"][0]["type"], "value.number");
        assert!(out["nodes"][0].get("controlData").is_some());
        assert_eq!(out["connections"][0]["targetInput"], "value");
    }
}
