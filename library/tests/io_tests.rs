//! Integration tests for documents, paste, history and configuration.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use nodeflow::config::EngineConfig;
use nodeflow::editor::{Editor, GraphMutation, MutationLog};
use nodeflow::error::LibraryError;
use nodeflow::evaluation::{DataContext, InputValues, OutputValues};
use nodeflow::io::{ConnectionDocument, GraphDocument, NodeDocument, DOCUMENT_VERSION};
use nodeflow::model::{PortRef, Position, StructuralType, Value};
use nodeflow::plugin::{Node, NodeCategory, NodeRegistry, NodeTypeDefinition, PortDefinition};
use uuid::Uuid;

struct ObjectSource;

#[async_trait]
impl Node for ObjectSource {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        _inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        Ok(OutputValues::new().with("value", Value::from(serde_json::json!({"a": "x"}))))
    }
}

/// Helper: registry with the built-in nodes plus `test.object_source`.
fn make_registry() -> Arc<NodeRegistry> {
    let registry = NodeRegistry::with_builtin_nodes();
    registry.register_node_type(
        NodeTypeDefinition::new("test.object_source", "Object Source", NodeCategory::Custom, |_| {
            ObjectSource
        })
        .with_outputs(vec![PortDefinition::output(
            "value",
            "Value",
            StructuralType::object([("a", StructuralType::string())]),
        )]),
    );
    Arc::new(registry)
}

fn make_editor() -> Editor {
    Editor::new(make_registry(), EngineConfig::default())
}

/// Helper: number -> relay -> relay, grouped, with a non-default control.
fn build_sample(editor: &Editor) -> (Uuid, Uuid, Uuid) {
    let number = editor.add_node("value.number", Position::new(0.0, 0.0)).unwrap();
    let relay = editor.add_node("util.relay", Position::new(200.0, 0.0)).unwrap();
    let tail = editor.add_node("util.relay", Position::new(400.0, 50.0)).unwrap();
    editor.set_control(number, "value", Value::from(42.0)).unwrap();
    editor
        .connect(PortRef::new(number, "value"), PortRef::new(relay, "value"))
        .unwrap();
    editor
        .connect(PortRef::new(relay, "value"), PortRef::new(tail, "value"))
        .unwrap();
    editor.add_group("pipeline", vec![number, relay]).unwrap();
    (number, relay, tail)
}

#[tokio::test]
async fn test_serialize_load_round_trip() {
    let editor = make_editor();
    let (number, _, tail) = build_sample(&editor);
    let doc = editor.serialize().unwrap();
    assert_eq!(doc.version, DOCUMENT_VERSION);
    assert_eq!(doc.nodes.len(), 3);
    assert_eq!(doc.connections.len(), 2);
    assert_eq!(doc.groups.len(), 1);
    assert_eq!(doc.node(number).unwrap().control_data["value"], 42.0);

    let json = doc.save().unwrap();
    let restored = make_editor();
    let report = restored.load(&GraphDocument::load(&json).unwrap()).unwrap();
    assert!(report.is_complete());
    assert_eq!(restored.serialize().unwrap(), doc);

    let outputs = restored.fetch_outputs(tail).await.unwrap();
    assert_eq!(outputs.get("value"), Some(&Value::from(42.0)));
    let schema = restored
        .with_node(tail, |e| e.core.output_schema("value"))
        .unwrap();
    assert_eq!(schema, Some(StructuralType::number()));
}

#[test]
fn test_load_replaces_existing_graph() {
    let editor = make_editor();
    build_sample(&editor);
    let doc = editor.serialize().unwrap();

    let other = make_editor();
    other.add_node("flow.start", Position::default()).unwrap();
    other.load(&doc).unwrap();
    assert_eq!(other.node_ids().unwrap().len(), 3);
    assert_eq!(other.connections().unwrap().len(), 2);
}

#[test]
fn test_connections_replayed_after_ports_appear() {
    let source = Uuid::new_v4();
    let pick = Uuid::new_v4();
    let relay = Uuid::new_v4();
    let mut doc = GraphDocument::new(DOCUMENT_VERSION);
    for (id, type_id) in [
        (source, "test.object_source"),
        (pick, "collection.object_pick"),
        (relay, "util.relay"),
    ] {
        doc.nodes.push(NodeDocument {
            id,
            type_id: type_id.to_string(),
            position: Position::default(),
            control_data: serde_json::Value::Null,
        });
    }
    // The `a` output only exists once the object is connected.
    for (from, out, to, input) in [(pick, "a", relay, "value"), (source, "value", pick, "object")] {
        doc.connections.push(ConnectionDocument {
            id: Uuid::new_v4(),
            source: from,
            source_output: out.to_string(),
            target: to,
            target_input: input.to_string(),
        });
    }

    let editor = make_editor();
    let report = editor.load(&doc).unwrap();
    assert!(report.is_complete());
    assert_eq!(editor.connections().unwrap().len(), 2);
    let schema = editor
        .with_node(relay, |e| e.core.output_schema("value"))
        .unwrap();
    assert_eq!(schema, Some(StructuralType::string()));
}

#[test]
fn test_object_pick_outputs_survive_reload() {
    let editor = make_editor();
    let source = editor.add_node("test.object_source", Position::default()).unwrap();
    let pick = editor.add_node("collection.object_pick", Position::default()).unwrap();
    editor
        .connect(PortRef::new(source, "value"), PortRef::new(pick, "object"))
        .unwrap();
    let doc = editor.serialize().unwrap();

    // Without its source the pick node still rebuilds `a` from its stored schema.
    let mut detached = doc.clone();
    detached.connections.clear();
    detached.nodes.retain(|n| n.id == pick);
    let restored = make_editor();
    restored.load(&detached).unwrap();
    let keys = restored.with_node(pick, |e| e.core.outputs.keys()).unwrap();
    assert_eq!(keys, vec!["a".to_string()]);
}

#[tokio::test]
async fn test_parsed_json_type_survives_reload() {
    let editor = make_editor();
    let text = editor.add_node("value.string", Position::default()).unwrap();
    let parse = editor.add_node("json.parse", Position::default()).unwrap();
    let convert = editor
        .add_node("convert.string_to_number", Position::default())
        .unwrap();
    editor.set_control(text, "value", Value::from(r#""42""#)).unwrap();
    editor
        .connect(PortRef::new(text, "value"), PortRef::new(parse, "text"))
        .unwrap();
    editor.fetch_outputs(parse).await.unwrap();
    editor
        .connect(PortRef::new(parse, "value"), PortRef::new(convert, "value"))
        .unwrap();
    let outputs = editor.fetch_outputs(convert).await.unwrap();
    assert_eq!(outputs.get("value"), Some(&Value::from(42.0)));

    let json = editor.serialize().unwrap().save().unwrap();
    let restored = make_editor();
    let report = restored.load(&GraphDocument::load(&json).unwrap()).unwrap();
    assert!(report.is_complete(), "skipped: {:?}", report.skipped_connections);
    assert_eq!(restored.connections().unwrap().len(), 2);
    let schema = restored
        .with_node(parse, |e| e.core.output_schema("value"))
        .unwrap();
    assert_eq!(schema, Some(StructuralType::string()));
}

#[test]
fn test_duplicate_node_ids_in_clipboard_get_distinct_copies() {
    let editor = make_editor();
    let (number, _, _) = build_sample(&editor);
    let mut clipboard = editor.serialize_selection(&[number]).unwrap();
    let twin = clipboard.nodes[0].clone();
    clipboard.nodes.push(twin);

    let pasted = editor.paste(&clipboard, None).unwrap();
    assert_eq!(pasted.nodes.len(), 2);
    assert_ne!(pasted.nodes[0], pasted.nodes[1]);
    assert!(pasted.skipped_nodes.is_empty());
    assert_eq!(editor.node_ids().unwrap().len(), 5);
}

#[test]
fn test_paste_twice_yields_disjoint_copies() {
    let editor = make_editor();
    let (number, relay, _) = build_sample(&editor);
    let clipboard = editor.serialize_selection(&[number, relay]).unwrap();
    assert_eq!(clipboard.nodes.len(), 2);
    assert_eq!(clipboard.connections.len(), 1);
    assert_eq!(clipboard.groups.len(), 1);

    let first = editor.paste(&clipboard, None).unwrap();
    let second = editor.paste(&clipboard, Some(Position::new(1000.0, 1000.0))).unwrap();
    assert_eq!(first.nodes.len(), 2);
    assert_eq!(second.nodes.len(), 2);

    let mut ids: HashSet<Uuid> = HashSet::from([number, relay]);
    for id in first.nodes.iter().chain(second.nodes.iter()) {
        assert!(ids.insert(*id), "pasted id {} collides", id);
    }
    assert_eq!(editor.node_ids().unwrap().len(), 7);
    assert_eq!(editor.connections().unwrap().len(), 4);

    // Default paste shifts the copy by the configured offset.
    let offset = EngineConfig::default().paste_offset;
    let position = editor
        .with_node(first.nodes[0], |e| e.core.position)
        .unwrap();
    assert_eq!(position, Position::new(offset.x, offset.y));
    let position = editor
        .with_node(second.nodes[0], |e| e.core.position)
        .unwrap();
    assert_eq!(position, Position::new(1000.0, 1000.0));

    let doc = editor.serialize().unwrap();
    assert_eq!(doc.groups.len(), 3);
    let group_ids: HashSet<Uuid> = doc.groups.iter().map(|g| g.id).collect();
    assert_eq!(group_ids.len(), 3);
}

#[test]
fn test_group_bounds_ignore_removed_members() {
    let editor = make_editor();
    let (number, relay, _) = build_sample(&editor);
    let group = editor.serialize().unwrap().groups[0].id;
    let config = EngineConfig::default();

    let bounds = editor.group_bounds(group).unwrap().unwrap();
    assert_eq!(bounds.left, -config.group_padding);
    assert_eq!(
        bounds.width,
        200.0 + config.default_node_size.width + 2.0 * config.group_padding
    );

    editor.remove_node(relay).unwrap();
    let bounds = editor.group_bounds(group).unwrap().unwrap();
    assert_eq!(
        bounds.width,
        config.default_node_size.width + 2.0 * config.group_padding
    );

    editor.remove_node(number).unwrap();
    assert_eq!(editor.group_bounds(group).unwrap(), None);
}

#[test]
fn test_history_hook_sees_mutations() {
    let log = Arc::new(MutationLog::new());
    let editor = make_editor().with_history(log.clone());

    let number = editor.add_node("value.number", Position::default()).unwrap();
    let relay = editor.add_node("util.relay", Position::default()).unwrap();
    let conn = editor
        .connect(PortRef::new(number, "value"), PortRef::new(relay, "value"))
        .unwrap();
    editor.set_control(number, "value", Value::from(3.0)).unwrap();
    editor.move_node(relay, Position::new(10.0, 20.0)).unwrap();
    editor.disconnect(conn).unwrap();
    editor.remove_node(relay).unwrap();

    // A rejected connection records nothing.
    assert!(
        editor
            .connect(PortRef::new(number, "value"), PortRef::new(number, "value"))
            .is_err()
    );

    let entries = log.entries();
    assert_eq!(entries.len(), 7);
    assert!(matches!(&entries[0], GraphMutation::NodeAdded { id, .. } if *id == number));
    assert!(matches!(&entries[2], GraphMutation::Connected(c) if c.id == conn));
    assert_eq!(
        entries[3],
        GraphMutation::ControlChanged {
            node: number,
            key: "value".to_string(),
            previous: Value::from(0.0),
            value: Value::from(3.0),
        }
    );
    assert_eq!(
        entries[4],
        GraphMutation::NodeMoved {
            id: relay,
            from: Position::default(),
            to: Position::new(10.0, 20.0),
        }
    );
    assert!(matches!(&entries[5], GraphMutation::Disconnected(c) if c.id == conn));
    assert!(
        matches!(&entries[6], GraphMutation::NodeRemoved { id, connections, .. } if *id == relay && connections.is_empty())
    );

    log.clear();
    let doc = editor.serialize().unwrap();
    editor.load(&doc).unwrap();
    assert_eq!(
        log.entries(),
        vec![GraphMutation::Loaded {
            nodes: vec![number]
        }]
    );
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");

    let editor = make_editor();
    build_sample(&editor);
    editor.save_file(&path).unwrap();

    let restored = make_editor();
    let report = restored.load_file(&path).unwrap();
    assert_eq!(report.nodes.len(), 3);
    assert_eq!(restored.serialize().unwrap(), editor.serialize().unwrap());

    assert!(restored.load_file(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_config_round_trip_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = EngineConfig::default();
    config.group_padding = 8.0;
    config.log_filter = "nodeflow=debug".to_string();
    config.save_to(&path).unwrap();

    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let partial = EngineConfig::from_toml_str("channel_capacity = 4").unwrap();
    assert_eq!(partial.channel_capacity, 4);
    assert_eq!(partial.group_padding, EngineConfig::default().group_padding);

    let editor = Editor::with_builtin_nodes(loaded);
    assert_eq!(editor.config().group_padding, 8.0);
}
