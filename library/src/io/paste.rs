use std::collections::HashMap;
use std::collections::hash_map::Entry;

use log::warn;
use uuid::Uuid;

use super::document::GraphDocument;
use crate::model::node::Position;

/// Top-left corner of the document's node positions.
pub fn bounding_origin(doc: &GraphDocument) -> Position {
    if doc.nodes.is_empty() {
        return Position::default();
    }
    doc.nodes.iter().fold(
        Position::new(f64::INFINITY, f64::INFINITY),
        |acc, n| Position::new(acc.x.min(n.position.x), acc.y.min(n.position.y)),
    )
}

/// Prepare a copied document for grafting into a live graph.
///
/// Positions are made relative to the copy's bounding box and moved to
/// `pointer`. Every node, connection and group gets a fresh id, and
/// connections and group links are rewritten through the node id map.
/// Connections touching a node outside the copy are dropped, as are group
/// links to such nodes. A node id listed twice yields two nodes; links to that
/// id resolve to the first.
pub fn remap_for_paste(doc: &GraphDocument, pointer: Position) -> GraphDocument {
    let origin = bounding_origin(doc);
    let (dx, dy) = (pointer.x - origin.x, pointer.y - origin.y);

    let mut id_map: HashMap<Uuid, Uuid> = HashMap::with_capacity(doc.nodes.len());
    let mut out = GraphDocument::new(&doc.version);
    out.metadata = doc.metadata.clone();
    out.nodes = doc
        .nodes
        .iter()
        .map(|n| {
            let mut node = n.clone();
            node.id = Uuid::new_v4();
            match id_map.entry(n.id) {
                Entry::Vacant(slot) => {
                    slot.insert(node.id);
                }
                Entry::Occupied(_) => warn!("Copied node id {} appears more than once", n.id),
            }
            node.position = n.position.offset(dx, dy);
            node
        })
        .collect();
    out.connections = doc
        .connections
        .iter()
        .filter_map(|c| {
            let mut conn = c.clone();
            conn.id = Uuid::new_v4();
            conn.source = *id_map.get(&c.source)?;
            conn.target = *id_map.get(&c.target)?;
            Some(conn)
        })
        .collect();
    out.groups = doc
        .groups
        .iter()
        .map(|g| {
            let mut group = g.clone();
            group.id = Uuid::new_v4();
            group.links = g.links.iter().filter_map(|id| id_map.get(id).copied()).collect();
            group.rect = g.rect.translate(dx, dy);
            group
        })
        .collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::document::{ConnectionDocument, NodeDocument};
    use crate::model::group::{Group, Rect};

    fn node(x: f64, y: f64) -> NodeDocument {
        NodeDocument {
            id: Uuid::new_v4(),
            type_id: "util.relay".to_string(),
            position: Position::new(x, y),
            control_data: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_remap_moves_copy_under_pointer() {
        let mut doc = GraphDocument::new("1.0");
        let a = node(100.0, 300.0);
        let b = node(250.0, 200.0);
        let outside = Uuid::new_v4();
        doc.connections.push(ConnectionDocument {
            id: Uuid::new_v4(),
            source: a.id,
            source_output: "value".to_string(),
            target: b.id,
            target_input: "value".to_string(),
        });
        doc.connections.push(ConnectionDocument {
            id: Uuid::new_v4(),
            source: outside,
            source_output: "value".to_string(),
            target: a.id,
            target_input: "value".to_string(),
        });
        doc.groups.push(Group::new(
            "pair",
            Rect::new(90.0, 190.0, 200.0, 150.0),
            vec![a.id, b.id, outside],
        ));
        doc.nodes = vec![a.clone(), b.clone()];

        let pasted = remap_for_paste(&doc, Position::new(10.0, 10.0));

        assert_eq!(pasted.nodes[0].position, Position::new(10.0, 110.0));
        assert_eq!(pasted.nodes[1].position, Position::new(160.0, 10.0));
        assert!(pasted.nodes.iter().all(|n| n.id != a.id && n.id != b.id));

        assert_eq!(pasted.connections.len(), 1);
        assert_eq!(pasted.connections[0].source, pasted.nodes[0].id);
        assert_eq!(pasted.connections[0].target, pasted.nodes[1].id);
        assert_ne!(pasted.connections[0].id, doc.connections[0].id);

        let group = &pasted.groups[0];
        assert_ne!(group.id, doc.groups[0].id);
        assert_eq!(group.links, vec![pasted.nodes[0].id, pasted.nodes[1].id]);
        assert_eq!(group.rect, Rect::new(0.0, 0.0, 200.0, 150.0));
    }

    #[test]
    fn test_repeated_node_id_gets_its_own_copy() {
        let mut doc = GraphDocument::new("1.0");
        let a = node(0.0, 0.0);
        let b = node(50.0, 0.0);
        doc.connections.push(ConnectionDocument {
            id: Uuid::new_v4(),
            source: a.id,
            source_output: "value".to_string(),
            target: b.id,
            target_input: "value".to_string(),
        });
        doc.nodes = vec![a.clone(), b, a];

        let pasted = remap_for_paste(&doc, Position::default());
        assert_eq!(pasted.nodes.len(), 3);
        assert_ne!(pasted.nodes[0].id, pasted.nodes[2].id);
        assert_eq!(pasted.connections[0].source, pasted.nodes[0].id);
    }
}
