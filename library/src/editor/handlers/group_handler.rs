use uuid::Uuid;

use crate::config::NodeSize;
use crate::error::LibraryError;
use crate::model::graph::{Graph, SharedGraph, read_graph, write_graph};
use crate::model::group::{Group, Rect};

pub struct GroupHandler;

impl GroupHandler {
    pub fn add_group(graph: &SharedGraph, group: Group) -> Result<Uuid, LibraryError> {
        let mut graph = write_graph(graph)?;
        graph.add_group(group)
    }

    pub fn remove_group(graph: &SharedGraph, group_id: Uuid) -> Result<Group, LibraryError> {
        let mut graph = write_graph(graph)?;
        graph
            .remove_group(group_id)
            .ok_or_else(|| LibraryError::invalid(format!("Group {} not found", group_id)))
    }

    /// Bounding rect of the group's live members, padded. Links to nodes
    /// that no longer exist are skipped; `None` when no member is left.
    pub fn group_bounds(
        graph: &SharedGraph,
        group_id: Uuid,
        node_size: NodeSize,
        padding: f64,
    ) -> Result<Option<Rect>, LibraryError> {
        let graph = read_graph(graph)?;
        let group = graph
            .get_group(group_id)
            .ok_or_else(|| LibraryError::invalid(format!("Group {} not found", group_id)))?;
        Ok(members_rect(&graph, &group.links, node_size).map(|r| r.expand(padding)))
    }

    /// Resize the group to its members. Leaves the rect alone when the
    /// group has no live members.
    pub fn fit_group(
        graph: &SharedGraph,
        group_id: Uuid,
        node_size: NodeSize,
        padding: f64,
    ) -> Result<Option<Rect>, LibraryError> {
        let mut graph = write_graph(graph)?;
        let links = graph
            .get_group(group_id)
            .map(|g| g.links.clone())
            .ok_or_else(|| LibraryError::invalid(format!("Group {} not found", group_id)))?;
        let Some(rect) = members_rect(&graph, &links, node_size).map(|r| r.expand(padding)) else {
            return Ok(None);
        };
        if let Some(group) = graph.get_group_mut(group_id) {
            group.rect = rect;
        }
        Ok(Some(rect))
    }
}

fn members_rect(graph: &Graph, links: &[Uuid], node_size: NodeSize) -> Option<Rect> {
    links
        .iter()
        .filter_map(|id| graph.get_node(*id))
        .map(|entry| {
            let p = entry.core.position;
            Rect::new(p.x, p.y, node_size.width, node_size.height)
        })
        .reduce(|acc, r| acc.union(&r))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::Position;
    use crate::plugin::{NodeDeps, NodeRegistry};

    const SIZE: NodeSize = NodeSize {
        width: 100.0,
        height: 50.0,
    };

    #[test]
    fn test_bounds_ignore_stale_links() {
        let registry = NodeRegistry::with_builtin_nodes();
        let graph = Graph::new().into_shared();
        let mut ids = Vec::new();
        for (x, y) in [(0.0, 0.0), (200.0, 100.0)] {
            let mut entry = registry.create("value.number", None, &NodeDeps::default()).unwrap();
            entry.core.position = Position::new(x, y);
            ids.push(write_graph(&graph).unwrap().add_node(entry).unwrap());
        }
        ids.push(Uuid::new_v4());

        let group = Group::new("Numbers", Rect::default(), ids);
        let group_id = GroupHandler::add_group(&graph, group).unwrap();

        let bounds = GroupHandler::group_bounds(&graph, group_id, SIZE, 10.0).unwrap();
        assert_eq!(bounds, Some(Rect::new(-10.0, -10.0, 320.0, 170.0)));
    }

    #[test]
    fn test_fit_group_without_members_keeps_rect() {
        let graph = Graph::new().into_shared();
        let rect = Rect::new(5.0, 5.0, 50.0, 50.0);
        let group_id =
            GroupHandler::add_group(&graph, Group::new("Empty", rect, vec![Uuid::new_v4()])).unwrap();

        assert_eq!(GroupHandler::fit_group(&graph, group_id, SIZE, 10.0).unwrap(), None);
        assert_eq!(read_graph(&graph).unwrap().get_group(group_id).unwrap().rect, rect);

        GroupHandler::remove_group(&graph, group_id).unwrap();
        assert!(GroupHandler::remove_group(&graph, group_id).is_err());
    }
}
