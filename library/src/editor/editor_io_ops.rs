use std::path::Path;

use log::info;
use uuid::Uuid;

use super::editor_service::Editor;
use super::handlers::GroupHandler;
use super::history::GraphMutation;
use crate::error::LibraryError;
use crate::io::{self, GraphDocument, LoadReport};
use crate::model::graph::{read_graph, write_graph};
use crate::model::group::{Group, Rect};
use crate::model::node::Position;

/// Persistence and clipboard operations.
impl Editor {
    pub fn serialize(&self) -> Result<GraphDocument, LibraryError> {
        let graph = read_graph(&self.graph)?;
        Ok(io::serialize_graph(&graph, &self.deps.config.document_version))
    }

    /// Copy: a document with `ids`, their internal connections, and groups
    /// made only of selected nodes.
    pub fn serialize_selection(&self, ids: &[Uuid]) -> Result<GraphDocument, LibraryError> {
        let graph = read_graph(&self.graph)?;
        Ok(io::serialize_selection(
            &graph,
            ids,
            &self.deps.config.document_version,
        ))
    }

    /// Replace the whole graph with the document's content.
    pub fn load(&self, doc: &GraphDocument) -> Result<LoadReport, LibraryError> {
        self.control_flow.cancel_all();
        let report = {
            let mut graph = write_graph(&self.graph)?;
            graph.clear();
            self.dataflow.reset_all()?;
            io::deserialize_into(&mut graph, &self.registry, &self.deps, doc)?
        };
        self.record(GraphMutation::Loaded {
            nodes: report.nodes.clone(),
        });
        Ok(report)
    }

    pub fn load_str(&self, json_str: &str) -> Result<LoadReport, LibraryError> {
        self.load(&GraphDocument::load(json_str)?)
    }

    pub fn load_file(&self, path: &Path) -> Result<LoadReport, LibraryError> {
        info!("Loading graph from {}", path.display());
        self.load(&GraphDocument::load_from(path)?)
    }

    pub fn save_file(&self, path: &Path) -> Result<(), LibraryError> {
        self.serialize()?.save_to(path)?;
        info!("Saved graph to {}", path.display());
        Ok(())
    }

    /// Graft a copied document into the graph with fresh ids.
    ///
    /// Without a pointer the copy lands at its original place shifted by
    /// the configured paste offset.
    pub fn paste(&self, doc: &GraphDocument, pointer: Option<Position>) -> Result<LoadReport, LibraryError> {
        let pointer = pointer.unwrap_or_else(|| {
            let offset = self.deps.config.paste_offset;
            io::bounding_origin(doc).offset(offset.x, offset.y)
        });
        let remapped = io::remap_for_paste(doc, pointer);
        let report = {
            let mut graph = write_graph(&self.graph)?;
            io::deserialize_into(&mut graph, &self.registry, &self.deps, &remapped)?
        };
        self.invalidate(report.nodes.iter().copied())?;
        self.record(GraphMutation::Pasted {
            nodes: report.nodes.clone(),
        });
        Ok(report)
    }
}

/// Groups.
impl Editor {
    pub fn add_group(&self, text: &str, links: Vec<Uuid>) -> Result<Uuid, LibraryError> {
        let group = Group::new(text, Rect::default(), links);
        let id = GroupHandler::add_group(&self.graph, group)?;
        self.fit_group(id)?;
        let group = read_graph(&self.graph)?
            .get_group(id)
            .cloned()
            .ok_or_else(|| LibraryError::invalid(format!("Group {} not found", id)))?;
        self.record(GraphMutation::GroupAdded(group));
        Ok(id)
    }

    pub fn remove_group(&self, group_id: Uuid) -> Result<Group, LibraryError> {
        let group = GroupHandler::remove_group(&self.graph, group_id)?;
        self.record(GraphMutation::GroupRemoved(group.clone()));
        Ok(group)
    }

    /// Padded bounds of the group's live members, `None` when it has none.
    pub fn group_bounds(&self, group_id: Uuid) -> Result<Option<Rect>, LibraryError> {
        let config = &self.deps.config;
        GroupHandler::group_bounds(
            &self.graph,
            group_id,
            config.default_node_size,
            config.group_padding,
        )
    }

    pub fn fit_group(&self, group_id: Uuid) -> Result<Option<Rect>, LibraryError> {
        let config = &self.deps.config;
        GroupHandler::fit_group(
            &self.graph,
            group_id,
            config.default_node_size,
            config.group_padding,
        )
    }
}
