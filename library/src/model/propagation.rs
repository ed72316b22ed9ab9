//! Schema propagation through generic nodes.
//!
//! When a connection is made or broken, the target node's
//! `on_connection_changed_schema` hook re-derives its port schemas. Outputs it
//! reports as changed are pushed to every downstream input, breadth-first.
//! An input is visited again only when the schemas of its sources differ from
//! those it last saw in the pass. Data edges are acyclic, so a pass always
//! terminates.

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, trace};
use uuid::Uuid;

use super::connection::{Connection, PortRef};
use super::graph::Graph;
use super::port::PortDirection;
use super::socket::{SocketKind, SocketSnapshot};
use crate::error::LibraryError;
use crate::plugin::ConnectionChange;

/// What a propagation pass did to the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationReport {
    /// Inputs whose node hook ran, in visit order.
    pub visited: Vec<PortRef>,
    /// Outputs whose schema changed.
    pub changed_outputs: Vec<PortRef>,
    /// Connections removed because a hook removed one of their ports.
    pub removed_connections: Vec<Connection>,
    /// Inputs visited again because a later path changed their sources.
    pub revisits: usize,
    /// Inputs reached again with sources unchanged since their last visit.
    pub revisits_skipped: usize,
}

impl PropagationReport {
    /// Nodes whose ports or incoming connections changed.
    pub fn touched_nodes(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.visited
            .iter()
            .map(|p| p.node_id)
            .chain(self.removed_connections.iter().map(|c| c.to.node_id))
            .filter(|id| seen.insert(*id))
            .collect()
    }

    fn merge(&mut self, other: PropagationReport) {
        self.visited.extend(other.visited);
        self.changed_outputs.extend(other.changed_outputs);
        self.removed_connections.extend(other.removed_connections);
        self.revisits += other.revisits;
        self.revisits_skipped += other.revisits_skipped;
    }
}

struct Pending {
    target: PortRef,
    is_connected: bool,
    source: SocketSnapshot,
}

pub struct SchemaPropagator<'g> {
    graph: &'g mut Graph,
    /// Source kinds each input saw on its latest visit.
    seen: HashMap<(Uuid, String), Vec<SocketKind>>,
    queue: VecDeque<Pending>,
    report: PropagationReport,
}

impl<'g> SchemaPropagator<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self {
            graph,
            seen: HashMap::new(),
            queue: VecDeque::new(),
            report: PropagationReport::default(),
        }
    }

    /// `connection` was just added to the graph.
    pub fn connected(mut self, connection: &Connection) -> Result<PropagationReport, LibraryError> {
        let source = self.source_snapshot(&connection.from)?;
        self.queue.push_back(Pending {
            target: connection.to.clone(),
            is_connected: true,
            source,
        });
        self.run()
    }

    /// `connection` was just removed from the graph. `source` is the output
    /// socket as it was when the connection existed.
    pub fn disconnected(
        mut self,
        connection: &Connection,
        source: SocketSnapshot,
    ) -> Result<PropagationReport, LibraryError> {
        self.queue.push_back(Pending {
            target: connection.to.clone(),
            is_connected: false,
            source,
        });
        self.run()
    }

    /// Outputs of `node_id` changed schema outside a connection change (e.g.
    /// while evaluating); push them downstream.
    pub fn propagate_outputs(
        mut self,
        node_id: Uuid,
        changed: Vec<String>,
    ) -> Result<PropagationReport, LibraryError> {
        let removed = self.remove_dangling(node_id, &HashMap::new());
        self.enqueue_downstream(node_id, &changed);
        self.report.removed_connections.extend(removed);
        self.run()
    }

    fn run(mut self) -> Result<PropagationReport, LibraryError> {
        while let Some(pending) = self.queue.pop_front() {
            let sources = self.sources_of(&pending.target);
            let kinds: Vec<SocketKind> = sources.iter().map(|s| s.kind.clone()).collect();
            let key = (pending.target.node_id, pending.target.key.clone());
            match self.seen.insert(key, kinds.clone()) {
                Some(previous) if previous == kinds => {
                    trace!(
                        "Sources of {}.{} unchanged, skipping",
                        pending.target.node_id, pending.target.key
                    );
                    self.report.revisits_skipped += 1;
                    continue;
                }
                Some(_) => self.report.revisits += 1,
                None => {}
            }
            self.visit(pending, sources)?;
        }
        debug!(
            "Schema pass visited {} inputs, changed {} outputs, removed {} connections",
            self.report.visited.len(),
            self.report.changed_outputs.len(),
            self.report.removed_connections.len()
        );
        Ok(self.report)
    }

    fn sources_of(&self, target: &PortRef) -> Vec<SocketSnapshot> {
        self.graph
            .incoming(target.node_id, &target.key)
            .filter_map(|c| self.graph.socket_snapshot(&c.from, PortDirection::Output))
            .collect()
    }

    fn visit(&mut self, pending: Pending, sources: Vec<SocketSnapshot>) -> Result<(), LibraryError> {
        let node_id = pending.target.node_id;
        let Some(entry) = self.graph.get_node_mut(node_id) else {
            // Removed while the pass was queued.
            return Ok(());
        };
        if !entry.core.inputs.contains(&pending.target.key) {
            return Ok(());
        }

        let before: HashMap<String, SocketSnapshot> = entry
            .core
            .outputs
            .iter()
            .map(|p| (p.key.clone(), p.socket.snapshot()))
            .collect();

        let change = ConnectionChange {
            is_connected: pending.is_connected,
            source: pending.source,
            target_port: pending.target.key.clone(),
            sources,
        };
        let behavior = entry.behavior.clone();
        let changed = behavior.on_connection_changed_schema(&mut entry.core, &change)?;
        self.report.visited.push(pending.target);

        let removed = self.remove_dangling(node_id, &before);
        self.report.removed_connections.extend(removed);
        self.enqueue_downstream(node_id, &changed);
        Ok(())
    }

    /// Drop connections bound to ports the node no longer has. Downstream
    /// inputs that lost a source are queued as disconnections.
    fn remove_dangling(
        &mut self,
        node_id: Uuid,
        outputs_before: &HashMap<String, SocketSnapshot>,
    ) -> Vec<Connection> {
        let mut removed = Vec::new();
        for conn in self.graph.dangling_connections(node_id) {
            if self.graph.remove_connection(conn.id).is_none() {
                continue;
            }
            debug!(
                "Removed connection {} bound to a removed port of {}",
                conn.id, node_id
            );
            if conn.from.node_id == node_id && conn.to.node_id != node_id {
                if let Some(source) = outputs_before.get(&conn.from.key) {
                    self.queue.push_back(Pending {
                        target: conn.to.clone(),
                        is_connected: false,
                        source: source.clone(),
                    });
                }
            }
            removed.push(conn);
        }
        removed
    }

    fn enqueue_downstream(&mut self, node_id: Uuid, changed: &[String]) {
        for key in changed {
            let Some(source) = self.graph.socket_snapshot(&PortRef::new(node_id, key), PortDirection::Output) else {
                continue;
            };
            self.report.changed_outputs.push(PortRef::new(node_id, key));
            let targets: Vec<PortRef> = self
                .graph
                .outgoing(node_id, key)
                .map(|c| c.to.clone())
                .collect();
            for target in targets {
                self.queue.push_back(Pending {
                    target,
                    is_connected: true,
                    source: source.clone(),
                });
            }
        }
    }

    fn source_snapshot(&self, port: &PortRef) -> Result<SocketSnapshot, LibraryError> {
        self.graph
            .socket_snapshot(port, PortDirection::Output)
            .ok_or_else(|| LibraryError::port_not_found(port.node_id, &port.key))
    }
}

/// Run a sequence of passes and merge their reports.
pub(crate) fn merge_reports(reports: impl IntoIterator<Item = PropagationReport>) -> PropagationReport {
    let mut merged = PropagationReport::default();
    for report in reports {
        merged.merge(report);
    }
    merged
}
