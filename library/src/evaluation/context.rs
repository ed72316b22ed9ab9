//! Values and contexts handed to node behaviour during evaluation.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dataflow::DataflowEngine;
use crate::error::LibraryError;
use crate::model::graph::write_graph;
use crate::model::node::{NodeCore, NodeStatus, StatusHandle};
use crate::model::propagation::{PropagationReport, SchemaPropagator};
use crate::model::value::Value;

/// Resolved inputs of one node: every requested key maps to the values of all
/// connected upstream outputs, in connection order. Unconnected keys map to an
/// empty list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputValues {
    values: BTreeMap<String, Vec<Value>>,
    controls: BTreeMap<String, Value>,
}

impl InputValues {
    pub fn new(values: BTreeMap<String, Vec<Value>>, controls: BTreeMap<String, Value>) -> Self {
        Self { values, controls }
    }

    pub fn get(&self, key: &str) -> &[Value] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First connected value ("first wins" for singular inputs).
    pub fn first(&self, key: &str) -> Option<&Value> {
        self.get(key).first()
    }

    /// First connected value, falling back to the control of the same key.
    pub fn first_or_control(&self, key: &str) -> Option<Value> {
        self.first(key).or_else(|| self.controls.get(key)).cloned()
    }

    pub fn control(&self, key: &str) -> Option<&Value> {
        self.controls.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

/// Output values of one node keyed by output port.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputValues(BTreeMap<String, Value>);

impl OutputValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Exec outputs along which control continues, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forward(Vec<String>);

impl Forward {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn output(key: &str) -> Self {
        Self(vec![key.to_string()])
    }

    pub fn and(mut self, key: &str) -> Self {
        self.0.push(key.to_string());
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Context for one `data()` evaluation.
pub struct DataContext<'a> {
    engine: &'a DataflowEngine,
    node_id: Uuid,
    status: StatusHandle,
}

impl<'a> DataContext<'a> {
    pub(crate) fn new(engine: &'a DataflowEngine, node_id: Uuid, status: StatusHandle) -> Self {
        Self {
            engine,
            node_id,
            status,
        }
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Resolve this node's inputs. `None` fetches every data input.
    pub async fn fetch_inputs(&self, keys: Option<&[&str]>) -> Result<InputValues, LibraryError> {
        let keys = keys.map(|k| k.iter().map(|s| s.to_string()).collect());
        self.engine.fetch_inputs(self.node_id, keys).await
    }

    pub fn status(&self) -> NodeStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: NodeStatus) {
        self.status.change(status);
    }

    /// Mutate this node's ports mid-evaluation. The closure returns the keys of
    /// outputs whose schema changed; those changes are propagated downstream.
    pub fn update_core<F>(&self, f: F) -> Result<PropagationReport, LibraryError>
    where
        F: FnOnce(&mut NodeCore) -> Result<Vec<String>, LibraryError>,
    {
        let mut graph = write_graph(self.engine.graph())?;
        let changed = {
            let entry = graph
                .get_node_mut(self.node_id)
                .ok_or(LibraryError::NodeNotFound(self.node_id))?;
            f(&mut entry.core)?
        };
        SchemaPropagator::new(&mut graph).propagate_outputs(self.node_id, changed)
    }
}

/// Context for one `execute()` call.
pub struct ExecContext<'a> {
    engine: &'a DataflowEngine,
    node_id: Uuid,
    status: StatusHandle,
    cancel: CancellationToken,
    controls: BTreeMap<String, Value>,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(
        engine: &'a DataflowEngine,
        node_id: Uuid,
        status: StatusHandle,
        cancel: CancellationToken,
        controls: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            engine,
            node_id,
            status,
            cancel,
            controls,
        }
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    pub async fn fetch_inputs(&self, keys: Option<&[&str]>) -> Result<InputValues, LibraryError> {
        let keys = keys.map(|k| k.iter().map(|s| s.to_string()).collect());
        self.engine.fetch_inputs(self.node_id, keys).await
    }

    pub fn status(&self) -> NodeStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: NodeStatus) {
        self.status.change(status);
    }

    /// Fires when the node is re-triggered with [`crate::plugin::Retrigger::Cancel`]
    /// or removed from the graph.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Control value as of the start of this execution.
    pub fn control(&self, key: &str) -> Option<&Value> {
        self.controls.get(key)
    }
}
