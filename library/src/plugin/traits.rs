//! Core node behaviour trait.

use async_trait::async_trait;

use crate::error::LibraryError;
use crate::evaluation::{DataContext, ExecContext, Forward, InputValues, OutputValues};
use crate::model::node::NodeCore;
use crate::model::schema::StructuralType;
use crate::model::socket::SocketSnapshot;
use crate::model::value::Value;

/// What happens when a node is executed while it is already RUNNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retrigger {
    /// Drop the new trigger.
    #[default]
    Ignore,
    /// Cancel the running operation; the node aborts and returns to IDLE.
    Cancel,
}

/// Connection state change seen by one input port of a node.
#[derive(Debug, Clone)]
pub struct ConnectionChange {
    pub is_connected: bool,
    /// The output socket on the other end of the connection that changed.
    pub source: SocketSnapshot,
    /// Input port key on this node.
    pub target_port: String,
    /// Every output socket still attached to `target_port` after the change.
    pub sources: Vec<SocketSnapshot>,
}

impl ConnectionChange {
    /// Union of the schemas of every attached source, or `None` if the port
    /// is now unconnected.
    pub fn merged_schema(&self) -> Option<StructuralType> {
        if self.sources.is_empty() {
            return None;
        }
        Some(StructuralType::union(
            self.sources.iter().filter_map(|s| s.schema().cloned()),
        ))
    }
}

/// Behaviour of a node type.
///
/// Methods take `&self`; nodes that keep state between calls use interior
/// mutability. The structural part of a node (ports, controls) is passed in
/// as a [`NodeCore`] where a hook may change it.
#[async_trait]
pub trait Node: Send + Sync {
    /// Pure transform from resolved inputs to outputs.
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        _inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        Ok(OutputValues::new())
    }

    /// Entry point used by the dataflow engine. Override when the node must
    /// change its own ports while evaluating.
    async fn data_with_fetch(&self, ctx: &DataContext<'_>) -> Result<OutputValues, LibraryError> {
        let inputs = ctx.fetch_inputs(None).await?;
        self.data(ctx, inputs).await
    }

    /// Side-effecting action triggered through an exec input. Returns the exec
    /// outputs along which control continues.
    async fn execute(
        &self,
        _input: Option<&str>,
        _ctx: &ExecContext<'_>,
    ) -> Result<Forward, LibraryError> {
        Ok(Forward::none())
    }

    /// Re-derive port schemas after a connection change on one of this node's
    /// inputs. Returns the keys of outputs whose schema changed.
    fn on_connection_changed_schema(
        &self,
        _core: &mut NodeCore,
        _change: &ConnectionChange,
    ) -> Result<Vec<String>, LibraryError> {
        Ok(Vec::new())
    }

    /// Rebuild dynamic ports from control state. Called after creation and
    /// again after control values are restored from a document.
    fn setup_schema(&self, _core: &mut NodeCore) -> Result<(), LibraryError> {
        Ok(())
    }

    fn serialize_control_value(&self, core: &NodeCore) -> serde_json::Value {
        serde_json::Value::Object(
            core.control_values()
                .into_iter()
                .map(|(k, v)| (k, v.to_json()))
                .collect(),
        )
    }

    /// Restore control values. Unknown keys are skipped so documents written
    /// by newer node versions still load.
    fn deserialize_control_value(
        &self,
        core: &mut NodeCore,
        data: &serde_json::Value,
    ) -> Result<(), LibraryError> {
        let Some(map) = data.as_object() else {
            if data.is_null() {
                return Ok(());
            }
            return Err(LibraryError::invalid(format!(
                "controlData for {} must be an object",
                core.id
            )));
        };
        for (key, value) in map {
            if core.control_value(key).is_none() {
                log::warn!("Node {} ({}) has no control '{}', skipping", core.id, core.type_id, key);
                continue;
            }
            core.set_control_value(key, Value::from(value))?;
        }
        Ok(())
    }

    fn retrigger(&self) -> Retrigger {
        Retrigger::Ignore
    }
}
