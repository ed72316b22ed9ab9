use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info, warn};

use super::{exec_in, exec_out, inp, node, out};
use crate::channel::{ChannelMessage, OperationTransport, StreamSession, StreamState};
use crate::error::LibraryError;
use crate::evaluation::{DataContext, ExecContext, Forward, InputValues, OutputValues};
use crate::model::control::Control;
use crate::model::node::NodeStatus;
use crate::model::schema::StructuralType;
use crate::model::value::Value;
use crate::plugin::node_types::{NodeCategory, NodeTypeDefinition};
use crate::plugin::traits::{Node, Retrigger};

#[derive(Debug, Clone, Default)]
struct LastRun {
    text: String,
    result: Value,
}

/// Runs a long-running external operation over a message channel.
///
/// Sends `request{params}` with the prompt and params inputs, then follows the
/// inbound protocol until a terminal message. Success forwards `exec`, an
/// operation error forwards `failed` with the node in ERROR. Re-triggering
/// while running cancels: `abort` is sent and the node returns to IDLE.
pub struct RemoteStreamNode {
    transport: Option<Arc<dyn OperationTransport>>,
    last: Mutex<LastRun>,
}

impl RemoteStreamNode {
    pub fn new(transport: Option<Arc<dyn OperationTransport>>) -> Self {
        Self {
            transport,
            last: Mutex::new(LastRun::default()),
        }
    }

    fn fail(&self, ctx: &ExecContext<'_>, message: String) -> Forward {
        warn!("Operation on {} failed: {}", ctx.node_id(), message);
        ctx.set_status(NodeStatus::Error(message));
        Forward::output("failed")
    }
}

#[async_trait]
impl Node for RemoteStreamNode {
    async fn data(
        &self,
        _ctx: &DataContext<'_>,
        _inputs: InputValues,
    ) -> Result<OutputValues, LibraryError> {
        let last = self
            .last
            .lock()
            .map(|l| l.clone())
            .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))?;
        Ok(OutputValues::new()
            .with("text", last.text)
            .with("result", last.result))
    }

    async fn execute(
        &self,
        _input: Option<&str>,
        ctx: &ExecContext<'_>,
    ) -> Result<Forward, LibraryError> {
        ctx.set_status(NodeStatus::Running);

        let Some(transport) = self.transport.clone() else {
            return Ok(self.fail(ctx, "No operation transport configured".to_string()));
        };
        let operation = ctx
            .control("operation")
            .and_then(Value::as_str)
            .unwrap_or("echo")
            .to_string();

        let inputs = ctx.fetch_inputs(Some(&["prompt", "params"])).await?;
        let mut params = BTreeMap::new();
        params.insert(
            "prompt".to_string(),
            inputs.first_or_control("prompt").unwrap_or_default(),
        );
        params.insert(
            "params".to_string(),
            inputs.first("params").cloned().unwrap_or_default(),
        );

        let mut endpoint = match transport.open(&operation).await {
            Ok(endpoint) => endpoint,
            Err(e) => return Ok(self.fail(ctx, e.to_string())),
        };
        info!("Node {} started operation {}", ctx.node_id(), operation);

        let mut session = StreamSession::new();
        let request = ChannelMessage::Request {
            params: Value::Object(params),
        };
        if let Err(e) = endpoint.send(request).await {
            session.fail(&e.to_string());
        }

        while !session.is_terminal() {
            let event = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => None,
                message = endpoint.recv() => Some(message),
            };
            match event {
                None => {
                    debug!("Node {} cancelled, aborting {}", ctx.node_id(), operation);
                    if let Err(e) = endpoint.send(ChannelMessage::Abort).await {
                        debug!("Abort not delivered: {}", e);
                    }
                    session.abort();
                }
                Some(Some(message)) => {
                    session.apply(&message);
                }
                Some(None) => session.fail("Channel closed before the operation finished"),
            }
        }

        endpoint.close();
        session.close();

        match session.outcome().clone() {
            StreamState::Finished => {
                let run = LastRun {
                    text: session.text().to_string(),
                    result: session.result(),
                };
                *self
                    .last
                    .lock()
                    .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))? = run;
                ctx.set_status(NodeStatus::Completed);
                Ok(Forward::output("exec"))
            }
            StreamState::Failed(message) => Ok(self.fail(ctx, message)),
            _ => {
                ctx.set_status(NodeStatus::Idle);
                Ok(Forward::none())
            }
        }
    }

    fn retrigger(&self) -> Retrigger {
        Retrigger::Cancel
    }
}

pub(super) fn remote_nodes() -> Vec<NodeTypeDefinition> {
    vec![
        node("remote.stream", "Remote Stream", NodeCategory::Remote, |deps| {
            RemoteStreamNode::new(deps.transport.clone())
        })
        .with_description("Stream the result of an external operation")
        .with_inputs(vec![
            exec_in("exec", "Exec"),
            inp("prompt", "Prompt", StructuralType::string())
                .with_control(Control::text("prompt", "Prompt", "")),
            inp("params", "Params", StructuralType::Any),
        ])
        .with_outputs(vec![
            exec_out("exec", "Done"),
            exec_out("failed", "Failed"),
            out("text", "Text", StructuralType::string()),
            out("result", "Result", StructuralType::Any),
        ])
        .with_controls(vec![Control::text("operation", "Operation", "echo")]),
    ]
}
