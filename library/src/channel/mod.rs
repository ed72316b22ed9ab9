//! Bidirectional message channels to long-running external operations.

mod stream_state;

pub use stream_state::{StreamSession, StreamState};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::LibraryError;
use crate::model::value::Value;

/// One message of the operation protocol.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelMessage {
    /// Outbound request parameters.
    Request { params: Value },
    Start,
    Progress { value: f64 },
    /// A chunk of streamed text.
    #[serde(alias = "delta")]
    Stream { delta: String },
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    Done,
    Error { message: String },
    Abort,
}

/// One side of a channel pair.
pub struct ChannelEndpoint {
    tx: Option<mpsc::Sender<ChannelMessage>>,
    rx: mpsc::Receiver<ChannelMessage>,
}

/// Two connected endpoints; what one sends the other receives.
pub fn channel_pair(capacity: usize) -> (ChannelEndpoint, ChannelEndpoint) {
    let capacity = capacity.max(1);
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    (
        ChannelEndpoint {
            tx: Some(a_tx),
            rx: a_rx,
        },
        ChannelEndpoint {
            tx: Some(b_tx),
            rx: b_rx,
        },
    )
}

impl ChannelEndpoint {
    pub async fn send(&self, message: ChannelMessage) -> Result<(), LibraryError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| LibraryError::channel("Endpoint is closed"))?;
        tx.send(message)
            .await
            .map_err(|e| LibraryError::channel(format!("Peer closed, dropped {:?}", e.0)))
    }

    /// Next inbound message, or `None` once the peer has closed and every
    /// buffered message has been received.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        self.rx.recv().await
    }

    /// Stop sending and receiving. Idempotent.
    pub fn close(&mut self) {
        if self.tx.take().is_some() {
            debug!("Channel endpoint closed");
        }
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

impl Drop for ChannelEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens channels to named external operations.
#[async_trait]
pub trait OperationTransport: Send + Sync {
    async fn open(&self, operation: &str) -> Result<ChannelEndpoint, LibraryError>;
}

pub type OperationHandler = Arc<dyn Fn(ChannelEndpoint) -> BoxFuture<'static, ()> + Send + Sync>;

/// In-process transport: each operation is a handler spawned on the tokio
/// runtime with the remote endpoint.
pub struct LocalTransport {
    capacity: usize,
    handlers: RwLock<HashMap<String, OperationHandler>>,
}

impl LocalTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Transport with the built-in `echo` operation registered.
    pub fn with_echo(capacity: usize) -> Self {
        let transport = Self::new(capacity);
        transport.register("echo", echo_operation);
        transport
    }

    pub fn register<F, Fut>(&self, operation: &str, handler: F)
    where
        F: Fn(ChannelEndpoint) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: OperationHandler = Arc::new(move |endpoint| handler(endpoint).boxed());
        match self.handlers.write() {
            Ok(mut handlers) => {
                handlers.insert(operation.to_string(), handler);
            }
            Err(_) => warn!("Transport lock poisoned, dropping operation {}", operation),
        }
    }

    pub fn operations(&self) -> Vec<String> {
        let mut ops: Vec<String> = self
            .handlers
            .read()
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default();
        ops.sort();
        ops
    }
}

#[async_trait]
impl OperationTransport for LocalTransport {
    async fn open(&self, operation: &str) -> Result<ChannelEndpoint, LibraryError> {
        let handler = self
            .handlers
            .read()
            .map_err(|_| LibraryError::Runtime("Lock Poisoned".to_string()))?
            .get(operation)
            .cloned()
            .ok_or_else(|| LibraryError::channel(format!("Unknown operation: {}", operation)))?;
        let (local, remote) = channel_pair(self.capacity);
        tokio::spawn(handler(remote));
        debug!("Opened local channel for {}", operation);
        Ok(local)
    }
}

/// Streams the request's `prompt` back word by word, then finishes with the
/// whole prompt as the result.
pub async fn echo_operation(mut endpoint: ChannelEndpoint) {
    let params = loop {
        match endpoint.recv().await {
            Some(ChannelMessage::Request { params }) => break params,
            Some(ChannelMessage::Abort) | None => return,
            Some(other) => debug!("echo ignoring {:?} before request", other),
        }
    };
    let prompt = params
        .as_object()
        .and_then(|p| p.get("prompt"))
        .map(|p| p.to_string())
        .unwrap_or_default();

    if endpoint.send(ChannelMessage::Start).await.is_err() {
        return;
    }
    let words: Vec<&str> = prompt.split_inclusive(' ').collect();
    for (i, word) in words.iter().enumerate() {
        let progress = ChannelMessage::Progress {
            value: (i + 1) as f64 / words.len() as f64,
        };
        let delta = ChannelMessage::Stream {
            delta: word.to_string(),
        };
        if endpoint.send(progress).await.is_err() || endpoint.send(delta).await.is_err() {
            return;
        }
    }
    let finish = ChannelMessage::Finish {
        result: Some(Value::from(prompt)),
    };
    if endpoint.send(finish).await.is_ok() {
        let _ = endpoint.send(ChannelMessage::Done).await;
    }
    endpoint.close();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(ChannelMessage::Stream {
            delta: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "stream", "delta": "hi"}));

        let alias: ChannelMessage =
            serde_json::from_value(serde_json::json!({"type": "delta", "delta": "x"})).unwrap();
        assert_eq!(alias, ChannelMessage::Stream { delta: "x".to_string() });

        let finish: ChannelMessage = serde_json::from_str(r#"{"type":"finish"}"#).unwrap();
        assert_eq!(finish, ChannelMessage::Finish { result: None });

        let abort = serde_json::to_string(&ChannelMessage::Abort).unwrap();
        assert_eq!(abort, r#"{"type":"abort"}"#);
    }

    #[tokio::test]
    async fn test_close_is_seen_by_peer() {
        let (mut a, mut b) = channel_pair(4);
        a.send(ChannelMessage::Start).await.unwrap();
        a.close();
        assert!(a.is_closed());
        assert_eq!(b.recv().await, Some(ChannelMessage::Start));
        assert_eq!(b.recv().await, None);
        assert!(b.send(ChannelMessage::Done).await.is_err());
    }

    #[tokio::test]
    async fn test_echo_streams_prompt() {
        let transport = LocalTransport::with_echo(8);
        let mut endpoint = transport.open("echo").await.unwrap();
        let mut params = std::collections::BTreeMap::new();
        params.insert("prompt".to_string(), Value::from("hello big world"));
        endpoint
            .send(ChannelMessage::Request {
                params: Value::Object(params),
            })
            .await
            .unwrap();

        let mut text = String::new();
        let mut result = None;
        while let Some(msg) = endpoint.recv().await {
            match msg {
                ChannelMessage::Stream { delta } => text.push_str(&delta),
                ChannelMessage::Finish { result: r } => result = r,
                ChannelMessage::Done => break,
                _ => {}
            }
        }
        assert_eq!(text, "hello big world");
        assert_eq!(result, Some(Value::from("hello big world")));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let transport = LocalTransport::new(4);
        assert!(matches!(
            transport.open("missing").await,
            Err(LibraryError::Channel(_))
        ));
    }
}
