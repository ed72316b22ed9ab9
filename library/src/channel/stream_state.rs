use log::{debug, warn};

use super::ChannelMessage;
use crate::model::value::Value;

/// Where a streaming operation is in its protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamState {
    Idle,
    Started,
    Progress(f64),
    Streaming,
    Finished,
    Failed(String),
    Aborted,
    Closed,
}

impl StreamState {
    /// No further inbound message is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Finished | StreamState::Failed(_) | StreamState::Aborted | StreamState::Closed
        )
    }
}

/// Accumulated state of one operation, driven by inbound messages.
#[derive(Debug)]
pub struct StreamSession {
    state: StreamState,
    /// State reached before `close()`.
    outcome: Option<StreamState>,
    text: String,
    result: Option<Value>,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            state: StreamState::Idle,
            outcome: None,
            text: String::new(),
            result: None,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Final state before the session was closed, or the current state.
    pub fn outcome(&self) -> &StreamState {
        self.outcome.as_ref().unwrap_or(&self.state)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `finish` payload, or the streamed text when the operation sent none.
    pub fn result(&self) -> Value {
        match &self.result {
            Some(result) => result.clone(),
            None => Value::from(self.text.clone()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply an inbound message. Returns whether it was accepted; messages
    /// that make no sense in the current state are ignored.
    pub fn apply(&mut self, message: &ChannelMessage) -> bool {
        use StreamState as S;

        let next = match (&self.state, message) {
            (S::Closed, _) => None,
            (_, ChannelMessage::Request { .. }) => None,
            (s, ChannelMessage::Error { message }) if !s.is_terminal() => {
                Some(S::Failed(message.clone()))
            }
            (s, ChannelMessage::Abort) if !s.is_terminal() => Some(S::Aborted),
            (S::Idle, ChannelMessage::Start) => Some(S::Started),
            (S::Started | S::Progress(_), ChannelMessage::Progress { value }) => {
                Some(S::Progress(*value))
            }
            (S::Started | S::Progress(_) | S::Streaming, ChannelMessage::Stream { delta }) => {
                self.text.push_str(delta);
                Some(S::Streaming)
            }
            // Progress while streaming carries no new text.
            (S::Streaming, ChannelMessage::Progress { .. }) => Some(S::Streaming),
            (S::Started | S::Progress(_) | S::Streaming, ChannelMessage::Finish { result }) => {
                self.result = result.clone();
                Some(S::Finished)
            }
            (S::Started | S::Progress(_) | S::Streaming, ChannelMessage::Done) => Some(S::Finished),
            _ => None,
        };

        match next {
            Some(state) => {
                if state != self.state {
                    debug!("Stream {:?} -> {:?}", self.state, state);
                }
                self.state = state;
                true
            }
            None => {
                warn!("Ignoring {:?} in stream state {:?}", message, self.state);
                false
            }
        }
    }

    /// Local cancellation.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = StreamState::Aborted;
        }
    }

    /// The channel ended without a terminal message.
    pub fn fail(&mut self, message: &str) {
        if !self.state.is_terminal() {
            self.state = StreamState::Failed(message.to_string());
        }
    }

    pub fn close(&mut self) {
        if self.state != StreamState::Closed {
            self.outcome = Some(self.state.clone());
            self.state = StreamState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(s: &str) -> ChannelMessage {
        ChannelMessage::Stream {
            delta: s.to_string(),
        }
    }

    #[test]
    fn test_streaming_happy_path() {
        let mut session = StreamSession::new();
        assert!(session.apply(&ChannelMessage::Start));
        assert!(session.apply(&ChannelMessage::Progress { value: 0.5 }));
        assert_eq!(session.state(), &StreamState::Progress(0.5));
        assert!(session.apply(&stream("a")));
        assert!(session.apply(&stream("b")));
        assert!(session.apply(&ChannelMessage::Done));
        assert!(session.is_terminal());
        assert_eq!(session.text(), "ab");
        assert_eq!(session.result(), Value::from("ab"));

        session.close();
        assert_eq!(session.state(), &StreamState::Closed);
        assert_eq!(session.outcome(), &StreamState::Finished);
    }

    #[test]
    fn test_out_of_order_messages_are_ignored() {
        let mut session = StreamSession::new();
        assert!(!session.apply(&stream("early")));
        assert!(!session.apply(&ChannelMessage::Done));
        assert_eq!(session.state(), &StreamState::Idle);

        session.apply(&ChannelMessage::Start);
        session.apply(&ChannelMessage::Finish {
            result: Some(Value::from(1i64)),
        });
        assert!(!session.apply(&stream("late")));
        assert_eq!(session.result(), Value::from(1i64));
    }

    #[test]
    fn test_error_and_abort_are_terminal() {
        let mut failed = StreamSession::new();
        failed.apply(&ChannelMessage::Start);
        failed.apply(&ChannelMessage::Error {
            message: "quota".to_string(),
        });
        assert_eq!(failed.state(), &StreamState::Failed("quota".to_string()));
        assert!(!failed.apply(&ChannelMessage::Abort));

        let mut aborted = StreamSession::new();
        aborted.abort();
        assert_eq!(aborted.state(), &StreamState::Aborted);
        aborted.fail("too late");
        assert_eq!(aborted.state(), &StreamState::Aborted);
    }
}
