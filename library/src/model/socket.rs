//! Typed connection endpoints.

use std::fmt;

use tokio::sync::watch;

use super::schema::StructuralType;
use crate::error::LibraryError;

/// Exec sockets carry control flow only; data sockets carry a schema.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketKind {
    Exec,
    Data(StructuralType),
}

/// Point-in-time view of a socket, as published to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct SocketSnapshot {
    pub name: String,
    pub kind: SocketKind,
    /// Bumped on every effective schema change.
    pub revision: u64,
}

impl SocketSnapshot {
    pub fn is_exec(&self) -> bool {
        matches!(self.kind, SocketKind::Exec)
    }

    pub fn schema(&self) -> Option<&StructuralType> {
        match &self.kind {
            SocketKind::Data(schema) => Some(schema),
            SocketKind::Exec => None,
        }
    }

    /// Whether a connection from `self` (an output) into `target` (an input) is allowed.
    pub fn is_compatible_with(&self, target: &SocketSnapshot) -> bool {
        match (&self.kind, &target.kind) {
            (SocketKind::Exec, SocketKind::Exec) => true,
            (SocketKind::Data(source), SocketKind::Data(wanted)) => {
                wanted.is_any() || source.is_subtype_of(wanted)
            }
            _ => false,
        }
    }
}

/// A socket whose schema can be replaced after construction.
///
/// The socket object stays the same across re-typing; listeners obtained from
/// [`TypedSocket::subscribe`] observe every change.
pub struct TypedSocket {
    sender: watch::Sender<SocketSnapshot>,
}

impl TypedSocket {
    pub fn new(name: &str, kind: SocketKind) -> Self {
        let (sender, _) = watch::channel(SocketSnapshot {
            name: name.to_string(),
            kind,
            revision: 0,
        });
        Self { sender }
    }

    pub fn exec(name: &str) -> Self {
        Self::new(name, SocketKind::Exec)
    }

    pub fn data(name: &str, schema: StructuralType) -> Self {
        Self::new(name, SocketKind::Data(schema))
    }

    pub fn any(name: &str) -> Self {
        Self::data(name, StructuralType::Any)
    }

    pub fn name(&self) -> String {
        self.sender.borrow().name.clone()
    }

    pub fn kind(&self) -> SocketKind {
        self.sender.borrow().kind.clone()
    }

    pub fn is_exec(&self) -> bool {
        self.sender.borrow().is_exec()
    }

    pub fn schema(&self) -> Option<StructuralType> {
        self.sender.borrow().schema().cloned()
    }

    pub fn snapshot(&self) -> SocketSnapshot {
        self.sender.borrow().clone()
    }

    /// Replace the socket's name and schema. Returns whether anything changed;
    /// subscribers are only notified on an effective change.
    pub fn set_schema(&self, name: &str, schema: StructuralType) -> Result<bool, LibraryError> {
        if self.is_exec() {
            return Err(LibraryError::invalid(format!(
                "Cannot assign schema {} to exec socket '{}'",
                schema,
                self.name()
            )));
        }
        Ok(self.sender.send_if_modified(|snapshot| {
            let new_kind = SocketKind::Data(schema);
            if snapshot.name == name && snapshot.kind == new_kind {
                return false;
            }
            snapshot.name = name.to_string();
            snapshot.kind = new_kind;
            snapshot.revision += 1;
            true
        }))
    }

    pub fn subscribe(&self) -> watch::Receiver<SocketSnapshot> {
        self.sender.subscribe()
    }

    pub fn is_compatible_with(&self, target: &TypedSocket) -> bool {
        self.snapshot().is_compatible_with(&target.snapshot())
    }
}

impl fmt::Debug for TypedSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.sender.borrow();
        f.debug_struct("TypedSocket")
            .field("name", &snapshot.name)
            .field("kind", &snapshot.kind)
            .field("revision", &snapshot.revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_only_matches_exec() {
        let exec = TypedSocket::exec("exec");
        let data = TypedSocket::any("value");
        assert!(exec.is_compatible_with(&TypedSocket::exec("in")));
        assert!(!exec.is_compatible_with(&data));
        assert!(!data.is_compatible_with(&exec));
    }

    #[test]
    fn test_any_target_accepts_data() {
        let text = TypedSocket::data("text", StructuralType::string());
        assert!(text.is_compatible_with(&TypedSocket::any("value")));
        assert!(!TypedSocket::any("value").is_compatible_with(&text));
    }

    #[test]
    fn test_set_schema_notifies_only_on_change() {
        let socket = TypedSocket::any("value");
        let mut rx = socket.subscribe();
        assert!(!rx.has_changed().unwrap());

        assert!(socket.set_schema("value", StructuralType::string()).unwrap());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().revision, 1);

        assert!(!socket.set_schema("value", StructuralType::string()).unwrap());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(socket.schema(), Some(StructuralType::string()));
    }

    #[test]
    fn test_set_schema_rejects_exec() {
        let socket = TypedSocket::exec("exec");
        assert!(socket.set_schema("exec", StructuralType::string()).is_err());
    }
}
