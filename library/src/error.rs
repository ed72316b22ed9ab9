use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),
    #[error("Node not found: {0}")]
    NodeNotFound(Uuid),
    #[error("Port '{port}' not found on node {node}")]
    PortNotFound { node: Uuid, port: String },
    #[error("Connection not found: {0}")]
    ConnectionNotFound(Uuid),
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("Evaluation error: {0}")]
    Evaluation(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Channel error: {0}")]
    Channel(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl LibraryError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        LibraryError::ConnectionRejected(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        LibraryError::Evaluation(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        LibraryError::Execution(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        LibraryError::Channel(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        LibraryError::InvalidArgument(msg.into())
    }

    pub fn port_not_found(node: Uuid, port: &str) -> Self {
        LibraryError::PortNotFound {
            node,
            port: port.to_string(),
        }
    }

    /// Whether the failure only affects a single node or connection and
    /// can be skipped while loading a document.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LibraryError::ConnectionRejected(_)
                | LibraryError::NodeNotFound(_)
                | LibraryError::PortNotFound { .. }
                | LibraryError::UnknownNodeType(_)
        )
    }
}
