//! Graph persistence: the JSON document format, conversion to and from a
//! live graph, and id remapping for paste.

pub mod document;
pub mod paste;
pub mod serializer;

pub use document::{ConnectionDocument, GraphDocument, NodeDocument};
pub use paste::{bounding_origin, remap_for_paste};
pub use serializer::{LoadReport, deserialize_into, serialize_graph, serialize_selection};

/// Version written into new documents.
pub const DOCUMENT_VERSION: &str = "1.0";
