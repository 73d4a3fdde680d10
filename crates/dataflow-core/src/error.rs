use std::error::Error;
use std::fmt;

/// An error that aborts `load`. On any of these, the graph is not
/// partially installed: the engine is left in its previous state (or
/// empty if never loaded).
#[derive(Debug, Clone)]
pub enum LoadError {
    /// The description contains two nodes with the same `id`.
    DuplicateNodeId(String),
    /// An edge, or an edge endpoint, refers to a node or port that was
    /// not declared.
    UnknownReference(UnknownReference),
    /// An edge connects a numeric port to a non-numeric port, or connects
    /// two non-numeric ports of different declared type.
    TypeMismatch {
        src_node: String,
        src_port: String,
        dst_node: String,
        dst_port: String,
    },
    /// The graph contains a cycle.
    CycleDetected,
    /// An input port is the destination of more than one edge: every
    /// input port may carry at most one incoming connection.
    InputPortAlreadyConnected { node: String, port: String },
}

/// Detail for [`LoadError::UnknownReference`].
#[derive(Debug, Clone)]
pub enum UnknownReference {
    Node(String),
    Port { node: String, port: String },
}

impl Error for LoadError {}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNodeId(id) => {
                write!(f, "duplicate node id {:?} in graph description", id)
            }
            Self::UnknownReference(UnknownReference::Node(id)) => {
                write!(f, "edge refers to unknown node {:?}", id)
            }
            Self::UnknownReference(UnknownReference::Port { node, port }) => {
                write!(f, "edge refers to unknown port {:?} on node {:?}", port, node)
            }
            Self::TypeMismatch {
                src_node,
                src_port,
                dst_node,
                dst_port,
            } => {
                write!(
                    f,
                    "type mismatch connecting {}:{} to {}:{}",
                    src_node, src_port, dst_node, dst_port
                )
            }
            Self::CycleDetected => write!(f, "cycle detected in graph description"),
            Self::InputPortAlreadyConnected { node, port } => {
                write!(
                    f,
                    "input port {:?} on node {:?} is already connected",
                    port, node
                )
            }
        }
    }
}
