//! Error Types
//!
//! Every fallible engine operation returns [`Result`]. Structural misuse
//! (bad connect/disconnect calls, unknown nodes or ports) is reported before
//! the graph is touched, so a failed call leaves the graph unchanged.
//!
//! Compute callbacks use the separate [`ComputeError`] type so that `?` works
//! on any error they encounter, including the engine's own [`Error`].

use std::fmt;

use thiserror::Error;

use crate::graph::{PortRef, UniqueId};

/// Errors produced by graph operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The input port already has a source connection.
    #[error("input port {input} is already connected")]
    AlreadyConnected {
        /// The input port that already has a source.
        input: PortRef,
    },

    /// Connecting would make the output depend on itself.
    #[error("connecting {output} to {input} would create a cyclic dependency")]
    CyclicDependency {
        /// The output side of the rejected connection.
        output: PortRef,
        /// The input side of the rejected connection.
        input: PortRef,
    },

    /// The value types of two ports (or a port and a value) do not agree.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The type required by the port.
        expected: String,
        /// The type that was offered.
        found: String,
    },

    /// Both ends of a connection must live in the same network.
    #[error("cannot connect {output} to {input}: ports belong to different networks")]
    CrossNetworkConnection {
        /// The output side of the rejected connection.
        output: PortRef,
        /// The input side of the rejected connection.
        input: PortRef,
    },

    /// An input was used where an output was required, or vice versa.
    #[error("port {port} has the wrong direction for this operation")]
    InvalidDirection {
        /// The offending port.
        port: PortRef,
    },

    /// The connection to remove does not exist.
    #[error("{output} is not connected to {input}")]
    NotConnected {
        /// The output side of the missing connection.
        output: PortRef,
        /// The input side of the missing connection.
        input: PortRef,
    },

    /// A void port was read or written before any connection resolved its type.
    #[error("port {port} is untyped and unconnected")]
    UnconnectedUntypedRead {
        /// The untyped port.
        port: PortRef,
    },

    /// A compute callback failed and no default value could replace its output.
    #[error("compute of node {node} failed: {message}")]
    ComputeFailure {
        /// The node whose compute failed.
        node: UniqueId,
        /// The failure message.
        message: String,
    },

    /// No node with this id exists in the graph.
    #[error("node {0} not found")]
    NodeNotFound(UniqueId),

    /// The node has no port with this name or index.
    #[error("node {node} has no port {port}")]
    PortNotFound {
        /// The node that was searched.
        node: UniqueId,
        /// The requested port name or index.
        port: String,
    },

    /// The node is not a network.
    #[error("node {0} is not a network")]
    NotANetwork(UniqueId),

    /// No metadata is registered under this type name.
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    /// No data type is registered under this name.
    #[error("unknown data type '{0}'")]
    UnknownDataType(String),

    /// A node or boundary attribute with this name already exists.
    #[error("name '{0}' is already taken")]
    DuplicateName(String),

    /// A node id is already in use.
    #[error("node id {0} is already in use")]
    DuplicateId(UniqueId),

    /// A supplied datablock does not fit the node's metadata.
    #[error("datablock has {found} slots, metadata declares {expected}")]
    DatablockMismatch {
        /// Number of attributes declared by the metadata.
        expected: usize,
        /// Number of slots in the supplied datablock.
        found: usize,
    },

    /// The root network cannot be removed.
    #[error("the root network cannot be removed")]
    RootRemoval,

    /// A pull recursed deeper than the configured limit.
    #[error("evaluation exceeded the maximum depth of {0}")]
    EvaluationTooDeep(usize),

    /// A value or document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Failure reported by a compute callback.
///
/// Converts from any [`std::error::Error`], so callbacks can use `?` freely.
/// It deliberately does not implement `std::error::Error` itself, which keeps
/// the blanket conversion coherent.
pub struct ComputeError {
    message: String,
}

impl ComputeError {
    /// Create an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E> From<E> for ComputeError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

impl fmt::Debug for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComputeError").field(&self.message).finish()
    }
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
