//! Core error types for semgraph-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! arena, filter, reverse-edge and traversal failure modes.

use thiserror::Error;

use crate::id::NodeId;

/// Core errors produced by the semgraph-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The id is 0, out of range, or names a hole.
    #[error("invalid node id: NodeId({id})", id = id.0)]
    InvalidNodeId { id: NodeId },

    /// A kind code has no variant in the running schema, or the kind cannot
    /// be created through this entry point.
    #[error("invalid node kind: {code}")]
    InvalidNodeKind { code: u16 },

    /// The node was already destroyed.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A node was placed at an id that is already live.
    #[error("node already exists: NodeId({id})", id = id.0)]
    NodeAlreadyExists { id: NodeId },

    /// The root cannot be destroyed while the graph is live.
    #[error("node is protected: NodeId({id})", id = id.0)]
    ProtectedNode { id: NodeId },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    /// The operation needs the reverse-edge index.
    #[error("reverse edges are disabled")]
    ReverseEdgesDisabled,

    /// A loaded filter does not cover the arena it is applied to.
    #[error("filter size mismatch: arena has {expected} slots, filter has {found}")]
    FilterSizeMismatch { expected: usize, found: usize },

    /// The underlying stream failed.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
