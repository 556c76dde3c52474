//! Storage error types for semgraph-storage.
//!
//! [`StorageError`] covers container negotiation (magic tag, schema
//! identity, header blocks), node stream decoding and the underlying I/O.

use thiserror::Error;

use semgraph_core::CoreError;

/// Errors produced by save and load operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An arena operation failed while restoring nodes.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Open, read, write or close of the underlying stream failed.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not start with a graph container tag.
    #[error("missing file type information")]
    MissingFileTypeInfo,

    /// The file was written for another language schema.
    #[error("wrong file type: expected '{expected}', found '{found}'")]
    WrongFileType { expected: String, found: String },

    /// The schema identity block is absent or incomplete.
    #[error("missing version information")]
    MissingVersionInfo,

    /// The file was written by another API or binary format version.
    #[error("wrong {field} version: expected '{expected}', found '{found}'")]
    WrongVersion {
        field: &'static str,
        expected: String,
        found: String,
    },

    /// A header block of this kind is already present.
    #[error("header data already loaded: block kind {kind}")]
    HeaderDataAlreadyLoaded { kind: u16 },

    /// The block kind is reserved for the codec itself.
    #[error("header block kind {kind} is reserved")]
    ReservedHeaderBlock { kind: u16 },

    /// A node kind code has no variant in the running schema.
    #[error("invalid node kind: {code}")]
    InvalidNodeKind { code: u16 },

    /// A relation kind code has no variant in the running schema.
    #[error("invalid edge kind: {code}")]
    InvalidEdgeKind { code: u16 },

    /// An attribute kind code has no variant in the running schema.
    #[error("invalid attribute kind: {code}")]
    InvalidAttrKind { code: u16 },

    /// The stream is structurally broken.
    #[error("corrupt graph stream: {reason}")]
    Corrupt { reason: String },

    /// No graph is stored under this name.
    #[error("graph not found: '{name}'")]
    GraphNotFound { name: String },
}
