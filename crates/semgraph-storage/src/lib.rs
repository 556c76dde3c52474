//! Persistence for semgraph graphs.
//!
//! A graph is saved as one self-describing container: a magic tag, header
//! blocks (the schema identity plus caller data), the node stream and the
//! string table, optionally wrapped in snappy framing.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`header`]: header blocks and the schema identity check
//! - [`codec`]: stream save and load
//! - [`file`]: file entry points and the directory-backed [`FileStore`]
//! - [`traits`]: GraphStore trait definition
//! - [`memory`]: InMemoryStore implementation

pub mod codec;
pub mod error;
pub mod file;
pub mod header;
pub mod memory;
pub mod traits;

// Re-export key types for ergonomic use.
pub use codec::{load_from, read_header, save_to, MAGIC_PLAIN, MAGIC_ZIPPED, MAX_NODE_ID};
pub use error::StorageError;
pub use file::{load_file, load_file_at, load_header, save_file, save_file_at, FileStore};
pub use header::{Header, HeaderData, SchemaIdentity, SCHEMA_IDENTITY};
pub use memory::InMemoryStore;
pub use traits::GraphStore;
