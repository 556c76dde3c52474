//! Generic in-memory container for abstract semantic graphs.
//!
//! A language describes its node, relation and attribute kinds through
//! [`Schema`]; [`Factory`] then provides the id-addressed arena with id
//! reuse, the filter overlay, the reverse-edge index and string interning.
//! [`Preorder`] walks the graph with a [`Visitor`].
//!
//! # Modules
//!
//! - [`id`]: NodeId and the reserved id layout
//! - [`schema`]: Schema and kind traits
//! - [`node`]: Node and attribute values
//! - [`arena`]: slot storage with FIFO id reuse
//! - [`filter`]: visibility overlay and the scoped off-switch
//! - [`reverse`]: reverse-edge index and edge selectors
//! - [`traversal`]: preorder walk and visitor callbacks
//! - [`factory`]: graph owner coordinating all of the above
//! - [`strtable`]: string interning
//! - [`io`]: little-endian stream primitives
//! - [`stat`]: population statistics
//! - [`export`]: petgraph export and DOT output
//! - [`minipy`]: a compact demo schema

pub mod arena;
pub mod error;
pub mod export;
pub mod factory;
pub mod filter;
pub mod id;
pub mod io;
pub mod minipy;
pub mod node;
pub mod reverse;
pub mod schema;
pub mod stat;
pub mod strtable;
pub mod traversal;

// Re-export commonly used types
pub use error::CoreError;
pub use factory::{Factory, NodeObserver, ObserverId};
pub use filter::{FilterState, TurnFilterOffSafely};
pub use id::NodeId;
pub use node::{Node, Value};
pub use reverse::{EdgeSelector, ReverseEdges};
pub use schema::{AttrKind, EdgeKind, Kind, NodeKind, Schema};
pub use stat::AsgStat;
pub use strtable::{Key, KeyMap, StringTable};
pub use traversal::{Preorder, RunState, VisitContext, VisitFlow, Visitor};
