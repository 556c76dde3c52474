//! Schema traits binding a language's node, edge and attribute kinds to the
//! generic graph container.
//!
//! A language front-end describes itself once through [`Schema`]; the arena,
//! filter, reverse-edge index, traversal and persistence layers are all
//! generic over it. Every kind enum is closed and carries a stable numeric
//! code used by the binary format.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Behavior shared by the node, edge and attribute kind enums.
pub trait Kind: Copy + Eq + Hash + Debug + Display + 'static {
    /// Stable wire code. Never 0.
    fn code(self) -> u16;

    fn from_code(code: u16) -> Option<Self>;

    fn name(self) -> &'static str;

    /// Every variant in declaration order.
    fn all() -> &'static [Self];
}

/// Node kinds of a schema.
pub trait NodeKind: Kind {
    /// Singleton kinds exist at most once per graph and are obtained through
    /// `Factory::singleton`.
    fn is_singleton(self) -> bool {
        false
    }
}

/// Relation kinds of a schema.
pub trait EdgeKind: Kind {
    /// True for owning relations. A node has at most one owner.
    fn is_tree(self) -> bool;
}

/// Attribute kinds of a schema.
pub trait AttrKind: Kind {}

/// A language schema instantiating the graph container.
pub trait Schema: 'static {
    type Kind: NodeKind;
    type Edge: EdgeKind;
    type Attr: AttrKind;

    /// Language name recorded in persisted graphs.
    const LANGUAGE: &'static str;
    const API_VERSION: &'static str;
    const BINARY_VERSION: &'static str;

    /// Kind of the node created at [`NodeId::ROOT`](crate::NodeId::ROOT).
    fn root_kind() -> Self::Kind;

    /// Whether `source -edge-> target` is a well-typed relation.
    fn edge_allowed(_source: Self::Kind, _edge: Self::Edge, _target: Self::Kind) -> bool {
        true
    }
}
