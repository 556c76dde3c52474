//! Node identifiers and the reserved id layout of the arena.
//!
//! Ids are dense `u32` slot numbers. Id 0 never names a node, ids below
//! [`NodeId::FIRST`] are reserved for bookkeeping nodes placed explicitly
//! during deserialization, and the root always lives at [`NodeId::ROOT`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Slot number of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The reserved invalid id, also used as the node stream terminator.
    pub const INVALID: NodeId = NodeId(0);

    /// First id the allocator may hand out.
    pub const FIRST: NodeId = NodeId(100);

    /// The root node.
    pub const ROOT: NodeId = NodeId::FIRST;

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_valid(self) -> bool {
        self != NodeId::INVALID
    }

    /// True for ids in the bookkeeping range below [`NodeId::FIRST`].
    pub fn is_reserved(self) -> bool {
        self.0 > 0 && self < NodeId::FIRST
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        NodeId(raw)
    }
}
