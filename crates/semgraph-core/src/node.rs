//! Graph nodes: a kind tag, an ordered relation list and a small attribute
//! list.
//!
//! Nodes never embed other nodes. Every relation is a `(edge kind, NodeId)`
//! pair resolved through the arena at access time; owning (tree) relations
//! additionally set the target's parent link.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::NodeId;
use crate::schema::{EdgeKind, Schema};
use crate::strtable::{Key, KeyMap};

/// Attribute payload. Text is stored as a string-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(Key),
}

impl Value {
    /// Wire tag used by the node stream.
    pub fn tag(self) -> u8 {
        match self {
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Str(_) => 3,
        }
    }
}

/// A node of a graph over schema `S`.
pub struct Node<S: Schema> {
    id: NodeId,
    kind: S::Kind,
    parent: Option<(NodeId, S::Edge)>,
    edges: SmallVec<[(S::Edge, NodeId); 4]>,
    attrs: SmallVec<[(S::Attr, Value); 4]>,
}

impl<S: Schema> Node<S> {
    pub(crate) fn new(id: NodeId, kind: S::Kind) -> Self {
        Node {
            id,
            kind,
            parent: None,
            edges: SmallVec::new(),
            attrs: SmallVec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> S::Kind {
        self.kind
    }

    /// Owner of this node, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent.map(|(id, _)| id)
    }

    /// The owning relation through which the parent holds this node.
    pub fn parent_edge(&self) -> Option<S::Edge> {
        self.parent.map(|(_, edge)| edge)
    }

    /// Every outgoing relation in insertion order.
    pub fn edges(&self) -> &[(S::Edge, NodeId)] {
        &self.edges
    }

    /// Targets of one relation kind.
    pub fn targets(&self, edge: S::Edge) -> impl Iterator<Item = NodeId> + '_ {
        self.edges
            .iter()
            .filter(move |(e, _)| *e == edge)
            .map(|(_, target)| *target)
    }

    /// Owned children through tree relations.
    pub fn children(&self) -> impl Iterator<Item = (S::Edge, NodeId)> + '_ {
        self.edges.iter().copied().filter(|(e, _)| e.is_tree())
    }

    pub fn attrs(&self) -> &[(S::Attr, Value)] {
        &self.attrs
    }

    pub fn attr(&self, attr: S::Attr) -> Option<Value> {
        self.attrs
            .iter()
            .find(|(a, _)| *a == attr)
            .map(|(_, value)| *value)
    }

    pub fn int_attr(&self, attr: S::Attr) -> Option<i64> {
        match self.attr(attr) {
            Some(Value::Int(v)) => Some(v),
            _ => None,
        }
    }

    pub fn bool_attr(&self, attr: S::Attr) -> Option<bool> {
        match self.attr(attr) {
            Some(Value::Bool(v)) => Some(v),
            _ => None,
        }
    }

    pub fn key_attr(&self, attr: S::Attr) -> Option<Key> {
        match self.attr(attr) {
            Some(Value::Str(key)) => Some(key),
            _ => None,
        }
    }

    /// Sets or replaces an attribute.
    pub fn set_attr(&mut self, attr: S::Attr, value: Value) {
        match self.attrs.iter_mut().find(|(a, _)| *a == attr) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((attr, value)),
        }
    }

    pub fn remove_attr(&mut self, attr: S::Attr) -> Option<Value> {
        let pos = self.attrs.iter().position(|(a, _)| *a == attr)?;
        Some(self.attrs.remove(pos).1)
    }

    // -------------------------------------------------------------------
    // Structural mutation, reserved for the factory
    // -------------------------------------------------------------------

    pub(crate) fn push_edge(&mut self, edge: S::Edge, target: NodeId) {
        self.edges.push((edge, target));
    }

    /// Removes the first matching relation.
    pub(crate) fn remove_edge(&mut self, edge: S::Edge, target: NodeId) -> bool {
        match self.edges.iter().position(|&(e, t)| e == edge && t == target) {
            Some(pos) => {
                self.edges.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn retain_edges(&mut self, mut keep: impl FnMut(S::Edge, NodeId) -> bool) {
        self.edges.retain(|(e, t)| keep(*e, *t));
    }

    pub(crate) fn set_parent(&mut self, parent: Option<(NodeId, S::Edge)>) {
        self.parent = parent;
    }

    /// Rewrites string keys. Keys missing from `map` are left alone.
    pub(crate) fn remap_keys(&mut self, map: &KeyMap) {
        for (_, value) in self.attrs.iter_mut() {
            if let Value::Str(key) = value {
                if let Some(new_key) = map.get(key) {
                    *key = *new_key;
                }
            }
        }
    }
}

impl<S: Schema> Clone for Node<S> {
    fn clone(&self) -> Self {
        Node {
            id: self.id,
            kind: self.kind,
            parent: self.parent,
            edges: self.edges.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

impl<S: Schema> fmt::Debug for Node<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("edges", &self.edges)
            .field("attrs", &self.attrs)
            .finish()
    }
}
