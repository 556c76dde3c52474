//! Reverse-edge index: for each target, the `(edge, source)` pairs pointing
//! at it.
//!
//! Which relations are indexed is decided by an [`EdgeSelector`]. The index
//! is derived data: the factory builds it from the arena on enable and keeps
//! it current through the per-node hooks below.

use std::fmt;

use crate::arena::Arena;
use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::Node;
use crate::schema::Schema;

/// Named function choosing the outgoing relations of a node to index.
///
/// Selectors compare by name.
pub struct EdgeSelector<S: Schema> {
    pub name: &'static str,
    pub select: fn(&Node<S>) -> Vec<(S::Edge, NodeId)>,
}

impl<S: Schema> EdgeSelector<S> {
    pub const fn new(name: &'static str, select: fn(&Node<S>) -> Vec<(S::Edge, NodeId)>) -> Self {
        EdgeSelector { name, select }
    }
}

impl<S: Schema> Clone for EdgeSelector<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Schema> Copy for EdgeSelector<S> {}

impl<S: Schema> PartialEq for EdgeSelector<S> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<S: Schema> Eq for EdgeSelector<S> {}

impl<S: Schema> fmt::Debug for EdgeSelector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EdgeSelector").field(&self.name).finish()
    }
}

type EdgeList<S> = Vec<(<S as Schema>::Edge, NodeId)>;

pub struct ReverseEdges<S: Schema> {
    selector: EdgeSelector<S>,
    // By target id. `None` for ids that are not live.
    incoming: Vec<Option<EdgeList<S>>>,
    // By source id: what the selector yielded when the source was last indexed.
    contributed: Vec<EdgeList<S>>,
}

impl<S: Schema> ReverseEdges<S> {
    pub(crate) fn build(selector: EdgeSelector<S>, arena: &Arena<S>) -> Self {
        let mut index = ReverseEdges {
            selector,
            incoming: Vec::new(),
            contributed: Vec::new(),
        };
        for node in arena.iter() {
            *index.slot_mut(node.id()) = Some(Vec::new());
        }
        for node in arena.iter() {
            index.reindex_node(node);
        }
        index
    }

    pub fn selector(&self) -> EdgeSelector<S> {
        self.selector
    }

    /// Incoming relations of a live node, in insertion order.
    pub fn incoming(&self, id: NodeId) -> Result<&[(S::Edge, NodeId)], CoreError> {
        match self.incoming.get(id.index()) {
            Some(Some(list)) => Ok(list),
            _ => Err(CoreError::InvalidNodeId { id }),
        }
    }

    /// Total number of indexed relations.
    pub fn entry_count(&self) -> usize {
        self.incoming.iter().flatten().map(Vec::len).sum()
    }

    // -------------------------------------------------------------------
    // Maintenance hooks
    // -------------------------------------------------------------------

    pub(crate) fn insert_node(&mut self, node: &Node<S>) {
        let slot = self.slot_mut(node.id());
        if slot.is_none() {
            *slot = Some(Vec::new());
        }
        self.reindex_node(node);
    }

    /// Drops what `id` contributed and forgets its own incoming list.
    pub(crate) fn remove_node(&mut self, id: NodeId) {
        let old = match self.contributed.get_mut(id.index()) {
            Some(list) => std::mem::take(list),
            None => Vec::new(),
        };
        for (edge, target) in old {
            self.drop_entry(target, edge, id);
        }
        if let Some(slot) = self.incoming.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// Brings the contributions of `node` in line with the selector.
    /// Entries that did not change keep their position.
    pub(crate) fn reindex_node(&mut self, node: &Node<S>) {
        let source = node.id();
        let fresh = (self.selector.select)(node);
        if source.index() >= self.contributed.len() {
            self.contributed.resize_with(source.index() + 1, Vec::new);
        }
        let old = std::mem::take(&mut self.contributed[source.index()]);

        let mut added = fresh.clone();
        for (edge, target) in old {
            match added.iter().position(|&(e, t)| e == edge && t == target) {
                Some(pos) => {
                    added.remove(pos);
                }
                None => self.drop_entry(target, edge, source),
            }
        }
        for (edge, target) in added {
            self.slot_mut(target)
                .get_or_insert_with(Vec::new)
                .push((edge, source));
        }
        self.contributed[source.index()] = fresh;
    }

    fn drop_entry(&mut self, target: NodeId, edge: S::Edge, source: NodeId) {
        if let Some(Some(list)) = self.incoming.get_mut(target.index()) {
            if let Some(pos) = list.iter().position(|&(e, s)| e == edge && s == source) {
                list.remove(pos);
            }
        }
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Option<EdgeList<S>> {
        if id.index() >= self.incoming.len() {
            self.incoming.resize_with(id.index() + 1, || None);
        }
        &mut self.incoming[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minipy::{Edge, MiniPy, PyKind, ALL_EDGES, CALL_EDGES};

    fn arena_with_calls() -> (Arena<MiniPy>, NodeId, NodeId, NodeId) {
        let mut arena = Arena::<MiniPy>::new();
        arena.alloc(PyKind::Compilation);
        let call = arena.alloc(PyKind::Call);
        let f = arena.alloc(PyKind::FunctionDef);
        let arg = arena.alloc(PyKind::Literal);
        let node = arena.get_mut(call).unwrap();
        node.push_edge(Edge::HasArgument, arg);
        node.push_edge(Edge::Calls, f);
        (arena, call, f, arg)
    }

    #[test]
    fn build_indexes_selected_edges_only() {
        let (arena, call, f, arg) = arena_with_calls();
        let index = ReverseEdges::build(CALL_EDGES, &arena);
        assert_eq!(index.incoming(f).unwrap(), &[(Edge::Calls, call)]);
        assert!(index.incoming(arg).unwrap().is_empty());
        assert_eq!(index.entry_count(), 1);

        let all = ReverseEdges::build(ALL_EDGES, &arena);
        assert_eq!(all.incoming(arg).unwrap(), &[(Edge::HasArgument, call)]);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let (arena, ..) = arena_with_calls();
        let index = ReverseEdges::build(CALL_EDGES, &arena);
        assert!(matches!(
            index.incoming(NodeId(500)),
            Err(CoreError::InvalidNodeId { .. })
        ));
    }

    #[test]
    fn reindex_keeps_unchanged_entries_in_place() {
        let (mut arena, call, f, _) = arena_with_calls();
        let other = arena.alloc(PyKind::Call);
        arena.get_mut(other).unwrap().push_edge(Edge::Calls, f);
        let mut index = ReverseEdges::build(CALL_EDGES, &arena);
        assert_eq!(index.incoming(f).unwrap(), &[(Edge::Calls, call), (Edge::Calls, other)]);

        arena.get_mut(call).unwrap().push_edge(Edge::Calls, f);
        index.reindex_node(arena.get(call).unwrap());
        assert_eq!(
            index.incoming(f).unwrap(),
            &[(Edge::Calls, call), (Edge::Calls, other), (Edge::Calls, call)]
        );
    }

    #[test]
    fn remove_node_drops_contributions() {
        let (arena, call, f, _) = arena_with_calls();
        let mut index = ReverseEdges::build(CALL_EDGES, &arena);
        index.remove_node(call);
        assert!(index.incoming(f).unwrap().is_empty());
        assert!(index.incoming(call).is_err());
    }

    #[test]
    fn selectors_compare_by_name() {
        assert_eq!(CALL_EDGES, CALL_EDGES.clone());
        assert_ne!(CALL_EDGES, ALL_EDGES);
        assert_eq!(format!("{:?}", CALL_EDGES), "EdgeSelector(\"calls\")");
    }
}
