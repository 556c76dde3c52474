//! Id-indexed node storage with FIFO id reuse.
//!
//! Slots are `Option<Node>`: a hole is a destroyed or never-created id. The
//! allocator never returns ids below [`NodeId::FIRST`], and every hole it can
//! hand out again is queued in the free list.

use std::collections::VecDeque;

use crate::id::NodeId;
use crate::node::Node;
use crate::schema::Schema;

pub struct Arena<S: Schema> {
    slots: Vec<Option<Node<S>>>,
    free: VecDeque<NodeId>,
}

impl<S: Schema> Default for Arena<S> {
    fn default() -> Self {
        Arena {
            slots: Vec::new(),
            free: VecDeque::new(),
        }
    }
}

impl<S: Schema> Arena<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id a creation would use: the oldest freed id, else the end of
    /// the arena (never below [`NodeId::FIRST`]).
    pub fn next_id(&self) -> NodeId {
        match self.free.front() {
            Some(id) => *id,
            None => NodeId(self.slots.len().max(NodeId::FIRST.index()) as u32),
        }
    }

    /// Allocates an id and places a fresh node there.
    pub fn alloc(&mut self, kind: S::Kind) -> NodeId {
        let id = match self.free.pop_front() {
            Some(id) => id,
            None => NodeId(self.slots.len().max(NodeId::FIRST.index()) as u32),
        };
        self.place(Node::new(id, kind));
        id
    }

    /// Places a fresh node at `id`, which the caller has checked is a hole
    /// or beyond the end.
    pub fn alloc_at(&mut self, id: NodeId, kind: S::Kind) {
        if let Some(pos) = self.free.iter().position(|free| *free == id) {
            self.free.remove(pos);
        }
        self.place(Node::new(id, kind));
    }

    fn place(&mut self, node: Node<S>) {
        let index = node.id().index();
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(node);
    }

    /// Empties the slot and queues the id for reuse.
    pub fn free(&mut self, id: NodeId) -> Option<Node<S>> {
        let node = self.slots.get_mut(id.index())?.take()?;
        if id >= NodeId::FIRST {
            self.free.push_back(id);
        }
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<S>> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<S>> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        id.is_valid() && self.get(id).is_some()
    }

    /// Number of slots, holes included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Live nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Node<S>> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node<S>> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    pub fn free_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.free.iter().copied()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    /// Rebuilds the free list from the holes at or above [`NodeId::FIRST`],
    /// in ascending order.
    pub fn rebuild_free_list(&mut self) {
        self.free = self
            .slots
            .iter()
            .enumerate()
            .skip(NodeId::FIRST.index())
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| NodeId(index as u32))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minipy::{MiniPy, PyKind};

    #[test]
    fn allocation_starts_at_first() {
        let mut arena = Arena::<MiniPy>::new();
        assert_eq!(arena.alloc(PyKind::Compilation), NodeId::ROOT);
        assert_eq!(arena.alloc(PyKind::Statement), NodeId(101));
        assert_eq!(arena.len(), 102);
        assert_eq!(arena.live_count(), 2);
    }

    #[test]
    fn freed_ids_are_reused_fifo() {
        let mut arena = Arena::<MiniPy>::new();
        let ids: Vec<NodeId> = (0..4).map(|_| arena.alloc(PyKind::Literal)).collect();
        arena.free(ids[2]).unwrap();
        arena.free(ids[0]).unwrap();
        assert_eq!(arena.next_id(), ids[2]);
        assert_eq!(arena.alloc(PyKind::Literal), ids[2]);
        assert_eq!(arena.alloc(PyKind::Literal), ids[0]);
        assert_eq!(arena.alloc(PyKind::Literal), NodeId(104));
    }

    #[test]
    fn reserved_ids_are_not_queued() {
        let mut arena = Arena::<MiniPy>::new();
        arena.alloc_at(NodeId(5), PyKind::Comment);
        assert!(arena.exists(NodeId(5)));
        arena.free(NodeId(5)).unwrap();
        assert_eq!(arena.free_ids().count(), 0);
    }

    #[test]
    fn alloc_at_claims_a_free_id() {
        let mut arena = Arena::<MiniPy>::new();
        let a = arena.alloc(PyKind::Literal);
        arena.alloc(PyKind::Literal);
        arena.free(a);
        arena.alloc_at(a, PyKind::Call);
        assert_eq!(arena.free_ids().count(), 0);
        assert_eq!(arena.get(a).unwrap().kind(), PyKind::Call);
    }

    #[test]
    fn rebuild_free_list_ignores_reserved_holes() {
        let mut arena = Arena::<MiniPy>::new();
        arena.alloc_at(NodeId(100), PyKind::Compilation);
        arena.alloc_at(NodeId(103), PyKind::Module);
        arena.rebuild_free_list();
        assert_eq!(arena.free_ids().collect::<Vec<_>>(), vec![NodeId(101), NodeId(102)]);
        assert!(!arena.exists(NodeId::INVALID));
    }
}
