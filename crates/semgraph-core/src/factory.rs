//! The Factory: owner of one graph.
//!
//! Coordinates the arena, the filter overlay, the optional reverse-edge
//! index, the string table, singleton nodes and destruction observers. All
//! structural mutation goes through here so the derived structures stay in
//! step with the arena.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::rc::Rc;

use crate::arena::Arena;
use crate::error::CoreError;
use crate::filter::{Filter, FilterState, TurnFilterOffSafely};
use crate::id::NodeId;
use crate::io::{BinaryReader, BinaryWriter};
use crate::node::{Node, Value};
use crate::reverse::{EdgeSelector, ReverseEdges};
use crate::schema::{EdgeKind, Kind, NodeKind, Schema};
use crate::strtable::{KeyMap, StringTable};
use crate::traversal::{CollectIds, Preorder};

/// Receives a callback for every node right before it is destroyed.
pub trait NodeObserver<S: Schema> {
    fn on_destroy(&mut self, node: &Node<S>);
}

/// Handle returned by [`Factory::register_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type SharedObserver<S> = Rc<RefCell<dyn NodeObserver<S>>>;

pub struct Factory<S: Schema> {
    arena: Arena<S>,
    filter: Filter,
    reverse: Option<ReverseEdges<S>>,
    strings: StringTable,
    singletons: HashMap<S::Kind, NodeId>,
    observers: Vec<(ObserverId, SharedObserver<S>)>,
    next_observer: u64,
}

impl<S: Schema> Default for Factory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Factory<S> {
    /// Creates a graph holding only the root.
    pub fn new() -> Self {
        Self::with_strings(StringTable::new())
    }

    /// Creates a graph holding only the root, interning into `strings`.
    pub fn with_strings(strings: StringTable) -> Self {
        let mut factory = Factory {
            arena: Arena::new(),
            filter: Filter::new(),
            reverse: None,
            strings,
            singletons: HashMap::new(),
            observers: Vec::new(),
            next_observer: 0,
        };
        factory.arena.alloc_at(NodeId::ROOT, S::root_kind());
        factory.after_create(NodeId::ROOT);
        factory
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    // -------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------

    /// Creates a node at the next free id.
    ///
    /// Singleton kinds are rejected with `InvalidNodeKind`; use
    /// [`Factory::singleton`] for those.
    pub fn create_node(&mut self, kind: S::Kind) -> Result<NodeId, CoreError> {
        if kind.is_singleton() {
            return Err(CoreError::InvalidNodeKind { code: kind.code() });
        }
        let id = self.arena.alloc(kind);
        self.after_create(id);
        Ok(id)
    }

    /// Creates a node from a numeric kind code.
    pub fn create_node_raw(&mut self, code: u16) -> Result<NodeId, CoreError> {
        let kind = S::Kind::from_code(code).ok_or(CoreError::InvalidNodeKind { code })?;
        self.create_node(kind)
    }

    /// Creates a node at a fixed id, growing the arena as needed. Used to
    /// reproduce ids during deserialization and to place reserved nodes.
    pub fn create_node_at(&mut self, kind: S::Kind, id: NodeId) -> Result<NodeId, CoreError> {
        if !id.is_valid() {
            return Err(CoreError::InvalidNodeId { id });
        }
        if self.arena.exists(id) {
            return Err(CoreError::NodeAlreadyExists { id });
        }
        self.arena.alloc_at(id, kind);
        self.after_create(id);
        if kind.is_singleton() {
            self.singletons.entry(kind).or_insert(id);
        }
        Ok(id)
    }

    /// The unique node of a singleton kind, created on first request.
    pub fn singleton(&mut self, kind: S::Kind) -> Result<NodeId, CoreError> {
        if !kind.is_singleton() {
            return Err(CoreError::InvalidNodeKind { code: kind.code() });
        }
        if let Some(&id) = self.singletons.get(&kind) {
            if self.arena.exists(id) {
                return Ok(id);
            }
        }
        let id = self.arena.alloc(kind);
        self.after_create(id);
        self.singletons.insert(kind, id);
        Ok(id)
    }

    fn after_create(&mut self, id: NodeId) {
        self.filter.resize(self.arena.len());
        self.filter.set_state(id, FilterState::NotFiltered);
        if let (Some(reverse), Some(node)) = (self.reverse.as_mut(), self.arena.get(id)) {
            reverse.insert_node(node);
        }
    }

    // -------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------

    pub fn get(&self, id: NodeId) -> Result<&Node<S>, CoreError> {
        self.arena.get(id).ok_or(CoreError::InvalidNodeId { id })
    }

    /// Mutable access for attribute changes. Relations are changed through
    /// [`Factory::add_edge`] and [`Factory::remove_edge`].
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node<S>, CoreError> {
        self.arena.get_mut(id).ok_or(CoreError::InvalidNodeId { id })
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.arena.exists(id)
    }

    pub fn kind(&self, id: NodeId) -> Result<S::Kind, CoreError> {
        self.get(id).map(Node::kind)
    }

    /// Arena size in slots, holes included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn node_count(&self) -> usize {
        self.arena.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }

    /// Live nodes hidden neither by the filter nor by a hole.
    pub fn iter(&self) -> impl Iterator<Item = &Node<S>> {
        self.arena
            .iter()
            .filter(move |node| !self.filter.is_filtered(node.id()))
    }

    /// Every live node regardless of the filter.
    pub fn iter_all(&self) -> impl Iterator<Item = &Node<S>> {
        self.arena.iter()
    }

    /// Ids waiting for reuse, oldest first.
    pub fn free_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.arena.free_ids()
    }

    // -------------------------------------------------------------------
    // Relations and attributes
    // -------------------------------------------------------------------

    /// Adds `source -edge-> target`. Owning relations set the target's
    /// parent.
    pub fn add_edge(&mut self, source: NodeId, edge: S::Edge, target: NodeId) -> Result<(), CoreError> {
        let source_kind = self.get(source)?.kind();
        let target_node = self.get(target)?;
        let target_kind = target_node.kind();

        if !S::edge_allowed(source_kind, edge, target_kind) {
            return Err(CoreError::InvalidEdge {
                reason: format!("{source_kind} -{edge}-> {target_kind} is not allowed"),
            });
        }
        if edge.is_tree() {
            if target == NodeId::ROOT {
                return Err(CoreError::InvalidEdge {
                    reason: "the root cannot be owned".to_string(),
                });
            }
            if let Some(owner) = target_node.parent() {
                return Err(CoreError::InvalidEdge {
                    reason: format!("node {target} is already owned by {owner}"),
                });
            }
            if self.is_ancestor_or_self(target, source) {
                return Err(CoreError::InvalidEdge {
                    reason: format!("owning {target} from {source} would form a cycle"),
                });
            }
        }

        self.get_mut(source)?.push_edge(edge, target);
        if edge.is_tree() {
            self.get_mut(target)?.set_parent(Some((source, edge)));
        }
        self.reindex(source);
        Ok(())
    }

    /// Removes one `source -edge-> target` relation. Returns whether one
    /// was found.
    pub fn remove_edge(&mut self, source: NodeId, edge: S::Edge, target: NodeId) -> Result<bool, CoreError> {
        if !self.get_mut(source)?.remove_edge(edge, target) {
            return Ok(false);
        }
        if edge.is_tree() {
            if let Some(child) = self.arena.get_mut(target) {
                if child.parent() == Some(source) {
                    child.set_parent(None);
                }
            }
        }
        self.reindex(source);
        Ok(true)
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.arena.get(id).and_then(Node::parent);
        }
        false
    }

    fn reindex(&mut self, id: NodeId) {
        if let (Some(reverse), Some(node)) = (self.reverse.as_mut(), self.arena.get(id)) {
            reverse.reindex_node(node);
        }
    }

    /// Interns `value` and stores its key under `attr`.
    pub fn set_str_attr(&mut self, id: NodeId, attr: S::Attr, value: &str) -> Result<(), CoreError> {
        if !self.exists(id) {
            return Err(CoreError::InvalidNodeId { id });
        }
        let key = self.strings.intern(value);
        self.get_mut(id)?.set_attr(attr, Value::Str(key));
        Ok(())
    }

    /// Resolved text of a string attribute.
    pub fn str_attr(&self, id: NodeId, attr: S::Attr) -> Result<Option<&str>, CoreError> {
        Ok(self
            .get(id)?
            .key_attr(attr)
            .and_then(|key| self.strings.get(key)))
    }

    // -------------------------------------------------------------------
    // Destruction
    // -------------------------------------------------------------------

    pub fn register_observer(&mut self, observer: SharedObserver<S>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unregister_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(registered, _)| *registered != id);
        self.observers.len() != before
    }

    fn notify(&self, node: &Node<S>) {
        for (_, observer) in &self.observers {
            observer.borrow_mut().on_destroy(node);
        }
    }

    fn check_destroyable(&self, id: NodeId) -> Result<(), CoreError> {
        if self.reverse.is_none() {
            return Err(CoreError::ReverseEdgesDisabled);
        }
        if !self.exists(id) {
            return Err(CoreError::NodeNotFound { id });
        }
        if id == NodeId::ROOT {
            return Err(CoreError::ProtectedNode { id });
        }
        Ok(())
    }

    /// Destroys one node. Its owned children survive without a parent.
    pub fn destroy_this_node_only(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.check_destroyable(id)?;
        self.destroy_set(&[id]);
        Ok(())
    }

    /// Destroys `id` and everything it owns, directly or transitively.
    pub fn destroy_subtree(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.check_destroyable(id)?;
        let ids = self.collect_subtree(id)?;
        self.destroy_set(&ids);
        Ok(())
    }

    /// Ids owned by `id`, including itself, in preorder.
    pub fn collect_subtree(&self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        let mut collect = CollectIds::default();
        Preorder::new()
            .safe_mode(true)
            .visit_shared(false)
            .run(self, &mut collect, id)?;
        Ok(collect.ids)
    }

    // Every id in `ids` is live. Observers hear about all of them before the
    // first one is removed.
    fn destroy_set(&mut self, ids: &[NodeId]) {
        let doomed: HashSet<NodeId> = ids.iter().copied().collect();

        let mut touched = BTreeSet::new();
        let mut orphans = Vec::new();
        for &id in ids {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            self.notify(node);
            if let Some(parent) = node.parent() {
                if !doomed.contains(&parent) {
                    touched.insert(parent);
                }
            }
            orphans.extend(
                node.children()
                    .map(|(_, child)| child)
                    .filter(|child| !doomed.contains(child)),
            );
            if let Some(reverse) = &self.reverse {
                if let Ok(incoming) = reverse.incoming(id) {
                    touched.extend(
                        incoming
                            .iter()
                            .map(|(_, source)| *source)
                            .filter(|source| !doomed.contains(source)),
                    );
                }
            }
        }

        for source in touched {
            if let Some(node) = self.arena.get_mut(source) {
                node.retain_edges(|_, target| !doomed.contains(&target));
            }
            self.reindex(source);
        }
        for child in orphans {
            if let Some(node) = self.arena.get_mut(child) {
                node.set_parent(None);
            }
        }
        for &id in ids {
            if let Some(reverse) = self.reverse.as_mut() {
                reverse.remove_node(id);
            }
            if let Some(node) = self.arena.free(id) {
                tracing::debug!(node = %id, kind = %node.kind(), "node destroyed");
                if node.kind().is_singleton() {
                    self.singletons.retain(|_, singleton| *singleton != id);
                }
            }
            self.filter.set_state(id, FilterState::NotFiltered);
        }

        #[cfg(debug_assertions)]
        self.assert_consistency();
    }

    /// Destroys every node and resets the filter. The root is not
    /// recreated.
    pub fn clear(&mut self) {
        self.reverse = None;
        for node in self.arena.iter() {
            self.notify(node);
        }
        tracing::debug!(nodes = self.arena.live_count(), "graph cleared");
        self.arena.clear();
        self.filter.clear();
        self.singletons.clear();
    }

    // -------------------------------------------------------------------
    // Filter
    // -------------------------------------------------------------------

    /// Filters `id` and everything it owns.
    pub fn set_filtered(&mut self, id: NodeId) -> Result<(), CoreError> {
        for member in self.collect_subtree(id)? {
            self.filter.set_state(member, FilterState::Filtered);
        }
        Ok(())
    }

    /// Unfilters `id` and everything it owns. Filtered owners of `id`
    /// become visible themselves so `id` stays reachable from the root.
    pub fn set_not_filtered(&mut self, id: NodeId) -> Result<(), CoreError> {
        for member in self.collect_subtree(id)? {
            self.filter.set_state(member, FilterState::NotFiltered);
        }
        let mut current = self.get(id)?.parent();
        while let Some(owner) = current {
            if self.filter.state(owner) == FilterState::Filtered {
                self.filter
                    .set_state(owner, FilterState::NotFilteredThisNodeOnly);
            }
            current = self.arena.get(owner).and_then(Node::parent);
        }
        Ok(())
    }

    pub fn set_filtered_this_node_only(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.get(id)?;
        self.filter.set_state(id, FilterState::Filtered);
        Ok(())
    }

    pub fn set_not_filtered_this_node_only(&mut self, id: NodeId) -> Result<(), CoreError> {
        self.get(id)?;
        self.filter.set_state(id, FilterState::NotFilteredThisNodeOnly);
        Ok(())
    }

    pub fn filter_state(&self, id: NodeId) -> FilterState {
        self.filter.state(id)
    }

    /// False whenever filtering is switched off.
    pub fn is_filtered(&self, id: NodeId) -> bool {
        self.filter.is_filtered(id)
    }

    pub fn is_filter_on(&self) -> bool {
        self.filter.is_on()
    }

    pub fn turn_filter_on(&self) {
        self.filter.turn_on();
    }

    pub fn turn_filter_off(&self) {
        self.filter.turn_off();
    }

    /// Switches filtering off until the returned guard drops.
    pub fn turn_filter_off_safely(&self) -> TurnFilterOffSafely {
        self.filter.turn_off_safely()
    }

    /// Marks every node `NotFiltered`.
    pub fn initialize_filter(&mut self) {
        self.filter.initialize();
    }

    pub fn filtered_count(&self) -> usize {
        self.filter.filtered_count()
    }

    pub fn save_filter<W: Write>(&self, writer: W) -> Result<(), CoreError> {
        let mut w = BinaryWriter::new(writer);
        self.filter.save(&mut w)?;
        w.flush()?;
        Ok(())
    }

    pub fn load_filter<R: Read>(&mut self, reader: R) -> Result<(), CoreError> {
        let mut r = BinaryReader::new(reader);
        self.filter.load(&mut r, self.arena.len())
    }

    pub fn save_filter_file(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        self.save_filter(BufWriter::new(File::create(path)?))
    }

    pub fn load_filter_file(&mut self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        self.load_filter(BufReader::new(File::open(path)?))
    }

    // -------------------------------------------------------------------
    // Reverse edges
    // -------------------------------------------------------------------

    /// Builds the reverse-edge index. A different selector replaces the
    /// current index.
    pub fn enable_reverse_edges(&mut self, selector: EdgeSelector<S>) {
        match &self.reverse {
            Some(current) if current.selector() == selector => return,
            Some(current) => tracing::warn!(
                old = current.selector().name,
                new = selector.name,
                "edge selector changed, rebuilding reverse edges"
            ),
            None => {}
        }
        self.reverse = Some(ReverseEdges::build(selector, &self.arena));
    }

    pub fn disable_reverse_edges(&mut self) {
        self.reverse = None;
    }

    pub fn reverse_edges_enabled(&self) -> bool {
        self.reverse.is_some()
    }

    pub fn reverse_edges(&self) -> Result<&ReverseEdges<S>, CoreError> {
        self.reverse.as_ref().ok_or(CoreError::ReverseEdgesDisabled)
    }

    pub fn incoming_edges(&self, id: NodeId) -> Result<&[(S::Edge, NodeId)], CoreError> {
        self.reverse_edges()?.incoming(id)
    }

    // -------------------------------------------------------------------
    // Strings
    // -------------------------------------------------------------------

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    /// Installs `table`, re-interning every string attribute into it, and
    /// returns the previous table.
    pub fn swap_string_table(&mut self, table: StringTable) -> StringTable {
        let mut table = table;
        let mut map = KeyMap::new();
        for node in self.arena.iter() {
            for (_, value) in node.attrs() {
                if let Value::Str(key) = *value {
                    if !map.contains_key(&key) {
                        let text = self.strings.get(key).unwrap_or_default();
                        map.insert(key, table.intern(text));
                    }
                }
            }
        }
        let old = std::mem::replace(&mut self.strings, table);
        self.remap_keys(&map);
        old
    }

    /// Rewrites string keys of every node through `map`.
    pub fn remap_keys(&mut self, map: &KeyMap) {
        for node in self.arena.iter_mut() {
            node.remap_keys(map);
        }
    }

    // -------------------------------------------------------------------
    // Deserialization hooks
    // -------------------------------------------------------------------

    /// Appends a relation without validation; the target may not exist
    /// yet. Call [`Factory::finish_restore`] once every node is placed.
    ///
    /// The reverse-edge index, if enabled, is updated right away. Parent
    /// links are not; they are rebuilt by `finish_restore`.
    pub fn restore_edge(&mut self, source: NodeId, edge: S::Edge, target: NodeId) -> Result<(), CoreError> {
        self.get_mut(source)?.push_edge(edge, target);
        self.reindex(source);
        Ok(())
    }

    /// Validates restored relations and rebuilds parent links, the free
    /// list, the singleton map and, if enabled, the reverse-edge index.
    pub fn finish_restore(&mut self) -> Result<(), CoreError> {
        let mut links = Vec::new();
        for node in self.arena.iter() {
            for &(edge, target) in node.edges() {
                if !self.arena.exists(target) {
                    return Err(CoreError::InvalidNodeId { id: target });
                }
                if edge.is_tree() {
                    links.push((target, node.id(), edge));
                }
            }
        }
        for node in self.arena.iter_mut() {
            node.set_parent(None);
        }
        for (child, owner, edge) in links {
            let node = self.get_mut(child)?;
            if let Some(existing) = node.parent() {
                return Err(CoreError::InvalidEdge {
                    reason: format!("node {child} is owned by both {existing} and {owner}"),
                });
            }
            node.set_parent(Some((owner, edge)));
        }
        self.check_ownership_acyclic()?;
        if !self.arena.exists(NodeId::ROOT) {
            return Err(CoreError::NodeNotFound { id: NodeId::ROOT });
        }

        self.arena.rebuild_free_list();
        self.filter.resize(self.arena.len());
        self.singletons = self
            .arena
            .iter()
            .filter(|node| node.kind().is_singleton())
            .map(|node| (node.kind(), node.id()))
            .collect();
        if let Some(selector) = self.reverse.as_ref().map(ReverseEdges::selector) {
            self.reverse = Some(ReverseEdges::build(selector, &self.arena));
        }
        Ok(())
    }

    /// Fails with `InvalidEdge` if following parent links from any node
    /// comes back to a node already on that chain.
    fn check_ownership_acyclic(&self) -> Result<(), CoreError> {
        let mut settled = vec![false; self.arena.len()];
        let mut on_chain = vec![false; self.arena.len()];
        for node in self.arena.iter() {
            let mut chain = Vec::new();
            let mut current = Some(node.id());
            while let Some(id) = current {
                if settled[id.index()] {
                    break;
                }
                if on_chain[id.index()] {
                    return Err(CoreError::InvalidEdge {
                        reason: format!("ownership cycle through node {id}"),
                    });
                }
                on_chain[id.index()] = true;
                chain.push(id);
                current = self.arena.get(id).and_then(Node::parent);
            }
            for id in chain {
                on_chain[id.index()] = false;
                settled[id.index()] = true;
            }
        }
        Ok(())
    }

    /// Replaces the whole graph with `loaded`, a factory filled by a
    /// restore.
    ///
    /// Observers of this factory are notified for every node it held, as
    /// with [`Factory::clear`]. Observers, the filter switch and its guards
    /// stay attached to `self`; reverse edges are left disabled and every
    /// filter state starts as `NotFiltered`.
    pub fn adopt(&mut self, loaded: Factory<S>) {
        self.clear();
        let Factory {
            arena,
            strings,
            singletons,
            ..
        } = loaded;
        self.arena = arena;
        self.strings = strings;
        self.singletons = singletons;
        self.filter.resize(self.arena.len());
    }

    // -------------------------------------------------------------------
    // Invariants
    // -------------------------------------------------------------------

    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        assert!(
            self.filter.len() >= self.arena.len(),
            "filter shorter than arena"
        );
        for id in self.arena.free_ids() {
            assert!(!self.arena.exists(id), "free id {id} is live");
        }
        for node in self.arena.iter() {
            if let Some(parent) = node.parent() {
                assert!(self.arena.exists(parent), "node {} has a dead parent", node.id());
            }
        }
    }
}
