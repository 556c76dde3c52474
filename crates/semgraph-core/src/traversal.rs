//! Preorder traversal with node and edge callbacks.
//!
//! [`Preorder`] holds the walk configuration; a [`Visitor`] reacts to nodes
//! and relations. By default filtered nodes are skipped, only owning
//! relations are descended, and a node reached again through another path is
//! visited again. Maintenance passes (serialization, subtree collection)
//! switch on safe mode and switch off shared revisits.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::factory::Factory;
use crate::id::NodeId;
use crate::node::Node;
use crate::schema::{EdgeKind, Schema};

/// What the walk does after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    /// Do not descend below this node or relation. The rest of the walk
    /// goes on.
    SkipChildren,
    /// End the whole run. `finish` is still called.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    NotStarted,
    InProgress,
    Finished,
}

/// Read-only view handed to every callback.
pub struct VisitContext<'a, S: Schema> {
    factory: &'a Factory<S>,
    depth: usize,
}

impl<'a, S: Schema> VisitContext<'a, S> {
    /// Number of relations between the start node and the current one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn factory(&self) -> &'a Factory<S> {
        self.factory
    }
}

/// Callbacks of a traversal. Every method has a no-op default.
pub trait Visitor<S: Schema> {
    fn begin(&mut self, _cx: &VisitContext<'_, S>) {}

    fn finish(&mut self, _cx: &VisitContext<'_, S>) {}

    fn visit(&mut self, _cx: &VisitContext<'_, S>, _node: &Node<S>) -> VisitFlow {
        VisitFlow::Continue
    }

    fn visit_end(&mut self, _cx: &VisitContext<'_, S>, _node: &Node<S>) {}

    fn visit_edge(
        &mut self,
        _cx: &VisitContext<'_, S>,
        _edge: S::Edge,
        _source: &Node<S>,
        _target: &Node<S>,
    ) -> VisitFlow {
        VisitFlow::Continue
    }

    fn visit_edge_end(
        &mut self,
        _cx: &VisitContext<'_, S>,
        _edge: S::Edge,
        _source: &Node<S>,
        _target: &Node<S>,
    ) {
    }
}

/// Preorder walk configuration and run state.
#[derive(Debug, Clone)]
pub struct Preorder {
    safe_mode: bool,
    visit_shared: bool,
    follow_cross_edges: bool,
    state: RunState,
}

impl Default for Preorder {
    fn default() -> Self {
        Preorder {
            safe_mode: false,
            visit_shared: true,
            follow_cross_edges: false,
            state: RunState::NotStarted,
        }
    }
}

impl Preorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore the filter overlay.
    pub fn safe_mode(mut self, on: bool) -> Self {
        self.safe_mode = on;
        self
    }

    /// Revisit a node each time another path reaches it.
    pub fn visit_shared(mut self, on: bool) -> Self {
        self.visit_shared = on;
        self
    }

    /// Descend into non-owning relations too.
    pub fn follow_cross_edges(mut self, on: bool) -> Self {
        self.follow_cross_edges = on;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Walks from `start`.
    pub fn run<S, V>(
        &mut self,
        factory: &Factory<S>,
        visitor: &mut V,
        start: NodeId,
    ) -> Result<(), CoreError>
    where
        S: Schema,
        V: Visitor<S> + ?Sized,
    {
        self.run_many(factory, visitor, &[start])
    }

    pub fn run_from_root<S, V>(
        &mut self,
        factory: &Factory<S>,
        visitor: &mut V,
    ) -> Result<(), CoreError>
    where
        S: Schema,
        V: Visitor<S> + ?Sized,
    {
        self.run_many(factory, visitor, &[factory.root()])
    }

    /// Walks every parentless live node in id order, reaching the whole
    /// arena through owning relations.
    pub fn run_forest<S, V>(&mut self, factory: &Factory<S>, visitor: &mut V) -> Result<(), CoreError>
    where
        S: Schema,
        V: Visitor<S> + ?Sized,
    {
        let roots: Vec<NodeId> = factory
            .iter_all()
            .filter(|node| node.parent().is_none())
            .map(Node::id)
            .collect();
        self.run_many(factory, visitor, &roots)
    }

    fn run_many<S, V>(
        &mut self,
        factory: &Factory<S>,
        visitor: &mut V,
        starts: &[NodeId],
    ) -> Result<(), CoreError>
    where
        S: Schema,
        V: Visitor<S> + ?Sized,
    {
        self.state = RunState::InProgress;
        let mut walk = Walk {
            config: &*self,
            factory,
            visitor,
            visited: vec![false; factory.len()],
            on_path: HashSet::new(),
            depth: 0,
            stopped: false,
        };
        let cx = VisitContext { factory, depth: 0 };
        walk.visitor.begin(&cx);
        for &start in starts {
            if walk.stopped {
                break;
            }
            walk.node(start)?;
        }
        debug_assert_eq!(walk.depth, 0);
        walk.visitor.finish(&cx);
        self.state = RunState::Finished;
        Ok(())
    }
}

struct Walk<'a, 'v, S: Schema, V: Visitor<S> + ?Sized> {
    config: &'a Preorder,
    factory: &'a Factory<S>,
    visitor: &'v mut V,
    visited: Vec<bool>,
    on_path: HashSet<NodeId>,
    depth: usize,
    stopped: bool,
}

impl<S: Schema, V: Visitor<S> + ?Sized> Walk<'_, '_, S, V> {
    fn node(&mut self, id: NodeId) -> Result<(), CoreError> {
        let factory = self.factory;
        let node = factory.get(id)?;
        if !self.config.safe_mode && factory.is_filtered(id) {
            return Ok(());
        }
        if self.config.visit_shared {
            if self.on_path.contains(&id) {
                return Ok(());
            }
        } else {
            if self.visited[id.index()] {
                if self.config.safe_mode {
                    tracing::trace!(node = %id, "node touched twice");
                }
                return Ok(());
            }
            self.visited[id.index()] = true;
        }

        let cx = VisitContext {
            factory,
            depth: self.depth,
        };
        match self.visitor.visit(&cx, node) {
            VisitFlow::Stop => {
                self.stopped = true;
                return Ok(());
            }
            VisitFlow::SkipChildren => {
                self.visitor.visit_end(&cx, node);
                return Ok(());
            }
            VisitFlow::Continue => {}
        }

        self.on_path.insert(id);
        for &(edge, target) in node.edges() {
            let target_node = factory.get(target)?;
            if !self.config.safe_mode && factory.is_filtered(target) {
                continue;
            }
            let flow = self.visitor.visit_edge(&cx, edge, node, target_node);
            if flow == VisitFlow::Stop {
                self.stopped = true;
                break;
            }
            if flow == VisitFlow::Continue && (edge.is_tree() || self.config.follow_cross_edges) {
                self.depth += 1;
                let result = self.node(target);
                self.depth -= 1;
                result?;
            }
            if self.stopped {
                break;
            }
            self.visitor.visit_edge_end(&cx, edge, node, target_node);
        }
        self.on_path.remove(&id);

        if !self.stopped {
            self.visitor.visit_end(&cx, node);
        }
        Ok(())
    }
}

/// Collects visited ids in preorder.
#[derive(Debug, Default)]
pub struct CollectIds {
    pub ids: Vec<NodeId>,
}

impl<S: Schema> Visitor<S> for CollectIds {
    fn visit(&mut self, _cx: &VisitContext<'_, S>, node: &Node<S>) -> VisitFlow {
        self.ids.push(node.id());
        VisitFlow::Continue
    }
}
