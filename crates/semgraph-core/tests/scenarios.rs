//! End-to-end scenarios for the in-memory container.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use semgraph_core::minipy::{Attr, Edge, MiniPy, PyKind, CALL_EDGES};
use semgraph_core::{CoreError, Factory, Node, NodeId, NodeObserver, Preorder, VisitContext, VisitFlow, Visitor};

// ---- Test helpers

/// A cache keyed by node id that drops entries as nodes die.
#[derive(Default)]
struct NameCache {
    names: HashMap<NodeId, String>,
    evicted: Vec<NodeId>,
}

impl NodeObserver<MiniPy> for NameCache {
    fn on_destroy(&mut self, node: &Node<MiniPy>) {
        if self.names.remove(&node.id()).is_some() {
            self.evicted.push(node.id());
        }
    }
}

/// Counts calls per callee, the way an analysis pass would.
#[derive(Default)]
struct CallCounter {
    calls: HashMap<NodeId, usize>,
}

impl Visitor<MiniPy> for CallCounter {
    fn visit_edge(
        &mut self,
        _cx: &VisitContext<'_, MiniPy>,
        edge: Edge,
        _source: &Node<MiniPy>,
        target: &Node<MiniPy>,
    ) -> VisitFlow {
        if edge == Edge::Calls {
            *self.calls.entry(target.id()).or_default() += 1;
        }
        VisitFlow::Continue
    }
}

// ---- Scenarios

#[test]
fn who_calls_this_function() {
    let mut f = Factory::<MiniPy>::new();
    f.enable_reverse_edges(CALL_EDGES);

    let a = f.create_call_node().unwrap();
    let b = f.create_function_def_node().unwrap();
    f.add_edge(a, Edge::Calls, b).unwrap();
    assert_eq!(f.incoming_edges(b).unwrap(), &[(Edge::Calls, a)]);

    f.destroy_this_node_only(a).unwrap();
    assert!(f.incoming_edges(b).unwrap().is_empty());
}

#[test]
fn observers_invalidate_caches() {
    let mut f = Factory::<MiniPy>::new();
    f.enable_reverse_edges(CALL_EDGES);
    let module = f.create_module_node().unwrap();
    f.add_edge(f.root(), Edge::HasModule, module).unwrap();
    let class = f
        .create_named(module, Edge::HasMember, PyKind::ClassDef, "Shape")
        .unwrap();
    let method = f
        .create_named(class, Edge::HasMember, PyKind::FunctionDef, "area")
        .unwrap();

    let cache = Rc::new(RefCell::new(NameCache::default()));
    for id in [class, method] {
        let name = f.str_attr(id, Attr::Name).unwrap().unwrap().to_string();
        cache.borrow_mut().names.insert(id, name);
    }
    f.register_observer(cache.clone());

    f.destroy_subtree(class).unwrap();
    assert_eq!(cache.borrow().evicted, vec![class, method]);
    assert!(cache.borrow().names.is_empty());
    assert!(f.exists(module));
}

#[test]
fn visitor_counts_calls_across_the_tree() {
    let mut f = Factory::<MiniPy>::new();
    let module = f.create_module_node().unwrap();
    f.add_edge(f.root(), Edge::HasModule, module).unwrap();
    let helper = f
        .create_named(module, Edge::HasMember, PyKind::FunctionDef, "helper")
        .unwrap();
    for _ in 0..3 {
        let stmt = f.create_statement_node().unwrap();
        f.add_edge(module, Edge::HasMember, stmt).unwrap();
        let call = f.create_call_node().unwrap();
        f.add_edge(stmt, Edge::HasExpression, call).unwrap();
        f.add_edge(call, Edge::Calls, helper).unwrap();
    }

    let mut counter = CallCounter::default();
    Preorder::new().run_from_root(&f, &mut counter).unwrap();
    assert_eq!(counter.calls[&helper], 3);

    // Hidden call sites are not reported.
    let first_stmt = NodeId(helper.0 + 1);
    f.set_filtered(first_stmt).unwrap();
    let mut counter = CallCounter::default();
    Preorder::new().run_from_root(&f, &mut counter).unwrap();
    assert_eq!(counter.calls[&helper], 2);
}

#[test]
fn reserved_ids_hold_bookkeeping_nodes() {
    let mut f = Factory::<MiniPy>::new();
    let note = f.create_node_at(PyKind::Comment, NodeId(1)).unwrap();
    f.set_str_attr(note, Attr::Text, "# generated").unwrap();
    assert!(note.is_reserved());
    assert_eq!(f.create_literal_node().unwrap(), NodeId(101));

    f.enable_reverse_edges(CALL_EDGES);
    f.destroy_this_node_only(note).unwrap();
    assert_eq!(f.free_ids().count(), 0);
    assert!(matches!(f.get(note), Err(CoreError::InvalidNodeId { .. })));
}
