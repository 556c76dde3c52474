//! Property tests over random create/link/destroy sequences.
//!
//! Checks id reuse, reverse-edge consistency and traversal completeness
//! after every step, without explicit index rebuilds.

use std::collections::HashSet;

use proptest::prelude::*;

use semgraph_core::minipy::{Edge, MiniPy, PyKind, ALL_EDGES, CALL_EDGES};
use semgraph_core::traversal::CollectIds;
use semgraph_core::{EdgeSelector, Factory, Node, NodeId, Preorder};

// ---- Operations

#[derive(Debug, Clone)]
enum Op {
    Create(u8),
    Own(usize, usize),
    Call(usize, usize),
    DestroyOne(usize),
    DestroySubtree(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Create),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Own(a, b)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Call(a, b)),
        1 => any::<usize>().prop_map(Op::DestroyOne),
        1 => any::<usize>().prop_map(Op::DestroySubtree),
    ]
}

const KINDS: [PyKind; 4] = [
    PyKind::Statement,
    PyKind::ClassDef,
    PyKind::FunctionDef,
    PyKind::Call,
];

fn pick(f: &Factory<MiniPy>, n: usize) -> Option<NodeId> {
    let live: Vec<NodeId> = f
        .iter_all()
        .map(Node::id)
        .filter(|id| *id != NodeId::ROOT)
        .collect();
    if live.is_empty() {
        None
    } else {
        Some(live[n % live.len()])
    }
}

fn apply(f: &mut Factory<MiniPy>, op: &Op) {
    match *op {
        Op::Create(k) => {
            let expected = f.free_ids().next();
            let id = f.create_node(KINDS[k as usize % KINDS.len()]).unwrap();
            if let Some(expected) = expected {
                assert_eq!(id, expected, "free list is not FIFO");
            }
        }
        Op::Own(a, b) => {
            if let (Some(a), Some(b)) = (pick(f, a), pick(f, b)) {
                // Ill-typed or cyclic ownership is rejected; either way the
                // graph must stay consistent.
                let _ = f.add_edge(a, Edge::HasMember, b);
            }
        }
        Op::Call(a, b) => {
            if let (Some(a), Some(b)) = (pick(f, a), pick(f, b)) {
                let _ = f.add_edge(a, Edge::Calls, b);
            }
        }
        Op::DestroyOne(a) => {
            if let Some(a) = pick(f, a) {
                f.destroy_this_node_only(a).unwrap();
            }
        }
        Op::DestroySubtree(a) => {
            if let Some(a) = pick(f, a) {
                let members = f.collect_subtree(a).unwrap();
                let before: HashSet<NodeId> = f.iter_all().map(Node::id).collect();
                f.destroy_subtree(a).unwrap();
                let after: HashSet<NodeId> = f.iter_all().map(Node::id).collect();
                let removed: HashSet<NodeId> = before.difference(&after).copied().collect();
                assert_eq!(removed, members.into_iter().collect::<HashSet<_>>());
            }
        }
    }
}

// ---- Invariants

fn check_free_list(f: &Factory<MiniPy>) {
    let free: Vec<NodeId> = f.free_ids().collect();
    let unique: HashSet<NodeId> = free.iter().copied().collect();
    assert_eq!(free.len(), unique.len(), "duplicate free ids");
    for id in free {
        assert!(!f.exists(id), "free id {id} is live");
        assert!(id >= NodeId::FIRST);
    }
}

fn check_reverse_edges(f: &Factory<MiniPy>, selector: EdgeSelector<MiniPy>) {
    for a in f.iter_all() {
        for (k, b) in (selector.select)(a) {
            let incoming = f.incoming_edges(b).unwrap();
            assert!(incoming.contains(&(k, a.id())), "{b} misses ({k}, {})", a.id());
        }
    }
    for b in f.iter_all() {
        for &(k, a) in f.incoming_edges(b.id()).unwrap() {
            let source = f.get(a).unwrap();
            assert!((selector.select)(source).contains(&(k, b.id())));
        }
    }
}

fn check_traversal(f: &Factory<MiniPy>) {
    let mut ids = CollectIds::default();
    Preorder::new()
        .safe_mode(true)
        .visit_shared(false)
        .run_forest(f, &mut ids)
        .unwrap();
    let unique: HashSet<NodeId> = ids.ids.iter().copied().collect();
    assert_eq!(ids.ids.len(), unique.len(), "a node was visited twice");
    assert_eq!(ids.ids.len(), f.node_count(), "a live node was not visited");
}

proptest! {
    #[test]
    fn all_edges_index_stays_consistent(ops in prop::collection::vec(op(), 0..80)) {
        let mut f = Factory::<MiniPy>::new();
        f.enable_reverse_edges(ALL_EDGES);
        for op in &ops {
            apply(&mut f, op);
            check_free_list(&f);
            check_reverse_edges(&f, ALL_EDGES);
            check_traversal(&f);
            // Every relation is indexed, so destruction repairs all of them.
            for node in f.iter_all() {
                for (_, target) in node.edges() {
                    prop_assert!(f.exists(*target));
                }
            }
        }
    }

    #[test]
    fn call_index_stays_consistent(ops in prop::collection::vec(op(), 0..80)) {
        let mut f = Factory::<MiniPy>::new();
        f.enable_reverse_edges(CALL_EDGES);
        for op in &ops {
            apply(&mut f, op);
            check_free_list(&f);
            check_reverse_edges(&f, CALL_EDGES);
        }
    }

    #[test]
    fn filter_is_idempotent(depth in 1usize..6, pick_at in 0usize..6) {
        let mut f = Factory::<MiniPy>::new();
        let mut chain = vec![f.root()];
        for _ in 0..depth {
            let child = f.create_node(PyKind::ClassDef).unwrap();
            f.add_edge(*chain.last().unwrap(), Edge::HasMember, child).unwrap();
            chain.push(child);
        }
        let target = chain[1 + pick_at % depth];

        f.set_filtered(target).unwrap();
        let once: Vec<bool> = chain.iter().map(|id| f.is_filtered(*id)).collect();
        f.set_filtered(target).unwrap();
        let twice: Vec<bool> = chain.iter().map(|id| f.is_filtered(*id)).collect();
        prop_assert_eq!(&once, &twice);

        f.set_not_filtered(target).unwrap();
        prop_assert!(!f.is_filtered(target));
    }
}
