//! Export of the visible graph to a petgraph `StableGraph`.
//!
//! Used for DOT rendering and for running petgraph algorithms over a
//! snapshot. Filtered nodes and relations touching them are left out.

use std::collections::HashMap;
use std::fmt;

use petgraph::dot::Dot;
use petgraph::stable_graph::{NodeIndex, StableGraph};

use crate::factory::Factory;
use crate::id::NodeId;
use crate::schema::Schema;

/// Node weight of an exported graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportNode<K> {
    pub id: NodeId,
    pub kind: K,
}

impl<K: fmt::Display> fmt::Display for ExportNode<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}

pub struct ExportedGraph<S: Schema> {
    pub graph: StableGraph<ExportNode<S::Kind>, S::Edge>,
    pub index: HashMap<NodeId, NodeIndex>,
}

impl<S: Schema> ExportedGraph<S> {
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.graph))
    }
}

pub fn to_stable_graph<S: Schema>(factory: &Factory<S>) -> ExportedGraph<S> {
    let mut graph = StableGraph::new();
    let mut index = HashMap::new();
    for node in factory.iter() {
        let ix = graph.add_node(ExportNode {
            id: node.id(),
            kind: node.kind(),
        });
        index.insert(node.id(), ix);
    }
    for node in factory.iter() {
        let source = index[&node.id()];
        for (edge, target) in node.edges() {
            if let Some(&target) = index.get(target) {
                graph.add_edge(source, target, *edge);
            }
        }
    }
    ExportedGraph { graph, index }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minipy::{Edge, MiniPy};

    #[test]
    fn exports_visible_nodes_and_edges() {
        let mut f = Factory::<MiniPy>::new();
        let module = f.create_module_node().unwrap();
        f.add_edge(f.root(), Edge::HasModule, module).unwrap();
        let func = f.create_function_def_node().unwrap();
        f.add_edge(module, Edge::HasMember, func).unwrap();
        let call = f.create_call_node().unwrap();
        f.add_edge(call, Edge::Calls, func).unwrap();

        let exported = to_stable_graph(&f);
        assert_eq!(exported.graph.node_count(), 4);
        assert_eq!(exported.graph.edge_count(), 3);
        let ix = exported.index[&func];
        assert_eq!(exported.graph[ix].kind.to_string(), "FunctionDef");

        f.set_filtered(module).unwrap();
        let exported = to_stable_graph(&f);
        assert_eq!(exported.graph.node_count(), 2);
        assert_eq!(exported.graph.edge_count(), 0);
    }

    #[test]
    fn dot_labels_carry_kind_and_id() {
        let f = Factory::<MiniPy>::new();
        let dot = to_stable_graph(&f).to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("Compilation #100"));
    }
}
