//! Population statistics of a graph, for diagnostics.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::factory::Factory;
use crate::schema::{Kind, Schema};

/// Per-kind node counts and per-relation edge counts of one graph.
///
/// Only non-zero counts are listed, in schema declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsgStat {
    pub language: String,
    pub arena_size: usize,
    pub live_nodes: usize,
    pub free_ids: usize,
    pub filtered: usize,
    pub nodes: IndexMap<String, usize>,
    pub edges: IndexMap<String, usize>,
}

impl AsgStat {
    /// Counts every live node, filtered or not.
    pub fn collect<S: Schema>(factory: &Factory<S>) -> Self {
        let mut kinds: HashMap<S::Kind, usize> = HashMap::new();
        let mut relations: HashMap<S::Edge, usize> = HashMap::new();
        for node in factory.iter_all() {
            *kinds.entry(node.kind()).or_default() += 1;
            for (edge, _) in node.edges() {
                *relations.entry(*edge).or_default() += 1;
            }
        }

        AsgStat {
            language: S::LANGUAGE.to_string(),
            arena_size: factory.len(),
            live_nodes: factory.node_count(),
            free_ids: factory.free_ids().count(),
            filtered: factory.filtered_count(),
            nodes: ordered(&kinds),
            edges: ordered(&relations),
        }
    }
}

fn ordered<K: Kind>(counts: &HashMap<K, usize>) -> IndexMap<String, usize> {
    K::all()
        .iter()
        .filter_map(|k| counts.get(k).map(|n| (k.name().to_string(), *n)))
        .collect()
}

impl fmt::Display for AsgStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} graph: {} live nodes in {} slots, {} free, {} filtered",
            self.language, self.live_nodes, self.arena_size, self.free_ids, self.filtered
        )?;
        writeln!(f, "nodes")?;
        for (name, count) in &self.nodes {
            writeln!(f, "  {:<16} {}", name, count)?;
        }
        writeln!(f, "edges")?;
        for (name, count) in &self.edges {
            writeln!(f, "  {:<16} {}", name, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minipy::{Edge, MiniPy, PyKind, ALL_EDGES};

    fn sample() -> Factory<MiniPy> {
        let mut f = Factory::<MiniPy>::new();
        let module = f.create_module_node().unwrap();
        f.add_edge(f.root(), Edge::HasModule, module).unwrap();
        let func = f
            .create_named(module, Edge::HasMember, PyKind::FunctionDef, "run")
            .unwrap();
        let param = f
            .create_named(func, Edge::HasParameter, PyKind::Parameter, "n")
            .unwrap();
        let int = f.int_type().unwrap();
        f.add_edge(param, Edge::HasType, int).unwrap();
        let stmt = f.create_statement_node().unwrap();
        f.add_edge(func, Edge::HasBody, stmt).unwrap();
        f
    }

    #[test]
    fn counts_in_declaration_order() {
        let stat = AsgStat::collect(&sample());
        assert_eq!(stat.live_nodes, 6);
        assert_eq!(stat.arena_size, 106);
        assert_eq!(
            stat.nodes.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Compilation", "Module", "FunctionDef", "Parameter", "Statement", "IntType"]
        );
        assert_eq!(stat.edges["HasType"], 1);
        assert!(!stat.edges.contains_key("Calls"));
    }

    #[test]
    fn report_text() {
        let mut f = sample();
        f.enable_reverse_edges(ALL_EDGES);
        f.destroy_subtree(crate::NodeId(105)).unwrap();
        f.set_filtered(crate::NodeId(101)).unwrap();
        insta::assert_snapshot!(AsgStat::collect(&f).to_string(), @r"
        MiniPy graph: 5 live nodes in 106 slots, 1 free, 3 filtered
        nodes
          Compilation      1
          Module           1
          FunctionDef      1
          Parameter        1
          IntType          1
        edges
          HasModule        1
          HasMember        1
          HasParameter     1
          HasType          1
        ");
    }

    #[test]
    fn serializes_to_json() {
        let stat = AsgStat::collect(&Factory::<MiniPy>::new());
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["language"], "MiniPy");
        assert_eq!(json["nodes"]["Compilation"], 1);
        assert_eq!(json["edges"], serde_json::json!({}));
    }
}
