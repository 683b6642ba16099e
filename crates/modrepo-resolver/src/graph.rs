//! Dependency graph and topological ordering for deployment.
//!
//! Nodes are resource identities; an edge `A -> B` means A has a mandatory
//! requirement wired to B, so B must be installed first. The edges come
//! straight from the wiring recorded during resolution.
//!
//! # Example
//!
//! ```
//! use modrepo_resolver::graph::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("app");
//! graph.add_node("lib");
//! graph.add_edge("app", "lib");
//!
//! let order = graph.topological_order();
//! assert_eq!(order.order, vec!["lib", "app"]);
//! assert!(order.cycle.is_empty());
//! ```

use std::collections::{BTreeSet, HashMap};

/// Result of a topological sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologicalOrder {
    /// All node ids, dependencies first. Cycle members come last.
    pub order: Vec<String>,
    /// Ids that could not be ordered because they sit on (or behind) a cycle.
    pub cycle: Vec<String>,
}

/// Directed graph of resource identities.
///
/// Nodes remember insertion order; whenever several nodes are ready at once
/// the earliest inserted goes first.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// `edges[n]` holds the nodes `n` depends on.
    edges: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Adding an existing id is a no-op.
    pub fn add_node(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.index.contains_key(&id) {
            return;
        }
        self.index.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        self.edges.push(BTreeSet::new());
    }

    /// Declare that `from` depends on `to`.
    ///
    /// Edges touching unknown nodes and self-edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if let (Some(&from), Some(&to)) = (self.index.get(from), self.index.get(to)) {
            if from != to {
                self.edges[from].insert(to);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(BTreeSet::len).sum()
    }

    /// Direct dependencies of a node.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&n| self.edges[n].iter().map(|&d| self.ids[d].as_str()).collect())
            .unwrap_or_default()
    }

    /// Order nodes dependencies-first using Kahn's algorithm.
    ///
    /// Cycles do not fail the sort: nodes that cannot be ordered are
    /// appended in insertion order and reported in
    /// [`TopologicalOrder::cycle`].
    pub fn topological_order(&self) -> TopologicalOrder {
        let count = self.ids.len();
        let mut remaining: Vec<usize> = self.edges.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (node, deps) in self.edges.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&n| remaining[n] == 0).collect();
        let mut placed = vec![false; count];
        let mut result = TopologicalOrder::default();

        while let Some(node) = ready.pop_first() {
            placed[node] = true;
            result.order.push(self.ids[node].clone());
            for &dependent in &dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        for node in (0..count).filter(|&n| !placed[n]) {
            result.cycle.push(self.ids[node].clone());
            result.order.push(self.ids[node].clone());
        }

        if !result.cycle.is_empty() {
            tracing::warn!(
                participants = ?result.cycle,
                "Dependency cycle; falling back to insertion order for its members"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.topological_order().order.is_empty());
    }

    #[test]
    fn test_linear_chain() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_node("b");
        graph.add_node("c");
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");

        let sorted = graph.topological_order();
        assert_eq!(sorted.order, vec!["c", "b", "a"]);
        assert!(sorted.cycle.is_empty());
    }

    #[test]
    fn test_diamond_dependency() {
        let mut graph = DependencyGraph::new();
        for id in ["top", "left", "right", "base"] {
            graph.add_node(id);
        }
        graph.add_edge("top", "left");
        graph.add_edge("top", "right");
        graph.add_edge("left", "base");
        graph.add_edge("right", "base");

        let sorted = graph.topological_order();
        assert_eq!(sorted.order, vec!["base", "left", "right", "top"]);
    }

    #[test]
    fn test_independent_nodes_keep_insertion_order() {
        let mut graph = DependencyGraph::new();
        graph.add_node("zebra");
        graph.add_node("alpha");
        graph.add_node("mid");
        assert_eq!(graph.topological_order().order, vec!["zebra", "alpha", "mid"]);
    }

    #[test]
    fn test_cycle_is_appended_not_fatal() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_node("b");
        graph.add_node("free");
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");

        let sorted = graph.topological_order();
        assert_eq!(sorted.order, vec!["free", "a", "b"]);
        assert_eq!(sorted.cycle, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_and_self_edges_ignored() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_node("a");
        graph.add_edge("a", "a");
        graph.add_edge("a", "missing");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.dependencies_of("a").is_empty());
        assert!(graph.dependencies_of("missing").is_empty());
    }

    #[test]
    fn test_dependencies_of() {
        let mut graph = DependencyGraph::new();
        graph.add_node("multi");
        graph.add_node("x");
        graph.add_node("y");
        graph.add_edge("multi", "x");
        graph.add_edge("multi", "y");
        assert_eq!(graph.dependencies_of("multi"), vec!["x", "y"]);
    }
}
