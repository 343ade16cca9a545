//! Directed precedence graph over tasks with typed, lagged edges.
//!
//! Acyclicity is enforced at insertion time: every `insert` runs a
//! depth-first reachability check from the successor back to the
//! predecessor before touching adjacency, so a rejected edge leaves the
//! graph exactly as it was. Removal is unconditional since removing an
//! edge cannot introduce a cycle.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::models::{Dependency, DependencyKind};

/// Errors that can occur while editing the graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Dependency references unknown task: {task}")]
    UnknownTask { task: String },
    #[error(
        "Dependency {predecessor} -> {successor} would close the cycle: {}",
        path.join(" -> ")
    )]
    Cycle {
        predecessor: String,
        successor: String,
        /// Existing path from the successor back to the predecessor that
        /// the rejected edge would have closed into a loop.
        path: Vec<String>,
    },
}

/// Task precedence network with forward and backward adjacency.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DependencyGraph {
    tasks: FxHashSet<String>,
    /// Outgoing edges keyed by predecessor.
    successors: FxHashMap<String, Vec<Dependency>>,
    /// Incoming edges keyed by successor.
    predecessors: FxHashMap<String, Vec<Dependency>>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Empty graph over the given task ids.
    pub fn new(task_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            tasks: task_ids.into_iter().collect(),
            successors: FxHashMap::default(),
            predecessors: FxHashMap::default(),
            edge_count: 0,
        }
    }

    /// Build a graph from an edge list, validating each insertion.
    pub fn from_dependencies(
        task_ids: impl IntoIterator<Item = String>,
        dependencies: &[Dependency],
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new(task_ids);
        for dep in dependencies {
            graph.insert(dep.clone())?;
        }
        Ok(graph)
    }

    /// Insert an edge after verifying both endpoints exist and the edge
    /// does not create a cycle.
    ///
    /// The reachability check is O(V+E) per insertion, which is fine for
    /// interactively edited project graphs; scheduling passes never call
    /// this.
    pub fn insert(&mut self, dep: Dependency) -> Result<(), GraphError> {
        for endpoint in [&dep.predecessor, &dep.successor] {
            if !self.tasks.contains(endpoint.as_str()) {
                return Err(GraphError::UnknownTask {
                    task: endpoint.clone(),
                });
            }
        }

        if let Some(path) = self.path_between(&dep.successor, &dep.predecessor) {
            return Err(GraphError::Cycle {
                predecessor: dep.predecessor.clone(),
                successor: dep.successor.clone(),
                path,
            });
        }

        self.successors
            .entry(dep.predecessor.clone())
            .or_default()
            .push(dep.clone());
        self.predecessors
            .entry(dep.successor.clone())
            .or_default()
            .push(dep);
        self.edge_count += 1;
        Ok(())
    }

    /// Remove every edge matching (predecessor, successor, kind).
    ///
    /// Returns how many edges were removed.
    pub fn remove(&mut self, predecessor: &str, successor: &str, kind: DependencyKind) -> usize {
        let matches = |d: &Dependency| {
            d.predecessor == predecessor && d.successor == successor && d.kind == kind
        };

        let mut removed = 0;
        if let Some(edges) = self.successors.get_mut(predecessor) {
            let before = edges.len();
            edges.retain(|d| !matches(d));
            removed = before - edges.len();
        }
        if let Some(edges) = self.predecessors.get_mut(successor) {
            edges.retain(|d| !matches(d));
        }
        self.edge_count -= removed;
        removed
    }

    /// Outgoing edges of a task.
    pub fn successors(&self, task_id: &str) -> &[Dependency] {
        self.successors
            .get(task_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Incoming edges of a task.
    pub fn predecessors(&self, task_id: &str) -> &[Dependency] {
        self.predecessors
            .get(task_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains_task(&self, task_id: &str) -> bool {
        self.tasks.contains(task_id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(String::as_str)
    }

    /// Directed path from `from` to `to` along existing edges, if any.
    ///
    /// Iterative depth-first search with a parent map so the offending
    /// path can be reported on cycle rejection.
    fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut came_from: FxHashMap<&str, &str> = FxHashMap::default();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut stack: Vec<&str> = vec![from];
        visited.insert(from);

        while let Some(current) = stack.pop() {
            for edge in self.successors(current) {
                let next = edge.successor.as_str();
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, current);
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(&prev) = came_from.get(cursor) {
                        path.push(prev.to_string());
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                stack.push(next);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dependency;

    fn graph_abc() -> DependencyGraph {
        DependencyGraph::new(["a", "b", "c"].map(String::from))
    }

    fn fs(pred: &str, succ: &str) -> Dependency {
        Dependency::finish_to_start(pred, succ)
    }

    #[test]
    fn test_insert_and_adjacency() {
        let mut graph = graph_abc();
        graph.insert(fs("a", "b")).unwrap();
        graph.insert(fs("a", "c")).unwrap();

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.successors("a").len(), 2);
        assert_eq!(graph.predecessors("b").len(), 1);
        assert_eq!(graph.predecessors("a").len(), 0);
    }

    #[test]
    fn test_unknown_task_rejected() {
        let mut graph = graph_abc();
        let result = graph.insert(fs("a", "ghost"));
        assert_eq!(
            result,
            Err(GraphError::UnknownTask {
                task: "ghost".to_string(),
            })
        );
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_cycle_rejected_graph_unchanged() {
        let mut graph = graph_abc();
        graph.insert(fs("a", "b")).unwrap();
        graph.insert(fs("b", "c")).unwrap();

        let before = graph.clone();
        let result = graph.insert(fs("c", "a"));

        match result {
            Err(GraphError::Cycle { path, .. }) => {
                assert_eq!(path, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle rejection, got {:?}", other),
        }
        // Failed insertion leaves edge count and adjacency untouched
        assert_eq!(graph, before);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut graph = graph_abc();
        let result = graph.insert(fs("a", "a"));
        assert!(matches!(result, Err(GraphError::Cycle { .. })));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_remove_is_unconditional() {
        let mut graph = graph_abc();
        graph.insert(fs("a", "b")).unwrap();
        assert_eq!(graph.remove("a", "b", DependencyKind::FinishToStart), 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.successors("a").is_empty());
        assert!(graph.predecessors("b").is_empty());

        // Removing a missing edge is a no-op
        assert_eq!(graph.remove("a", "b", DependencyKind::FinishToStart), 0);
    }

    #[test]
    fn test_removed_edge_allows_reinsertion_both_ways() {
        let mut graph = graph_abc();
        graph.insert(fs("a", "b")).unwrap();
        graph.remove("a", "b", DependencyKind::FinishToStart);
        graph.insert(fs("b", "a")).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }
}
