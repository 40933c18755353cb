//! Object Type Dependency Graph
//!
//! petgraph view over the derived relationships. An edge `A -> B` means
//! objects of `A` point at objects of `B` (parent, site, group, dependency
//! or indirect dependency), so deleting a `B` affects `A`.
//! Handles cycles through strongly connected components.

pub(crate) mod derive;
pub mod references;

pub use references::{DependencyReference, ReferenceKind};

use petgraph::algo::{condensation, kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::dependency::DependencyKind;

/// Why one type points at another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Parent,
    Site,
    Group,
    Dependency(DependencyKind),
    Indirect,
}

/// Node in a closure result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureNode {
    pub object_type: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub in_cycle: bool,
}

/// The type dependency graph
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, EdgeKind>,
    /// Lowercased object type -> node
    node_indices: HashMap<String, NodeIndex>,
    /// Cycle groups (SCCs with more than one member)
    cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_type(&mut self, object_type: &str) {
        let key = object_type.to_ascii_lowercase();
        if !self.node_indices.contains_key(&key) {
            let idx = self.graph.add_node(object_type.to_string());
            self.node_indices.insert(key, idx);
        }
    }

    /// Add `from -> to`; edges to unregistered types are dropped
    pub(crate) fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) {
        let (Some(&a), Some(&b)) = (
            self.node_indices.get(&from.to_ascii_lowercase()),
            self.node_indices.get(&to.to_ascii_lowercase()),
        ) else {
            return;
        };
        let exists = self
            .graph
            .edges_connecting(a, b)
            .any(|e| *e.weight() == kind);
        if !exists {
            self.graph.add_edge(a, b, kind);
        }
    }

    /// Compute cycle groups once all edges are in
    pub(crate) fn finish(&mut self) {
        let mut cycles: Vec<Vec<String>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut names: Vec<String> = scc
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        self.cycles = cycles;
    }

    // ========== Public API ==========

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Types `object_type` points at
    pub fn refs_out(&self, object_type: &str) -> Vec<(&str, EdgeKind)> {
        self.neighbors(object_type, Direction::Outgoing)
    }

    /// Types pointing at `object_type`
    pub fn refs_in(&self, object_type: &str) -> Vec<(&str, EdgeKind)> {
        self.neighbors(object_type, Direction::Incoming)
    }

    fn neighbors(&self, object_type: &str, direction: Direction) -> Vec<(&str, EdgeKind)> {
        let Some(&node_idx) = self.node_indices.get(&object_type.to_ascii_lowercase()) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(node_idx, direction)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                self.graph
                    .node_weight(other)
                    .map(|name| (name.as_str(), *e.weight()))
            })
            .collect()
    }

    /// Transitive closure: everything `object_type` needs (`Outgoing`) or
    /// everything affected by it (`Incoming`)
    pub fn closure(
        &self,
        object_type: &str,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> Vec<ClosureNode> {
        let Some(&start_idx) = self.node_indices.get(&object_type.to_ascii_lowercase()) else {
            return Vec::new();
        };

        let in_cycle: HashSet<&str> = self
            .cycles
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();

        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = std::collections::VecDeque::from([(start_idx, 0usize)]);

        // Breadth first so each type is reported at its shortest depth
        while let Some((node_idx, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth > max) {
                continue;
            }
            if !visited.insert(node_idx) {
                continue;
            }

            if node_idx != start_idx {
                if let Some(name) = self.graph.node_weight(node_idx) {
                    result.push(ClosureNode {
                        object_type: name.clone(),
                        depth,
                        in_cycle: in_cycle.contains(name.as_str()),
                    });
                }
            }

            for edge in self.graph.edges_directed(node_idx, direction) {
                let next = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                queue.push_back((next, depth + 1));
            }
        }

        result
    }

    /// Groups of types that reference each other in a loop
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// Types ordered so every type comes after the types it points at.
    /// Members of a cycle are emitted together, sorted by name.
    pub fn dependency_order(&self) -> Vec<String> {
        let condensed = condensation(self.graph.clone(), true);
        let order = match toposort(&condensed, None) {
            Ok(order) => order,
            // Unreachable after condensation
            Err(_) => return Vec::new(),
        };

        order
            .into_iter()
            .rev()
            .flat_map(|idx| {
                let mut group = condensed[idx].clone();
                group.sort();
                group
            })
            .collect()
    }

    /// Export to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph ObjectTypes {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=\"rounded\", fontname=\"Helvetica\", fontsize=10];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8];\n\n");

        for name in self.graph.node_weights() {
            output.push_str(&format!("  \"{}\";\n", name));
        }

        output.push('\n');

        for edge in self.graph.edge_references() {
            if let (Some(source), Some(target)) = (
                self.graph.node_weight(edge.source()),
                self.graph.node_weight(edge.target()),
            ) {
                let (label, style) = match edge.weight() {
                    EdgeKind::Parent => ("parent", "solid"),
                    EdgeKind::Site => ("site", "dotted"),
                    EdgeKind::Group => ("group", "dotted"),
                    EdgeKind::Dependency(kind) if kind.is_required() => ("required", "solid"),
                    EdgeKind::Dependency(_) => ("optional", "dashed"),
                    EdgeKind::Indirect => ("indirect", "dashed"),
                };
                output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\", style={}];\n",
                    source, target, label, style
                ));
            }
        }

        output.push_str("}\n");
        output
    }
}
