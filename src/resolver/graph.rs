//! Target graph view for introspection.
//!
//! Edges point from a target to what it depends on, and from a hook to its
//! subject. The view is read-only and built on demand from a [`Registry`].

use std::collections::HashMap;
use std::fmt;

use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::registry::Registry;
use crate::core::target::HookKind;

/// Kind of relation between two targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    DependsOn,
    Hook(HookKind),
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::DependsOn => write!(f, "depends on"),
            Edge::Hook(kind) => write!(f, "{}", kind),
        }
    }
}

/// Dependency and hook graph over registered targets.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    graph: DiGraph<String, Edge>,
    nodes: HashMap<String, NodeIndex>,
}

impl TargetGraph {
    /// Build the graph. Dangling references are left out; they are reported
    /// by [`Registry::validate`].
    pub fn from_registry(registry: &Registry) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for name in registry.names() {
            let node = graph.add_node(name.to_string());
            nodes.insert(name.to_string(), node);
        }

        for target in registry.targets() {
            let from = nodes[target.name()];
            for dep in target.deps() {
                if let Some(&to) = nodes.get(dep) {
                    graph.add_edge(from, to, Edge::DependsOn);
                }
            }
            if let Some((kind, subject)) = target.role().hook() {
                if let Some(&to) = nodes.get(subject) {
                    graph.add_edge(from, to, Edge::Hook(kind));
                }
            }
        }

        TargetGraph { graph, nodes }
    }

    /// Targets that list `name` as a dependency. Hooks are not included.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(&node) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .filter(|edge| *edge.weight() == Edge::DependsOn)
            .map(|edge| self.graph[edge.source()].as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Render as Graphviz DOT.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.graph))
    }
}
