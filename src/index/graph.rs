// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Pipeline dependency graph view
//!
//! A petgraph rendering of the committed dependency edges, used for ordering
//! and visualisation. Validation-time cycle checks do not use it; see
//! [`crate::validation::DependencyCycleDetector`].

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use super::IndexSnapshot;
use crate::config::CaseInsensitiveString;
use crate::errors::WardenError;

/// Directed graph of pipelines, edges running upstream -> downstream
pub struct PipelineGraph {
    graph: DiGraph<CaseInsensitiveString, CaseInsensitiveString>,
    name_to_index: HashMap<CaseInsensitiveString, NodeIndex>,
}

impl PipelineGraph {
    /// Build the graph from an index snapshot
    ///
    /// Edges are labelled with the upstream stage the dependency material
    /// waits on. Upstream names that are not in the snapshot still get a node.
    pub fn build(snapshot: &IndexSnapshot) -> Self {
        let mut builder = Self {
            graph: DiGraph::new(),
            name_to_index: HashMap::new(),
        };

        for name in snapshot.pipeline_names() {
            builder.node(name);
        }

        for name in snapshot.pipeline_names() {
            let Some(pipeline) = snapshot.pipeline(name) else {
                continue;
            };
            let downstream = builder.node(name);
            for material in pipeline.materials.dependencies() {
                if let Some((upstream, stage)) = material.dependency_target() {
                    let upstream = builder.node(upstream);
                    builder.graph.add_edge(upstream, downstream, stage.clone());
                }
            }
        }

        builder
    }

    fn node(&mut self, name: &CaseInsensitiveString) -> NodeIndex {
        if let Some(index) = self.name_to_index.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.clone());
        self.name_to_index.insert(name.clone(), index);
        index
    }

    /// Pipelines ordered so every upstream comes before its downstreams
    pub fn topological_order_names(&self) -> Result<Vec<String>, WardenError> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n].to_string()).collect())
            .map_err(|cycle| WardenError::CircularDependency {
                path: vec![self.graph[cycle.node_id()].to_string()],
            })
    }

    /// Check if pipeline A depends (directly or transitively) on pipeline B
    pub fn depends_on(&self, a: &str, b: &str) -> bool {
        let (Some(node_a), Some(node_b)) = (
            self.name_to_index.get(&CaseInsensitiveString::from(a)),
            self.name_to_index.get(&CaseInsensitiveString::from(b)),
        ) else {
            return false;
        };

        node_a != node_b && has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Direct downstream pipelines of `name`
    pub fn dependents(&self, name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(&CaseInsensitiveString::from(name))?;
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Outgoing)
            .map(|n| self.graph[n].to_string())
            .collect();
        names.sort();
        names.dedup();
        Some(names)
    }

    /// Generate Mermaid diagram of the graph
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph LR\n");

        for name in self.sorted_names() {
            out.push_str(&format!("    {}[{}]\n", name, name));
        }

        for (from, to, stage) in self.sorted_edges() {
            out.push_str(&format!("    {} -->|{}| {}\n", from, stage, to));
        }

        out
    }

    /// Generate DOT diagram of the graph
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipelines {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to, stage) in self.sorted_edges() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                from, to, stage
            ));
        }

        // Isolated pipelines (no edges)
        for name in self.sorted_names() {
            let node = self.name_to_index[&CaseInsensitiveString::from(name.as_str())];
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", name));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation in dependency order
    pub fn to_text(&self) -> Result<String, WardenError> {
        let mut out = String::new();

        for (i, name) in self.topological_order_names()?.iter().enumerate() {
            let node = self.name_to_index[&CaseInsensitiveString::from(name.as_str())];
            let mut upstream: Vec<String> = self
                .graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .map(|n| self.graph[n].to_string())
                .collect();
            upstream.sort();
            upstream.dedup();

            out.push_str(&format!("{}. {}", i + 1, name));
            if !upstream.is_empty() {
                out.push_str(&format!(" [depends: {}]", upstream.join(", ")));
            }
            out.push('\n');
        }

        Ok(out)
    }

    fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<&CaseInsensitiveString> = self.name_to_index.keys().collect();
        names.sort();
        names.into_iter().map(|n| n.to_string()).collect()
    }

    fn sorted_edges(&self) -> Vec<(String, String, String)> {
        let mut edges: Vec<(String, String, String)> = self
            .graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].to_string(),
                    self.graph[edge.target()].to_string(),
                    edge.weight().to_string(),
                )
            })
            .collect();
        edges.sort();
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, Material, Pipeline, PipelineGroup};

    fn make_graph(pipelines: Vec<(&str, Vec<&str>)>) -> PipelineGraph {
        let mut group = PipelineGroup::new("group");
        for (name, upstreams) in pipelines {
            let mut pipeline = Pipeline::new(name);
            for upstream in upstreams {
                pipeline.materials.push(Material::dependency(upstream, "build"));
            }
            group.pipelines.push(pipeline);
        }
        let snapshot = IndexSnapshot::build(&Configuration::new().with_group(group));
        PipelineGraph::build(&snapshot)
    }

    #[test]
    fn test_linear_order() {
        let graph = make_graph(vec![("c", vec!["b"]), ("a", vec![]), ("b", vec!["a"])]);

        assert_eq!(graph.topological_order_names().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let graph = make_graph(vec![("a", vec!["b"]), ("b", vec!["a"])]);

        assert!(matches!(
            graph.topological_order_names(),
            Err(WardenError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_depends_on_check() {
        let graph = make_graph(vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])]);

        assert!(graph.depends_on("c", "a")); // transitive
        assert!(graph.depends_on("C", "B")); // direct, any case
        assert!(!graph.depends_on("a", "c")); // reverse
        assert!(!graph.depends_on("a", "missing"));
        assert_eq!(graph.dependents("a").unwrap(), vec!["b"]);
    }

    #[test]
    fn test_renderings() {
        let graph = make_graph(vec![("a", vec![]), ("b", vec!["a"]), ("solo", vec![])]);

        assert!(graph.to_mermaid().contains("a -->|build| b"));
        let dot = graph.to_dot();
        assert!(dot.contains("\"a\" -> \"b\" [label=\"build\"];"));
        assert!(dot.contains("    \"solo\";"));
        assert!(graph.to_text().unwrap().contains("[depends: a]"));
    }
}
