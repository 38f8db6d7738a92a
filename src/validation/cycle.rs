// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Dependency cycle detection
//!
//! Depth-first walk over pipeline -> upstream edges. Where the edges come
//! from is pluggable through [`DependencyState`], which lets the pipeline
//! being edited contribute the edges of its proposed material set while every
//! other pipeline contributes its committed edges.

use std::collections::{btree_set, BTreeSet, HashMap};

use super::ValidationContext;
use crate::config::{CaseInsensitiveString, Pipeline};
use crate::errors::{WardenError, WardenResult};
use crate::index::IndexSnapshot;

/// Source of upstream edges for the cycle walk
pub trait DependencyState {
    /// Whether a pipeline of this name is known
    fn has_pipeline(&self, name: &CaseInsensitiveString) -> bool;

    /// Upstream pipelines `name` currently depends on
    fn dependencies_of(&self, name: &CaseInsensitiveString) -> BTreeSet<CaseInsensitiveString>;
}

/// Committed edges only
impl DependencyState for IndexSnapshot {
    fn has_pipeline(&self, name: &CaseInsensitiveString) -> bool {
        self.contains_pipeline(name)
    }

    fn dependencies_of(&self, name: &CaseInsensitiveString) -> BTreeSet<CaseInsensitiveString> {
        self.dependency_edges_for(name).clone()
    }
}

/// Committed edges, except for one pipeline whose proposed edges are used
pub struct ProposedDependencyState<'c, 'a> {
    pipeline: &'a Pipeline,
    context: &'c ValidationContext<'a>,
}

impl<'c, 'a> ProposedDependencyState<'c, 'a> {
    pub fn new(pipeline: &'a Pipeline, context: &'c ValidationContext<'a>) -> Self {
        Self { pipeline, context }
    }
}

impl DependencyState for ProposedDependencyState<'_, '_> {
    fn has_pipeline(&self, name: &CaseInsensitiveString) -> bool {
        &self.pipeline.name == name || self.context.pipeline_by_name(name).is_some()
    }

    fn dependencies_of(&self, name: &CaseInsensitiveString) -> BTreeSet<CaseInsensitiveString> {
        if &self.pipeline.name == name {
            self.pipeline.dependencies()
        } else {
            self.context.dependency_materials_for(name).clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnStack,
    Done,
}

/// A pipeline on the current path and the upstreams still to explore
type Frame = (CaseInsensitiveString, btree_set::IntoIter<CaseInsensitiveString>);

/// Depth-first cycle detector
///
/// The walk keeps its own frame stack, so chain length is bounded by memory
/// rather than by the thread stack.
pub struct DependencyCycleDetector<'s> {
    state: &'s dyn DependencyState,
    visits: HashMap<CaseInsensitiveString, Visit>,
    frames: Vec<Frame>,
}

impl<'s> DependencyCycleDetector<'s> {
    pub fn new(state: &'s dyn DependencyState) -> Self {
        Self {
            state,
            visits: HashMap::new(),
            frames: Vec::new(),
        }
    }

    /// Walk everything reachable upstream of `root`
    ///
    /// Fails on the first edge that leads back onto the current path, or on an
    /// edge to a pipeline the state does not know.
    pub fn detect_cycle(
        root: &CaseInsensitiveString,
        state: &'s dyn DependencyState,
    ) -> WardenResult<()> {
        Self::new(state).walk(root)
    }

    fn walk(&mut self, root: &CaseInsensitiveString) -> WardenResult<()> {
        self.enter(root)?;

        while let Some((name, upstreams)) = self.frames.last_mut() {
            let Some(upstream) = upstreams.next() else {
                if let Some((done, _)) = self.frames.pop() {
                    self.visits.insert(done, Visit::Done);
                }
                continue;
            };
            if !self.state.has_pipeline(&upstream) {
                return Err(WardenError::UnknownPipeline {
                    pipeline: upstream.to_string(),
                    referenced_by: name.to_string(),
                });
            }
            self.enter(&upstream)?;
        }

        Ok(())
    }

    fn enter(&mut self, name: &CaseInsensitiveString) -> WardenResult<()> {
        match self.visits.get(name) {
            Some(Visit::OnStack) => {
                let path: Vec<String> = self.frames.iter().map(|(n, _)| n.to_string()).collect();
                return Err(WardenError::circular(&path, name.as_str()));
            }
            Some(Visit::Done) => return Ok(()),
            None => {}
        }

        self.visits.insert(name.clone(), Visit::OnStack);
        let upstreams = self.state.dependencies_of(name).into_iter();
        self.frames.push((name.clone(), upstreams));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Edges(HashMap<CaseInsensitiveString, BTreeSet<CaseInsensitiveString>>);

    impl Edges {
        fn of(edges: &[(&str, &[&str])]) -> Self {
            Self(
                edges
                    .iter()
                    .map(|(name, ups)| {
                        (
                            CaseInsensitiveString::from(*name),
                            ups.iter().map(|u| CaseInsensitiveString::from(*u)).collect(),
                        )
                    })
                    .collect(),
            )
        }
    }

    impl DependencyState for Edges {
        fn has_pipeline(&self, name: &CaseInsensitiveString) -> bool {
            self.0.contains_key(name)
        }

        fn dependencies_of(&self, name: &CaseInsensitiveString) -> BTreeSet<CaseInsensitiveString> {
            self.0.get(name).cloned().unwrap_or_default()
        }
    }

    fn detect(state: &Edges, root: &str) -> WardenResult<()> {
        DependencyCycleDetector::detect_cycle(&root.into(), state)
    }

    #[test]
    fn test_acyclic_chain_and_diamond() {
        let state = Edges::of(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);

        assert!(detect(&state, "d").is_ok());
    }

    #[test]
    fn test_cycle_names_closing_edge() {
        let state = Edges::of(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"])]);

        match detect(&state, "a") {
            Err(WardenError::CircularDependency { path }) => {
                assert_eq!(path, vec!["a", "c", "b", "a"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let state = Edges::of(&[("solo", &["SOLO"])]);

        match detect(&state, "solo") {
            Err(WardenError::CircularDependency { path }) => assert_eq!(path.len(), 2),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_upstream_is_reported_not_fatal() {
        let state = Edges::of(&[("a", &["ghost"])]);

        assert!(matches!(
            detect(&state, "a"),
            Err(WardenError::UnknownPipeline { pipeline, referenced_by })
                if pipeline == "ghost" && referenced_by == "a"
        ));
    }

    fn chain(length: usize) -> Edges {
        let names: Vec<String> = (0..length).map(|i| format!("p{}", i)).collect();
        let mut edges = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            let upstreams = match i {
                0 => BTreeSet::new(),
                _ => BTreeSet::from([CaseInsensitiveString::from(names[i - 1].as_str())]),
            };
            edges.insert(CaseInsensitiveString::from(name.as_str()), upstreams);
        }
        Edges(edges)
    }

    #[test]
    fn test_long_acyclic_chain() {
        let state = chain(50_000);

        assert!(detect(&state, "p49999").is_ok());
    }

    #[test]
    fn test_long_chain_closed_into_a_cycle() {
        let mut state = chain(20_000);
        state.0.insert("p0".into(), BTreeSet::from(["p19999".into()]));

        match detect(&state, "p19999") {
            Err(WardenError::CircularDependency { path }) => {
                assert_eq!(path.len(), 20_001);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_not_through_root_is_still_found() {
        let state = Edges::of(&[("root", &["x"]), ("x", &["y"]), ("y", &["x"])]);

        assert!(matches!(
            detect(&state, "root"),
            Err(WardenError::CircularDependency { .. })
        ));
    }
}
