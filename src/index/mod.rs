// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Configuration index
//!
//! Keeps derived views over the committed configuration so validation can
//! answer "who is called X", "who else uses this material" and "who depends
//! on P" without rescanning every pipeline.
//!
//! Readers take an [`IndexSnapshot`] and keep it for as long as they need a
//! consistent view. Writers never touch a snapshot that is shared: `replace`
//! swaps in a freshly built one, and `upsert_pipeline` patches a private copy
//! (or the original, when nobody else holds it) under the write lock.

mod graph;
mod snapshot;

pub use graph::PipelineGraph;
pub use snapshot::{IndexSnapshot, MaterialUse, PipelineEntry};

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use crate::config::{CaseInsensitiveString, Configuration, Pipeline};

/// Shared handle to the current index snapshot
#[derive(Debug, Default)]
pub struct ConfigIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl ConfigIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index over a configuration
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::build(config))),
        }
    }

    /// The current snapshot; stays valid and unchanged while held
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Discard every table and rebuild from a whole configuration
    pub fn replace(&self, config: &Configuration) {
        let fresh = Arc::new(IndexSnapshot::build(config));
        let pipelines = fresh.len();
        *self.write() = fresh;
        tracing::info!(pipelines, "configuration index rebuilt");
    }

    /// Record a single added or updated pipeline
    ///
    /// Updates the current snapshot in place when nobody else holds it. While
    /// a reader still holds it, the whole snapshot is cloned first, so the cost
    /// is proportional to the configuration size rather than to one pipeline.
    pub fn upsert_pipeline(&self, pipeline: &Pipeline, group: &str) {
        let mut guard = self.write();
        Arc::make_mut(&mut *guard).upsert(pipeline.clone(), group);
        tracing::info!(pipeline = %pipeline.name, group, "pipeline index updated");
    }

    pub fn lookup_by_name(&self, name: &CaseInsensitiveString) -> Option<PipelineEntry> {
        self.snapshot().lookup_by_name(name).cloned()
    }

    pub fn lookup_by_fingerprint(&self, fingerprint: &str) -> Vec<MaterialUse> {
        self.snapshot().lookup_by_fingerprint(fingerprint).to_vec()
    }

    pub fn dependency_edges_for(
        &self,
        name: &CaseInsensitiveString,
    ) -> BTreeSet<CaseInsensitiveString> {
        self.snapshot().dependency_edges_for(name).clone()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<IndexSnapshot>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}
