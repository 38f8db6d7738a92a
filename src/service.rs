// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Pipeline configuration service
//!
//! The write side of the engine. Owns the [`ConfigIndex`], validates proposed
//! pipeline edits against one snapshot of it and commits the ones that pass.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::{CaseInsensitiveString, Configuration, Pipeline};
use crate::errors::{WardenError, WardenResult};
use crate::index::{ConfigIndex, IndexSnapshot};
use crate::validation::TreeValidator;

/// Whether a pipeline may be removed, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanDeleteResult {
    pub can_delete: bool,
    pub message: String,
}

/// Validates and commits pipeline edits
#[derive(Debug, Default)]
pub struct PipelineConfigService {
    index: ConfigIndex,
}

impl PipelineConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service over an initial configuration
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            index: ConfigIndex::from_config(config),
        }
    }

    pub fn index(&self) -> &ConfigIndex {
        &self.index
    }

    /// Copy of a committed pipeline, for editing
    pub fn get_pipeline(&self, name: &str) -> Option<Pipeline> {
        self.index
            .lookup_by_name(&name.into())
            .map(|entry| entry.pipeline.as_ref().clone())
    }

    /// Whole configuration replaced
    pub fn on_config_change(&self, config: &Configuration) {
        self.index.replace(config);
    }

    /// One pipeline added or updated outside this service
    pub fn on_pipeline_config_change(&self, pipeline: &Pipeline, group: &str) {
        self.index.upsert_pipeline(pipeline, group);
    }

    /// Validate without committing; errors are written into `pipeline`
    pub fn validate_pipeline(&self, pipeline: &mut Pipeline) -> bool {
        let snapshot = self.index.snapshot();
        TreeValidator::validate(pipeline, &snapshot)
    }

    /// Validate an edit of an existing pipeline and commit it when valid
    pub fn update_pipeline(&self, pipeline: &mut Pipeline, group: &str) -> WardenResult<()> {
        let snapshot = self.index.snapshot();
        if !snapshot.contains_pipeline(&pipeline.name) {
            return Err(WardenError::PipelineNotFound {
                name: pipeline.name.to_string(),
            });
        }
        self.commit(pipeline, group, &snapshot)
    }

    /// Validate a new pipeline and commit it when valid
    pub fn create_pipeline(&self, pipeline: &mut Pipeline, group: &str) -> WardenResult<()> {
        let snapshot = self.index.snapshot();
        if snapshot.contains_pipeline(&pipeline.name) {
            return Err(WardenError::DuplicatePipeline {
                name: pipeline.name.to_string(),
            });
        }
        self.commit(pipeline, group, &snapshot)
    }

    fn commit(
        &self,
        pipeline: &mut Pipeline,
        group: &str,
        snapshot: &IndexSnapshot,
    ) -> WardenResult<()> {
        if !TreeValidator::validate(pipeline, snapshot) {
            return Err(WardenError::ValidationFailed {
                pipeline: pipeline.name.to_string(),
                count: pipeline.collect_errors().len(),
            });
        }

        self.index.upsert_pipeline(pipeline, group);
        info!(pipeline = %pipeline.name, group, "pipeline saved");
        Ok(())
    }

    /// For every committed pipeline, whether deleting it would leave a dangling reference
    pub fn can_delete_pipelines(&self) -> BTreeMap<CaseInsensitiveString, CanDeleteResult> {
        let snapshot = self.index.snapshot();
        let mut results = BTreeMap::new();

        for name in snapshot.pipeline_names() {
            let result = if let Some(environment) = snapshot.environment_of(name) {
                CanDeleteResult {
                    can_delete: false,
                    message: format!(
                        "Cannot delete pipeline '{}' as it is present in environment '{}'.",
                        name, environment
                    ),
                }
            } else if let Some(downstream) = snapshot.downstream_of(name).iter().next() {
                CanDeleteResult {
                    can_delete: false,
                    message: format!(
                        "Cannot delete pipeline '{}' as pipeline '{}' depends on it.",
                        name, downstream
                    ),
                }
            } else {
                CanDeleteResult {
                    can_delete: true,
                    message: "Delete this pipeline.".to_string(),
                }
            };
            debug!(pipeline = %name, can_delete = result.can_delete, "delete check");
            results.insert(name.clone(), result);
        }

        results
    }
}
