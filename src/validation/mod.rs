// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Pipeline validation
//!
//! - [`ValidationContext`]: ancestry of the node being checked plus read access
//!   to one index snapshot
//! - [`Validatable`]: field-level rules owned by each node type
//! - [`DependencyCycleDetector`]: upstream-edge cycle search
//! - [`TreeValidator`]: the whole-pipeline pass tying the above together

mod context;
mod cycle;
mod rules;
mod tree;

pub use context::{ConfigNode, ValidationContext};
pub use cycle::{DependencyCycleDetector, DependencyState, ProposedDependencyState};
pub use rules::{check, is_inside_sandbox, is_valid_name, Validatable};
pub use tree::{JobReport, PipelineReport, StageReport, TreeValidator};
