// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! # pipewarden - pipeline configuration validation
//!
//! `pipewarden` checks CI/CD pipeline definitions in the context of the whole
//! server configuration and keeps the derived indices that make those checks
//! cheap.
//!
//! ## Features
//!
//! - **Tree validation** - Every stage, job, task and material of a pipeline
//!   is checked in the context of its ancestors
//! - **Cross-pipeline checks** - An edit that would break a downstream
//!   dependency or fetch task is reported on the edited pipeline
//! - **Cycle detection** - Over the proposed, not yet committed, dependency edges
//! - **Configuration index** - Lookups by name, material fingerprint and
//!   dependency edge, swapped atomically on change
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate every pipeline and template
//! pipewarden validate pipelines.yaml
//!
//! # Draw the dependency graph
//! pipewarden graph pipelines.yaml --format mermaid
//!
//! # Which pipelines can be removed safely
//! pipewarden can-delete pipelines.yaml
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod index;
pub mod service;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use config::{CaseInsensitiveString, ConfigErrors, Configuration, Material, Pipeline, Stage};
pub use errors::{WardenError, WardenResult};
pub use index::{ConfigIndex, IndexSnapshot, PipelineGraph};
pub use service::{CanDeleteResult, PipelineConfigService};
pub use validation::{TreeValidator, ValidationContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
