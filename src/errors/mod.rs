// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Error types
//!
//! `WardenError` covers failures of the engine itself (loading a configuration,
//! committing a pipeline, walking the dependency graph). Problems found *in* a
//! pipeline definition are not errors in this sense: they are recorded as
//! [`ConfigErrors`](crate::config::ConfigErrors) on the offending node.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipewarden operations
pub type WardenResult<T> = Result<T, WardenError>;

/// Main error type for pipewarden
#[derive(Error, Debug, Diagnostic)]
pub enum WardenError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(pipewarden::config_not_found),
        help("Pass the path of a YAML, JSON or TOML configuration file")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipewarden::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Unsupported configuration format: {path}")]
    #[diagnostic(
        code(pipewarden::unsupported_format),
        help("Supported extensions: .yaml, .yml, .json, .toml")
    )]
    UnsupportedFormat { path: PathBuf },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline '{name}' not found")]
    #[diagnostic(code(pipewarden::pipeline_not_found))]
    PipelineNotFound { name: String },

    #[error("Pipeline '{name}' already exists")]
    #[diagnostic(
        code(pipewarden::duplicate_pipeline),
        help("Pipeline names are case-insensitive and must be unique across all groups")
    )]
    DuplicatePipeline { name: String },

    #[error("Pipeline '{pipeline}' failed validation with {count} error(s)")]
    #[diagnostic(code(pipewarden::validation_failed))]
    ValidationFailed { pipeline: String, count: usize },

    // ─────────────────────────────────────────────────────────────────────────
    // Dependency Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Circular dependency: {}", .path.join(" <- "))]
    #[diagnostic(
        code(pipewarden::circular_dependency),
        help("Remove one of the dependency materials that closes the loop")
    )]
    CircularDependency { path: Vec<String> },

    #[error("Pipeline '{pipeline}' does not exist. It is used from pipeline '{referenced_by}'.")]
    #[diagnostic(code(pipewarden::unknown_pipeline))]
    UnknownPipeline {
        pipeline: String,
        referenced_by: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Parse Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pipewarden::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(pipewarden::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(pipewarden::toml_error))]
    Toml { message: String },
}

impl From<serde_yaml::Error> for WardenError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for WardenError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl WardenError {
    /// Build a cycle error from the traversal stack and the name that closes it
    pub fn circular(stack: &[String], closing: &str) -> Self {
        let start = stack
            .iter()
            .position(|name| name.eq_ignore_ascii_case(closing))
            .unwrap_or(0);
        let mut path: Vec<String> = stack[start..].to_vec();
        path.push(closing.to_string());
        Self::CircularDependency { path }
    }
}
