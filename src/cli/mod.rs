// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipewarden.

pub mod can_delete;
pub mod graph;
pub mod materials;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;
use std::path::{Path, PathBuf};

use crate::config::Configuration;

/// Pipeline configuration checker
///
/// Validate CI/CD pipeline definitions against each other and inspect their
/// dependency graph.
#[derive(Parser, Debug)]
#[clap(
    name = "pipewarden",
    version,
    about = "Validate CI/CD pipeline configuration and its dependency graph",
    long_about = None,
    after_help = "Examples:\n\
        pipewarden validate pipelines.yaml               Validate every pipeline\n\
        pipewarden validate pipelines.yaml -p deploy     Validate one pipeline\n\
        pipewarden graph pipelines.yaml -f mermaid       Draw the dependency graph\n\
        pipewarden can-delete pipelines.yaml             Show which pipelines can be removed\n\n\
        See 'pipewarden <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate pipelines against the rest of the configuration
    Validate {
        /// Configuration file (.yaml, .yml, .json or .toml)
        config: PathBuf,

        /// Validate only this pipeline
        #[clap(short, long)]
        pipeline: Option<String>,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the pipeline dependency graph
    Graph {
        /// Configuration file
        config: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Show which pipelines can be deleted
    CanDelete {
        /// Configuration file
        config: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List materials by fingerprint and the pipelines using them
    Materials {
        /// Configuration file
        config: PathBuf,

        /// Only materials used by more than one pipeline
        #[clap(long)]
        shared: bool,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load a configuration file, rendering failures as diagnostics
pub(crate) fn load_config(path: &Path) -> Result<Configuration> {
    let config = Configuration::from_file(path)?;
    tracing::debug!(
        path = %path.display(),
        groups = config.groups.len(),
        templates = config.templates.len(),
        "configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_command() {
        let cli = Cli::parse_from(["pipewarden", "validate", "cfg.yaml", "-p", "deploy", "-f", "json"]);

        match cli.command {
            Commands::Validate {
                config,
                pipeline,
                format,
            } => {
                assert_eq!(config, PathBuf::from("cfg.yaml"));
                assert_eq!(pipeline.as_deref(), Some("deploy"));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_graph_format_default() {
        let cli = Cli::parse_from(["pipewarden", "graph", "cfg.yaml"]);

        assert!(matches!(
            cli.command,
            Commands::Graph {
                format: GraphFormat::Text,
                ..
            }
        ));
    }
}
