// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! pipewarden - pipeline configuration checker
//!
//! Validate CI/CD pipeline definitions and inspect their dependency graph.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipewarden::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipewarden=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate {
            config,
            pipeline,
            format,
        } => pipewarden::cli::validate::run(config, pipeline, format, cli.verbose),
        Commands::Graph { config, format } => {
            pipewarden::cli::graph::run(config, format, cli.verbose)
        }
        Commands::CanDelete { config, format } => {
            pipewarden::cli::can_delete::run(config, format, cli.verbose)
        }
        Commands::Materials { config, shared } => {
            pipewarden::cli::materials::run(config, shared, cli.verbose)
        }
    }
}
