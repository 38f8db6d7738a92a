// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Graph command - visualize pipeline dependencies as a graph

use miette::Result;
use std::path::PathBuf;

use super::{load_config, GraphFormat};
use crate::index::{IndexSnapshot, PipelineGraph};

/// Run the graph command
pub fn run(config_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    let config = load_config(&config_path)?;
    let snapshot = IndexSnapshot::build(&config);

    let graph = PipelineGraph::build(&snapshot);

    // Output in requested format
    let output = match format {
        GraphFormat::Text => graph.to_text()?,
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    println!("{}", output);

    Ok(())
}
