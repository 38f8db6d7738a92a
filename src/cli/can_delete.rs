// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Can-delete command - report which pipelines are safe to remove

use colored::Colorize;
use miette::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{load_config, OutputFormat};
use crate::service::PipelineConfigService;
use crate::utils::{print_error, print_header, print_success};

/// Run the can-delete command
pub fn run(config_path: PathBuf, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = load_config(&config_path)?;
    let service = PipelineConfigService::from_config(&config);
    let results = service.can_delete_pipelines();

    match format {
        OutputFormat::Text => {
            print_header("Pipeline deletion");
            for (name, result) in &results {
                let line = format!("{}: {}", name.as_str().bold(), result.message);
                if result.can_delete {
                    print_success(&line);
                } else {
                    print_error(&line);
                }
            }
        }
        OutputFormat::Json => {
            let by_name: BTreeMap<&str, _> = results
                .iter()
                .map(|(name, result)| (name.as_str(), result))
                .collect();
            let json = serde_json::to_string_pretty(&by_name)
                .map_err(|e| miette::miette!("Failed to serialize report: {}", e))?;
            println!("{}", json);
        }
    }

    Ok(())
}
