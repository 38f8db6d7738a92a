// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Validate command - check pipelines against the whole configuration

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;

use super::{load_config, OutputFormat};
use crate::config::NodeError;
use crate::errors::WardenError;
use crate::service::PipelineConfigService;
use crate::utils::{print_error, print_success};
use crate::validation::TreeValidator;

#[derive(Debug, Serialize)]
struct Outcome {
    kind: &'static str,
    name: String,
    group: Option<String>,
    valid: bool,
    errors: Vec<NodeError>,
}

/// Run the validate command
pub fn run(
    config_path: PathBuf,
    only: Option<String>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = load_config(&config_path)?;
    let service = PipelineConfigService::from_config(&config);

    if let Some(name) = &only {
        if config.find_pipeline(name).is_none() {
            return Err(WardenError::PipelineNotFound { name: name.clone() }.into());
        }
    }

    let mut outcomes = Vec::new();

    if only.is_none() {
        let snapshot = service.index().snapshot();
        for template in &config.templates {
            let mut template = template.clone();
            let valid = TreeValidator::validate_template(&mut template, &snapshot);
            outcomes.push(Outcome {
                kind: "template",
                name: template.name.to_string(),
                group: None,
                valid,
                errors: template.collect_errors(),
            });
        }
    }

    for (group, pipeline) in config.all_pipelines() {
        if let Some(name) = &only {
            if !pipeline.name.matches(name) {
                continue;
            }
        }
        let mut pipeline = pipeline.clone();
        let valid = service.validate_pipeline(&mut pipeline);
        outcomes.push(Outcome {
            kind: "pipeline",
            name: pipeline.name.to_string(),
            group: Some(group.to_string()),
            valid,
            errors: pipeline.collect_errors(),
        });
    }

    match format {
        OutputFormat::Text => print_text(&outcomes, verbose),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&outcomes)
                .map_err(|e| miette::miette!("Failed to serialize report: {}", e))?;
            println!("{}", json);
        }
    }

    let failed = outcomes.iter().filter(|o| !o.valid).count();
    if failed > 0 {
        Err(miette::miette!(
            "{} of {} definition(s) failed validation",
            failed,
            outcomes.len()
        ))
    } else {
        Ok(())
    }
}

fn print_text(outcomes: &[Outcome], verbose: bool) {
    println!("{}", "Validating configuration...".bold());
    println!();

    for outcome in outcomes {
        let label = match &outcome.group {
            Some(group) if verbose => format!("{} '{}' ({})", outcome.kind, outcome.name, group),
            _ => format!("{} '{}'", outcome.kind, outcome.name),
        };
        if outcome.valid {
            print_success(&label);
            continue;
        }
        print_error(&label);
        for error in &outcome.errors {
            println!(
                "      {} [{}]: {}",
                error.location.dimmed(),
                error.field.yellow(),
                error.message
            );
        }
    }

    println!();
    if outcomes.iter().all(|o| o.valid) {
        println!("{}", "Configuration is valid!".green().bold());
    }
}
