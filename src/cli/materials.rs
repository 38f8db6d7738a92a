// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Materials command - list materials by fingerprint

use colored::Colorize;
use miette::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::load_config;
use crate::index::IndexSnapshot;
use crate::utils::{dimmed, print_bullet, print_section};

/// Run the materials command
pub fn run(config_path: PathBuf, shared: bool, verbose: bool) -> Result<()> {
    let config = load_config(&config_path)?;
    let snapshot = IndexSnapshot::build(&config);

    let mut entries: Vec<_> = snapshot
        .fingerprints()
        .filter_map(|(fingerprint, uses)| {
            let first = uses.first()?;
            let pipelines: BTreeSet<String> =
                uses.iter().map(|u| u.pipeline().name.to_string()).collect();
            (!shared || pipelines.len() > 1).then(|| (first.material().describe(), fingerprint, pipelines))
        })
        .collect();
    entries.sort();

    if entries.is_empty() {
        println!("{}", "No materials found.".yellow());
        return Ok(());
    }

    for (description, fingerprint, pipelines) in entries {
        print_section(&description);
        if verbose {
            println!("  {}", dimmed(fingerprint));
        }
        for pipeline in pipelines {
            print_bullet(&pipeline);
        }
    }

    Ok(())
}
