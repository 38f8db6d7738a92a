// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Terminal color utilities
//!
//! Provides consistent styling across the CLI reports. The `colored` crate
//! honours `NO_COLOR` and `CLICOLOR` on its own.

use colored::Colorize;

/// Style for dimmed/secondary text
pub fn dimmed(msg: &str) -> colored::ColoredString {
    msg.dimmed()
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.len().max(40)));
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Print a bullet point
pub fn print_bullet(content: &str) {
    println!("  • {}", content);
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}
