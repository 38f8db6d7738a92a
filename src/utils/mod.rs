// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Utility modules
//!
//! Terminal output helpers for the pipewarden CLI.

pub mod colors;

pub use colors::*;
