// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Case-insensitive names
//!
//! Pipeline, stage, job and material names compare without regard to ASCII
//! case but keep the spelling the user wrote for display.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A name compared, ordered and hashed without regard to ASCII case
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseInsensitiveString(String);

impl CaseInsensitiveString {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as originally written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_lower(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Case-insensitive comparison against a plain string
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq for CaseInsensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CaseInsensitiveString {}

impl Hash for CaseInsensitiveString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl Ord for CaseInsensitiveString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes()
            .map(|b| b.to_ascii_lowercase())
            .cmp(other.0.bytes().map(|b| b.to_ascii_lowercase()))
    }
}

impl PartialOrd for CaseInsensitiveString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CaseInsensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseInsensitiveString {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CaseInsensitiveString {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_case() {
        assert_eq!(CaseInsensitiveString::from("Build"), CaseInsensitiveString::from("bUILD"));
        assert_ne!(CaseInsensitiveString::from("build"), CaseInsensitiveString::from("builds"));
    }

    #[test]
    fn test_hash_agrees_with_equality() {
        let mut set = HashSet::new();
        set.insert(CaseInsensitiveString::from("Deploy"));

        assert!(set.contains(&CaseInsensitiveString::from("DEPLOY")));
    }

    #[test]
    fn test_display_keeps_spelling() {
        assert_eq!(CaseInsensitiveString::from("MyPipe").to_string(), "MyPipe");
    }
}
