// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Per-node validation errors

use serde::Serialize;

/// Field name used for errors that do not belong to a single attribute
pub const BASE: &str = "base";

/// Ordered mapping of field name to the messages recorded against it
///
/// Fields keep the order in which they first received a message, and messages
/// keep the order they were added in. Nothing is deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.fields.push((field.to_string(), vec![message])),
        }
    }

    /// Messages recorded against `field`, empty when there are none
    pub fn on(&self, field: &str) -> &[String] {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or(&[])
    }

    /// Every message across all fields, in field order
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .flat_map(|(_, messages)| messages.iter().map(String::as_str))
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total number of messages
    pub fn len(&self) -> usize {
        self.fields.iter().map(|(_, messages)| messages.len()).sum()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keep_insertion_order_without_dedup() {
        let mut errors = ConfigErrors::new();
        errors.add("template", "first");
        errors.add("stages", "second");
        errors.add("template", "first");

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["template", "stages"]);
        assert_eq!(errors.on("template"), ["first", "first"]);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_unknown_field_is_empty() {
        let errors = ConfigErrors::new();
        assert!(errors.on("name").is_empty());
        assert!(errors.is_empty());
    }
}
