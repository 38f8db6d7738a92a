// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Configuration model
//!
//! A [`Configuration`] is one snapshot of everything the server knows:
//! pipeline groups with their pipelines, templates, environments and the
//! server security settings.

mod errors;
mod material;
mod name;
mod pipeline;

pub use errors::{ConfigErrors, BASE};
pub use material::{Material, MaterialConfigs, MaterialSource};
pub use name::CaseInsensitiveString;
pub use pipeline::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{WardenError, WardenResult};

/// Full configuration snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub groups: Vec<PipelineGroup>,

    #[serde(default)]
    pub templates: Vec<PipelineTemplate>,

    #[serde(default)]
    pub environments: Vec<Environment>,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Named collection of pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineGroup {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
}

impl PipelineGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pipelines: Vec::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipelines.push(pipeline);
        self
    }
}

/// Agents environment a set of pipelines runs in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<CaseInsensitiveString>,
}

/// Server security settings, passed through to callers untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub admins: Vec<CaseInsensitiveString>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: CaseInsensitiveString,
    #[serde(default)]
    pub users: Vec<CaseInsensitiveString>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: PipelineGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_template(mut self, template: PipelineTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Load a configuration file, picking the format from its extension
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        if !path.exists() {
            return Err(WardenError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| WardenError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(WardenError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> WardenResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Every pipeline with the name of its group
    pub fn all_pipelines(&self) -> impl Iterator<Item = (&str, &Pipeline)> {
        self.groups
            .iter()
            .flat_map(|g| g.pipelines.iter().map(move |p| (g.name.as_str(), p)))
    }

    pub fn find_pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.all_pipelines()
            .map(|(_, p)| p)
            .find(|p| p.name.matches(name))
    }

    pub fn group_of(&self, name: &str) -> Option<&str> {
        self.all_pipelines()
            .find(|(_, p)| p.name.matches(name))
            .map(|(group, _)| group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
groups:
  - name: first
    pipelines:
      - name: build
        materials:
          - type: git
            url: https://example.com/app.git
        stages:
          - name: compile
            jobs:
              - name: make
                tasks:
                  - type: exec
                    command: make
templates:
  - name: deploy-template
environments:
  - name: production
    pipelines: [build]
"#;

    #[test]
    fn test_from_yaml() {
        let config = Configuration::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.group_of("BUILD"), Some("first"));
        assert!(config.find_pipeline("build").is_some());
        assert_eq!(config.templates[0].name.as_str(), "deploy-template");
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(SAMPLE.as_bytes())
            .unwrap();

        let config = Configuration::from_file(&path).unwrap();
        assert_eq!(config.all_pipelines().count(), 1);

        let unknown = dir.path().join("config.ini");
        std::fs::write(&unknown, "x").unwrap();
        assert!(matches!(
            Configuration::from_file(&unknown),
            Err(WardenError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Configuration::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(matches!(result, Err(WardenError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_unreadable_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.yaml");
        std::fs::create_dir(&path).unwrap();

        match Configuration::from_file(&path) {
            Err(WardenError::FileReadError { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected read failure, got {:?}", other),
        }
    }
}
