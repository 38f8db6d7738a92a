// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Material definitions
//!
//! A material is an input a pipeline polls for changes. Its fingerprint is a
//! BLAKE3 digest over the attributes that identify the external source, so two
//! pipelines declaring the same repository share a fingerprint regardless of
//! the local name or checkout folder they give it.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

use super::{CaseInsensitiveString, ConfigErrors};

/// A single declared material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Where the material comes from
    #[serde(flatten)]
    pub source: MaterialSource,

    /// Local name of the material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CaseInsensitiveString>,

    /// Checkout folder, relative to the agent working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Poll for new revisions automatically
    #[serde(default = "default_auto_update")]
    pub auto_update: bool,

    #[serde(skip)]
    pub errors: ConfigErrors,
}

fn default_auto_update() -> bool {
    true
}

fn default_branch() -> String {
    "master".to_string()
}

/// Material source specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialSource {
    Git {
        url: String,
        #[serde(default = "default_branch")]
        branch: String,
    },
    Svn {
        url: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        check_externals: bool,
    },
    Hg {
        url: String,
    },
    P4 {
        port: String,
        view: String,
        #[serde(default)]
        username: Option<String>,
    },
    Tfs {
        url: String,
        #[serde(default)]
        domain: Option<String>,
        project_path: String,
        #[serde(default)]
        username: Option<String>,
    },
    /// Output of a stage of another pipeline
    Dependency {
        pipeline: CaseInsensitiveString,
        stage: CaseInsensitiveString,
    },
    Package {
        package_id: String,
    },
    PluggableScm {
        scm_id: String,
    },
}

impl Material {
    pub fn new(source: MaterialSource) -> Self {
        Self {
            source,
            name: None,
            destination: None,
            auto_update: true,
            errors: ConfigErrors::new(),
        }
    }

    pub fn git(url: &str) -> Self {
        Self::new(MaterialSource::Git {
            url: url.to_string(),
            branch: default_branch(),
        })
    }

    pub fn dependency(pipeline: &str, stage: &str) -> Self {
        Self::new(MaterialSource::Dependency {
            pipeline: pipeline.into(),
            stage: stage.into(),
        })
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Stable identity of the external source
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.type_name().as_bytes());

        let mut part = |value: &str| {
            hasher.update(b"<|>");
            hasher.update(value.as_bytes());
        };

        match &self.source {
            MaterialSource::Git { url, branch } => {
                part(url);
                part(branch);
            }
            MaterialSource::Svn {
                url,
                username,
                check_externals,
            } => {
                part(url);
                part(username.as_deref().unwrap_or_default());
                part(if *check_externals { "true" } else { "false" });
            }
            MaterialSource::Hg { url } => part(url),
            MaterialSource::P4 {
                port,
                view,
                username,
            } => {
                part(port);
                part(view);
                part(username.as_deref().unwrap_or_default());
            }
            MaterialSource::Tfs {
                url,
                domain,
                project_path,
                username,
            } => {
                part(url);
                part(domain.as_deref().unwrap_or_default());
                part(project_path);
                part(username.as_deref().unwrap_or_default());
            }
            MaterialSource::Dependency { pipeline, stage } => {
                part(&pipeline.to_lower());
                part(&stage.to_lower());
            }
            MaterialSource::Package { package_id } => part(package_id),
            MaterialSource::PluggableScm { scm_id } => part(scm_id),
        }

        hasher.finalize().to_hex().to_string()
    }

    /// Short type tag, also used as the display name in error messages
    pub fn type_name(&self) -> &'static str {
        match &self.source {
            MaterialSource::Git { .. } => "git",
            MaterialSource::Svn { .. } => "svn",
            MaterialSource::Hg { .. } => "hg",
            MaterialSource::P4 { .. } => "p4",
            MaterialSource::Tfs { .. } => "tfs",
            MaterialSource::Dependency { .. } => "pipeline",
            MaterialSource::Package { .. } => "package",
            MaterialSource::PluggableScm { .. } => "scm",
        }
    }

    /// Upstream pipeline and stage of a dependency material
    pub fn dependency_target(&self) -> Option<(&CaseInsensitiveString, &CaseInsensitiveString)> {
        match &self.source {
            MaterialSource::Dependency { pipeline, stage } => Some((pipeline, stage)),
            _ => None,
        }
    }

    pub fn is_dependency(&self) -> bool {
        self.dependency_target().is_some()
    }

    /// Source-control URL, for the kinds that have one
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            MaterialSource::Git { url, .. }
            | MaterialSource::Svn { url, .. }
            | MaterialSource::Hg { url }
            | MaterialSource::Tfs { url, .. } => Some(url),
            MaterialSource::P4 { port, .. } => Some(port),
            _ => None,
        }
    }

    /// Whether this is a version-control material polled directly by the server
    pub fn is_scm(&self) -> bool {
        self.url().is_some()
    }

    /// Declared name, or the upstream pipeline name for dependency materials
    pub fn effective_name(&self) -> Option<&CaseInsensitiveString> {
        self.name
            .as_ref()
            .or_else(|| self.dependency_target().map(|(pipeline, _)| pipeline))
    }

    /// Human-readable description used in messages
    pub fn describe(&self) -> String {
        match &self.source {
            MaterialSource::Dependency { pipeline, stage } => format!("{} [{}]", pipeline, stage),
            MaterialSource::Package { package_id } => format!("Package ({})", package_id),
            MaterialSource::PluggableScm { scm_id } => format!("SCM ({})", scm_id),
            _ => format!(
                "{} ({})",
                self.type_name().to_uppercase(),
                self.url().unwrap_or_default()
            ),
        }
    }
}

/// The material collection of a pipeline
///
/// Carries its own error bucket for problems that concern the collection as a
/// whole, such as a dependency cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Material>", into = "Vec<Material>")]
pub struct MaterialConfigs {
    items: Vec<Material>,
    pub errors: ConfigErrors,
}

impl MaterialConfigs {
    pub fn new(items: Vec<Material>) -> Self {
        Self {
            items,
            errors: ConfigErrors::new(),
        }
    }

    pub fn push(&mut self, material: Material) {
        self.items.push(material);
    }

    pub fn retain(&mut self, keep: impl FnMut(&Material) -> bool) {
        self.items.retain(keep);
    }

    /// Dependency materials only
    pub fn dependencies(&self) -> impl Iterator<Item = &Material> {
        self.items.iter().filter(|m| m.is_dependency())
    }
}

impl Deref for MaterialConfigs {
    type Target = [Material];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl DerefMut for MaterialConfigs {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

impl From<Vec<Material>> for MaterialConfigs {
    fn from(items: Vec<Material>) -> Self {
        Self::new(items)
    }
}

impl From<MaterialConfigs> for Vec<Material> {
    fn from(configs: MaterialConfigs) -> Self {
        configs.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_local_name_and_folder() {
        let mut a = Material::git("https://example.com/repo.git").named("app");
        a.destination = Some("src".into());
        let b = Material::git("https://example.com/repo.git");

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_differs_by_branch() {
        let a = Material::git("https://example.com/repo.git");
        let b = Material::new(MaterialSource::Git {
            url: "https://example.com/repo.git".into(),
            branch: "release".into(),
        });

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_dependency_fingerprint_is_case_insensitive() {
        assert_eq!(
            Material::dependency("Up", "Build").fingerprint(),
            Material::dependency("up", "build").fingerprint()
        );
    }

    #[test]
    fn test_dependency_name_defaults_to_upstream() {
        let material = Material::dependency("upstream", "stage1");
        assert_eq!(material.effective_name().unwrap().as_str(), "upstream");

        let named = Material::dependency("upstream", "stage1").named("up");
        assert_eq!(named.effective_name().unwrap().as_str(), "up");
    }

    #[test]
    fn test_parse_from_yaml() {
        let yaml = r#"
- type: git
  url: https://example.com/repo.git
  name: repo
- type: dependency
  pipeline: build
  stage: package
"#;
        let materials: MaterialConfigs = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(materials.len(), 2);
        assert!(materials[0].auto_update);
        assert_eq!(materials.dependencies().count(), 1);
    }
}
