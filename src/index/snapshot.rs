// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Immutable index snapshot
//!
//! Derived lookup tables over one committed configuration: pipelines by name,
//! materials by fingerprint, and dependency edges in both directions. A
//! snapshot is never mutated while shared; [`ConfigIndex`](super::ConfigIndex)
//! copies it on write.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use crate::config::{
    CaseInsensitiveString, Configuration, Material, Pipeline, PipelineTemplate, SecurityConfig,
    Stage,
};

static NO_EDGES: BTreeSet<CaseInsensitiveString> = BTreeSet::new();

/// A committed pipeline and the group it belongs to
#[derive(Debug, Clone)]
pub struct PipelineEntry {
    pub group: String,
    pub pipeline: Arc<Pipeline>,
}

/// One material as declared by one pipeline
#[derive(Debug, Clone)]
pub struct MaterialUse {
    pipeline: Arc<Pipeline>,
    position: usize,
}

impl MaterialUse {
    /// The declaring pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn material(&self) -> &Material {
        &self.pipeline.materials[self.position]
    }
}

/// Lookup tables derived from a configuration snapshot
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pipelines: HashMap<CaseInsensitiveString, PipelineEntry>,
    fingerprints: HashMap<String, Vec<MaterialUse>>,
    /// pipeline -> upstream pipelines
    dependencies: HashMap<CaseInsensitiveString, BTreeSet<CaseInsensitiveString>>,
    /// pipeline -> downstream pipelines
    downstream: HashMap<CaseInsensitiveString, BTreeSet<CaseInsensitiveString>>,
    templates: HashMap<CaseInsensitiveString, Arc<PipelineTemplate>>,
    environments: HashMap<CaseInsensitiveString, String>,
    security: Arc<SecurityConfig>,
}

impl IndexSnapshot {
    /// Build every table in one pass over groups, pipelines and materials
    pub fn build(config: &Configuration) -> Self {
        let mut snapshot = Self {
            security: Arc::new(config.security.clone()),
            ..Self::default()
        };

        for group in &config.groups {
            for pipeline in &group.pipelines {
                if snapshot.pipelines.contains_key(&pipeline.name) {
                    tracing::warn!(pipeline = %pipeline.name, "duplicate pipeline name in configuration");
                }
                snapshot.upsert(pipeline.clone(), &group.name);
            }
        }

        for template in &config.templates {
            snapshot
                .templates
                .insert(template.name.clone(), Arc::new(template.clone()));
        }

        for environment in &config.environments {
            for pipeline in &environment.pipelines {
                snapshot
                    .environments
                    .insert(pipeline.clone(), environment.name.clone());
            }
        }

        snapshot
    }

    /// Replace the entry for one pipeline and reconcile the derived tables
    ///
    /// The previous contribution of the pipeline (its fingerprints and edges)
    /// is removed before the current one is added.
    pub fn upsert(&mut self, pipeline: Pipeline, group: &str) {
        let name = pipeline.name.clone();

        if let Some(prior) = self.pipelines.get(&name) {
            let stale: Vec<String> = prior
                .pipeline
                .materials
                .iter()
                .map(Material::fingerprint)
                .collect();
            for fingerprint in stale {
                if let Some(bucket) = self.fingerprints.get_mut(&fingerprint) {
                    bucket.retain(|u| u.pipeline.name != name);
                    if bucket.is_empty() {
                        self.fingerprints.remove(&fingerprint);
                    }
                }
            }
        }

        if let Some(upstreams) = self.dependencies.remove(&name) {
            for upstream in upstreams {
                if let Some(downstream) = self.downstream.get_mut(&upstream) {
                    downstream.remove(&name);
                    if downstream.is_empty() {
                        self.downstream.remove(&upstream);
                    }
                }
            }
        }

        let pipeline = Arc::new(pipeline);
        for (position, material) in pipeline.materials.iter().enumerate() {
            self.fingerprints
                .entry(material.fingerprint())
                .or_default()
                .push(MaterialUse {
                    pipeline: Arc::clone(&pipeline),
                    position,
                });
        }

        let upstreams = pipeline.dependencies();
        for upstream in &upstreams {
            self.downstream
                .entry(upstream.clone())
                .or_default()
                .insert(name.clone());
        }
        self.dependencies.insert(name.clone(), upstreams);

        self.pipelines.insert(
            name,
            PipelineEntry {
                group: group.to_string(),
                pipeline,
            },
        );
    }

    pub fn lookup_by_name(&self, name: &CaseInsensitiveString) -> Option<&PipelineEntry> {
        self.pipelines.get(name)
    }

    pub fn pipeline(&self, name: &CaseInsensitiveString) -> Option<&Pipeline> {
        self.pipelines.get(name).map(|entry| entry.pipeline.as_ref())
    }

    pub fn contains_pipeline(&self, name: &CaseInsensitiveString) -> bool {
        self.pipelines.contains_key(name)
    }

    pub fn group_of(&self, name: &CaseInsensitiveString) -> Option<&str> {
        self.pipelines.get(name).map(|entry| entry.group.as_str())
    }

    /// Every material, across all pipelines, sharing the fingerprint
    pub fn lookup_by_fingerprint(&self, fingerprint: &str) -> &[MaterialUse] {
        self.fingerprints
            .get(fingerprint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = (&str, &[MaterialUse])> {
        self.fingerprints
            .iter()
            .map(|(fingerprint, uses)| (fingerprint.as_str(), uses.as_slice()))
    }

    /// Committed upstream pipelines of `name`
    pub fn dependency_edges_for(
        &self,
        name: &CaseInsensitiveString,
    ) -> &BTreeSet<CaseInsensitiveString> {
        self.dependencies.get(name).unwrap_or(&NO_EDGES)
    }

    /// Pipelines with a dependency material on `name`
    pub fn downstream_of(&self, name: &CaseInsensitiveString) -> &BTreeSet<CaseInsensitiveString> {
        self.downstream.get(name).unwrap_or(&NO_EDGES)
    }

    /// Everything reachable by following downstream edges from `name`
    pub fn transitive_downstream_of(
        &self,
        name: &CaseInsensitiveString,
    ) -> BTreeSet<CaseInsensitiveString> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&CaseInsensitiveString> = self.downstream_of(name).iter().collect();

        while let Some(next) = queue.pop_front() {
            if next == name || !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(self.downstream_of(next).iter());
        }

        seen
    }

    /// Pipeline names in sorted order
    pub fn pipeline_names(&self) -> Vec<&CaseInsensitiveString> {
        let mut names: Vec<_> = self.pipelines.keys().collect();
        names.sort();
        names
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineEntry> {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn template(&self, name: &CaseInsensitiveString) -> Option<&PipelineTemplate> {
        self.templates.get(name).map(Arc::as_ref)
    }

    pub fn does_template_exist(&self, name: &CaseInsensitiveString) -> bool {
        self.templates.contains_key(name)
    }

    /// Stages a pipeline runs: its own, or those of the template it references
    pub fn stages_of<'a>(&'a self, pipeline: &'a Pipeline) -> &'a [Stage] {
        match &pipeline.template {
            Some(template) => self
                .template(template)
                .map(|t| t.stages.as_slice())
                .unwrap_or(&[]),
            None => &pipeline.stages,
        }
    }

    pub fn environment_of(&self, pipeline: &CaseInsensitiveString) -> Option<&str> {
        self.environments.get(pipeline).map(String::as_str)
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, MaterialSource, PipelineGroup};

    fn git(url: &str) -> Material {
        Material::git(url)
    }

    fn config() -> Configuration {
        Configuration::new()
            .with_group(
                PipelineGroup::new("first")
                    .with_pipeline(Pipeline::new("a").with_material(git("https://x/shared.git")))
                    .with_pipeline(
                        Pipeline::new("b")
                            .with_material(git("https://x/shared.git"))
                            .with_material(Material::dependency("a", "s1")),
                    ),
            )
            .with_group(
                PipelineGroup::new("second")
                    .with_pipeline(Pipeline::new("c").with_material(Material::dependency("B", "s1"))),
            )
            .with_template(PipelineTemplate::new("tmpl").with_stage(Stage::new("from-template")))
    }

    #[test]
    fn test_build_indexes_names_and_groups() {
        let snapshot = IndexSnapshot::build(&config());

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.group_of(&"C".into()), Some("second"));
        assert!(snapshot.lookup_by_name(&"missing".into()).is_none());
        assert!(snapshot.does_template_exist(&"TMPL".into()));
    }

    #[test]
    fn test_build_indexes_shared_fingerprints() {
        let snapshot = IndexSnapshot::build(&config());
        let fingerprint = git("https://x/shared.git").fingerprint();

        let owners: Vec<String> = snapshot
            .lookup_by_fingerprint(&fingerprint)
            .iter()
            .map(|u| u.pipeline().name.to_string())
            .collect();
        assert_eq!(owners, vec!["a", "b"]);
        assert!(snapshot.lookup_by_fingerprint("unknown").is_empty());
    }

    #[test]
    fn test_build_indexes_edges_both_ways() {
        let snapshot = IndexSnapshot::build(&config());

        assert!(snapshot.dependency_edges_for(&"c".into()).contains(&"b".into()));
        assert!(snapshot.downstream_of(&"a".into()).contains(&"b".into()));
        assert!(snapshot.dependency_edges_for(&"nobody".into()).is_empty());

        let transitive = snapshot.transitive_downstream_of(&"a".into());
        assert_eq!(transitive.len(), 2);
    }

    #[test]
    fn test_upsert_reconciles_fingerprints() {
        let m1 = Material::new(MaterialSource::Hg { url: "https://x/one".into() });
        let m2 = Material::new(MaterialSource::Hg { url: "https://x/two".into() });
        let m3 = Material::new(MaterialSource::Hg { url: "https://x/three".into() });
        let (f1, f2, f3) = (m1.fingerprint(), m2.fingerprint(), m3.fingerprint());

        let mut snapshot = IndexSnapshot::default();
        snapshot.upsert(
            Pipeline::new("p").with_material(m1).with_material(m2.clone()),
            "group",
        );
        snapshot.upsert(Pipeline::new("p").with_material(m2).with_material(m3), "group");

        assert!(snapshot.lookup_by_fingerprint(&f1).is_empty());
        assert_eq!(snapshot.lookup_by_fingerprint(&f2).len(), 1);
        assert_eq!(snapshot.lookup_by_fingerprint(&f3).len(), 1);
    }

    #[test]
    fn test_upsert_keeps_other_pipelines_in_shared_bucket() {
        let mut snapshot = IndexSnapshot::build(&config());
        snapshot.upsert(Pipeline::new("a"), "first");

        let fingerprint = git("https://x/shared.git").fingerprint();
        let uses = snapshot.lookup_by_fingerprint(&fingerprint);
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].pipeline().name.as_str(), "b");
    }

    #[test]
    fn test_upsert_moves_dependency_edges() {
        let mut snapshot = IndexSnapshot::build(&config());
        snapshot.upsert(
            Pipeline::new("c").with_material(Material::dependency("a", "s1")),
            "second",
        );

        assert!(snapshot.downstream_of(&"b".into()).is_empty());
        assert!(snapshot.downstream_of(&"a".into()).contains(&"c".into()));
        assert_eq!(snapshot.dependency_edges_for(&"c".into()).len(), 1);
    }

    #[test]
    fn test_stages_of_resolves_template() {
        let snapshot = IndexSnapshot::build(&config());
        let pipeline = Pipeline::new("templated").with_template("tmpl");

        assert_eq!(snapshot.stages_of(&pipeline)[0].name.as_str(), "from-template");
    }

    #[test]
    fn test_environment_lookup() {
        let mut config = config();
        config.environments.push(Environment {
            name: "prod".into(),
            pipelines: vec!["a".into()],
        });
        let snapshot = IndexSnapshot::build(&config);

        assert_eq!(snapshot.environment_of(&"A".into()), Some("prod"));
        assert_eq!(snapshot.environment_of(&"b".into()), None);
    }
}
