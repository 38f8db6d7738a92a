// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Validation context
//!
//! A context answers "what am I nested under" for the node being validated
//! and gives read access to the rest of the configuration through one index
//! snapshot. Contexts are persistent: [`ValidationContext::with_parent`]
//! returns a new context that shares the receiver's ancestry, so validating
//! one subtree never leaks ancestry into a sibling.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::config::{
    CaseInsensitiveString, Job, Material, Pipeline, PipelineTemplate, SecurityConfig, Stage, Task,
};
use crate::index::{IndexSnapshot, MaterialUse};

/// A node of the configuration tree that can act as a validation parent
#[derive(Debug, Clone, Copy)]
pub enum ConfigNode<'a> {
    Pipeline(&'a Pipeline),
    Template(&'a PipelineTemplate),
    Stage(&'a Stage),
    Job(&'a Job),
    Task(&'a Task),
    Material(&'a Material),
}

impl<'a> ConfigNode<'a> {
    /// Configuration tag of the node type
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::Template(_) => "template",
            Self::Stage(_) => "stage",
            Self::Job(_) => "job",
            Self::Task(task) => task.type_name(),
            Self::Material(material) => material.type_name(),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Pipeline(p) => format!("pipeline '{}'", p.name),
            Self::Template(t) => format!("template '{}'", t.name),
            Self::Stage(s) => format!("stage '{}'", s.name),
            Self::Job(j) => format!("job '{}'", j.name),
            Self::Task(t) => format!("task ({})", t.type_name()),
            Self::Material(m) => format!("material {}", m.describe()),
        }
    }
}

struct Link<'a> {
    node: ConfigNode<'a>,
    previous: Option<Arc<Link<'a>>>,
}

/// Ancestry-aware state threaded through a validation pass
#[derive(Clone)]
pub struct ValidationContext<'a> {
    index: &'a IndexSnapshot,
    editing: Option<&'a Pipeline>,
    chain: Option<Arc<Link<'a>>>,
    pipeline: Option<&'a Pipeline>,
    template: Option<&'a PipelineTemplate>,
    stage: Option<&'a Stage>,
    job: Option<&'a Job>,
}

impl<'a> ValidationContext<'a> {
    /// Empty context reading from `index`
    pub fn root(index: &'a IndexSnapshot) -> Self {
        Self {
            index,
            editing: None,
            chain: None,
            pipeline: None,
            template: None,
            stage: None,
            job: None,
        }
    }

    /// Fold `with_parent` over `nodes`, starting from an empty context
    pub fn for_chain(
        index: &'a IndexSnapshot,
        nodes: impl IntoIterator<Item = ConfigNode<'a>>,
    ) -> Self {
        nodes
            .into_iter()
            .fold(Self::root(index), |context, node| context.with_parent(node))
    }

    /// Treat `pipeline` as the current version of its name
    ///
    /// Lookups by name return the edited, uncommitted pipeline instead of the
    /// committed one, so checks made from other pipelines see the proposed
    /// change. Inherited by every context derived from this one.
    pub fn editing(mut self, pipeline: &'a Pipeline) -> Self {
        self.editing = Some(pipeline);
        self
    }

    /// Same index and edit overlay, no ancestry
    pub fn to_root(&self) -> Self {
        Self {
            editing: self.editing,
            ..Self::root(self.index)
        }
    }

    /// A new context one level deeper; the receiver is left untouched
    pub fn with_parent(&self, node: ConfigNode<'a>) -> Self {
        let mut next = Self {
            index: self.index,
            editing: self.editing,
            chain: Some(Arc::new(Link {
                node,
                previous: self.chain.clone(),
            })),
            pipeline: self.pipeline,
            template: self.template,
            stage: self.stage,
            job: self.job,
        };

        match node {
            ConfigNode::Pipeline(pipeline) => next.pipeline = Some(pipeline),
            ConfigNode::Template(template) => next.template = Some(template),
            ConfigNode::Stage(stage) => next.stage = Some(stage),
            ConfigNode::Job(job) => next.job = Some(job),
            ConfigNode::Task(_) | ConfigNode::Material(_) => {}
        }

        next
    }

    /// Nearest enclosing pipeline
    pub fn pipeline(&self) -> Option<&'a Pipeline> {
        self.pipeline
    }

    /// Nearest enclosing template
    pub fn template(&self) -> Option<&'a PipelineTemplate> {
        self.template
    }

    /// Nearest enclosing stage
    pub fn stage(&self) -> Option<&'a Stage> {
        self.stage
    }

    /// Nearest enclosing job
    pub fn job(&self) -> Option<&'a Job> {
        self.job
    }

    /// Immediate parent of the node being validated
    pub fn parent(&self) -> Option<ConfigNode<'a>> {
        self.chain.as_ref().map(|link| link.node)
    }

    /// Tag name of the immediate parent's type, e.g. `"stage"`
    pub fn parent_display_name(&self) -> Option<&'static str> {
        self.parent().map(|node| node.display_name())
    }

    /// True only when there is an enclosing pipeline and it references a template
    ///
    /// Having no enclosing pipeline at all is reported as `false`; use
    /// [`Self::is_within_pipeline`] to tell the two apart.
    pub fn is_within_templates(&self) -> bool {
        self.pipeline.map_or(false, Pipeline::has_template)
    }

    /// True when the enclosing pipeline owns its stages
    pub fn is_within_pipelines(&self) -> bool {
        self.pipeline.map_or(false, |p| !p.has_template())
    }

    pub fn is_within_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Ancestors from the immediate parent outwards
    pub fn ancestors(&self) -> impl Iterator<Item = ConfigNode<'a>> + '_ {
        let mut cursor = self.chain.as_deref();
        std::iter::from_fn(move || {
            let link = cursor?;
            cursor = link.previous.as_deref();
            Some(link.node)
        })
    }

    /// Outermost-first description of the ancestry, for logs
    pub fn path(&self) -> String {
        let mut labels: Vec<String> = self.ancestors().map(|node| node.label()).collect();
        labels.reverse();
        labels.join(" > ")
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read-through queries against the index snapshot
    // ─────────────────────────────────────────────────────────────────────────

    pub fn index(&self) -> &'a IndexSnapshot {
        self.index
    }

    pub fn pipeline_by_name(&self, name: &CaseInsensitiveString) -> Option<&'a Pipeline> {
        match self.editing {
            Some(edited) if &edited.name == name => Some(edited),
            _ => self.index.pipeline(name),
        }
    }

    pub fn all_materials_by_fingerprint(&self, fingerprint: &str) -> &'a [MaterialUse] {
        self.index.lookup_by_fingerprint(fingerprint)
    }

    /// Committed upstream pipelines of `name`
    pub fn dependency_materials_for(
        &self,
        name: &CaseInsensitiveString,
    ) -> &'a BTreeSet<CaseInsensitiveString> {
        self.index.dependency_edges_for(name)
    }

    pub fn does_template_exist(&self, name: &CaseInsensitiveString) -> bool {
        self.index.does_template_exist(name)
    }

    /// Stages a pipeline runs, resolving its template if it has one
    pub fn stages_of(&self, pipeline: &'a Pipeline) -> &'a [Stage] {
        self.index.stages_of(pipeline)
    }

    /// Group of the enclosing pipeline
    pub fn pipeline_group(&self) -> Option<&'a str> {
        self.pipeline.and_then(|p| self.index.group_of(&p.name))
    }

    pub fn server_security_config(&self) -> &'a SecurityConfig {
        self.index.security()
    }
}

impl fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("path", &self.path())
            .field("editing", &self.editing.map(|p| p.name.to_string()))
            .finish()
    }
}
