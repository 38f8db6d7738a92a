// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Pipeline definition structures
//!
//! The tree a single pipeline owns: stages, jobs, tasks, materials and the
//! optional sub-configurations. Every node carries its own [`ConfigErrors`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{CaseInsensitiveString, ConfigErrors, Material, MaterialConfigs};

/// Pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name, unique across the configuration
    pub name: CaseInsensitiveString,

    /// Label given to each run
    #[serde(default = "default_label_template")]
    pub label_template: String,

    /// Inputs polled for changes
    #[serde(default)]
    pub materials: MaterialConfigs,

    /// Stages in execution order; empty when a template is referenced
    #[serde(default)]
    pub stages: Vec<Stage>,

    /// Template providing the stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<CaseInsensitiveString>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_tool: Option<TrackingTool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mingle: Option<MingleConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerConfig>,

    #[serde(skip)]
    pub errors: ConfigErrors,
}

fn default_label_template() -> String {
    "${COUNT}".to_string()
}

impl Pipeline {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            label_template: default_label_template(),
            materials: MaterialConfigs::default(),
            stages: Vec::new(),
            template: None,
            params: Vec::new(),
            environment_variables: Vec::new(),
            tracking_tool: None,
            mingle: None,
            timer: None,
            errors: ConfigErrors::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.push(material);
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    /// True when the pipeline owns no stages of its own
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get_stage(&self, name: &CaseInsensitiveString) -> Option<&Stage> {
        self.stages.iter().find(|s| &s.name == name)
    }

    /// Upstream pipelines named by the current material set
    pub fn dependencies(&self) -> BTreeSet<CaseInsensitiveString> {
        self.materials
            .dependencies()
            .filter_map(|m| m.dependency_target().map(|(pipeline, _)| pipeline.clone()))
            .collect()
    }

    /// Whether any node of the tree carries an error
    pub fn has_errors(&self) -> bool {
        !self.collect_errors().is_empty()
    }

    /// Flatten the errors of the whole tree, labelled with where they were found
    pub fn collect_errors(&self) -> Vec<NodeError> {
        let mut out = Vec::new();
        let here = format!("pipeline '{}'", self.name);

        push_errors(&mut out, &here, &self.errors);
        push_errors(&mut out, &format!("{} materials", here), &self.materials.errors);
        for material in self.materials.iter() {
            push_errors(
                &mut out,
                &format!("{} material {}", here, material.describe()),
                &material.errors,
            );
        }
        push_stage_errors(&mut out, &here, &self.stages);
        for param in &self.params {
            push_errors(&mut out, &format!("{} param '{}'", here, param.name), &param.errors);
        }
        for variable in &self.environment_variables {
            push_errors(
                &mut out,
                &format!("{} variable '{}'", here, variable.name),
                &variable.errors,
            );
        }
        if let Some(tool) = &self.tracking_tool {
            push_errors(&mut out, &format!("{} tracking tool", here), &tool.errors);
        }
        if let Some(mingle) = &self.mingle {
            push_errors(&mut out, &format!("{} mingle", here), &mingle.errors);
        }
        if let Some(timer) = &self.timer {
            push_errors(&mut out, &format!("{} timer", here), &timer.errors);
        }

        out
    }
}

fn push_stage_errors(out: &mut Vec<NodeError>, here: &str, stages: &[Stage]) {
    for stage in stages {
        let stage_here = format!("{} > stage '{}'", here, stage.name);
        push_errors(out, &stage_here, &stage.errors);
        for job in &stage.jobs {
            let job_here = format!("{} > job '{}'", stage_here, job.name);
            push_errors(out, &job_here, &job.errors);
            for (i, task) in job.tasks.iter().enumerate() {
                push_errors(
                    out,
                    &format!("{} > task #{} ({})", job_here, i + 1, task.type_name()),
                    &task.errors,
                );
            }
        }
    }
}

fn push_errors(out: &mut Vec<NodeError>, location: &str, errors: &ConfigErrors) {
    for (field, messages) in errors.iter() {
        for message in messages {
            out.push(NodeError {
                location: location.to_string(),
                field: field.to_string(),
                message: message.clone(),
            });
        }
    }
}

/// One error message together with the node and field it was recorded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeError {
    pub location: String,
    pub field: String,
    pub message: String,
}

/// A stage of a pipeline or template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (unique within its pipeline)
    pub name: CaseInsensitiveString,

    #[serde(default)]
    pub jobs: Vec<Job>,

    #[serde(skip)]
    pub errors: ConfigErrors,
}

impl Stage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn get_job(&self, name: &CaseInsensitiveString) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.name == name)
    }
}

/// A job within a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job name (unique within its stage)
    pub name: CaseInsensitiveString,

    #[serde(default)]
    pub tasks: Vec<Task>,

    #[serde(skip)]
    pub errors: ConfigErrors,
}

impl Job {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }
}

/// A task run by a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub kind: TaskKind,

    #[serde(skip)]
    pub errors: ConfigErrors,
}

/// Task specification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskKind {
    Exec {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        working_directory: Option<String>,
    },
    Ant(BuildTask),
    Nant(BuildTask),
    Rake(BuildTask),
    /// Retrieve artifacts published by a job of this or an upstream pipeline
    Fetch(FetchTask),
    Pluggable {
        plugin_id: String,
        #[serde(default)]
        configuration: BTreeMap<String, String>,
    },
}

/// Shared shape of the build-tool tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildTask {
    #[serde(default)]
    pub build_file: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
}

/// Artifact fetch from another job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTask {
    /// Upstream path written ancestor first, such as `grandparent/parent`; empty
    /// for the current pipeline
    #[serde(default)]
    pub pipeline: Option<String>,
    pub stage: CaseInsensitiveString,
    pub job: CaseInsensitiveString,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub is_source_a_file: bool,
    #[serde(default)]
    pub destination: Option<String>,
}

impl FetchTask {
    /// Segments of the pipeline path, empty when fetching from the current pipeline
    pub fn pipeline_path(&self) -> Vec<CaseInsensitiveString> {
        self.pipeline
            .as_deref()
            .unwrap_or_default()
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(CaseInsensitiveString::from)
            .collect()
    }

    /// Whether `pipeline` appears anywhere on the fetch path
    pub fn names_pipeline(&self, pipeline: &CaseInsensitiveString) -> bool {
        self.pipeline_path().iter().any(|segment| segment == pipeline)
    }
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            errors: ConfigErrors::new(),
        }
    }

    pub fn exec(command: &str) -> Self {
        Self::new(TaskKind::Exec {
            command: command.to_string(),
            args: Vec::new(),
            working_directory: None,
        })
    }

    pub fn fetch(pipeline: &str, stage: &str, job: &str, source: &str) -> Self {
        Self::new(TaskKind::Fetch(FetchTask {
            pipeline: (!pipeline.is_empty()).then(|| pipeline.to_string()),
            stage: stage.into(),
            job: job.into(),
            source: source.to_string(),
            is_source_a_file: false,
            destination: None,
        }))
    }

    pub fn as_fetch(&self) -> Option<&FetchTask> {
        match &self.kind {
            TaskKind::Fetch(fetch) => Some(fetch),
            _ => None,
        }
    }

    /// Configuration tag name of the task kind
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            TaskKind::Exec { .. } => "exec",
            TaskKind::Ant(_) => "ant",
            TaskKind::Nant(_) => "nant",
            TaskKind::Rake(_) => "rake",
            TaskKind::Fetch(_) => "fetchartifact",
            TaskKind::Pluggable { .. } => "task",
        }
    }

    pub fn working_directory(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Exec {
                working_directory, ..
            } => working_directory.as_deref(),
            TaskKind::Ant(build) | TaskKind::Nant(build) | TaskKind::Rake(build) => {
                build.working_directory.as_deref()
            }
            _ => None,
        }
    }
}

/// Pipeline parameter, substituted as `#{name}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(skip)]
    pub errors: ConfigErrors,
}

impl Param {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            errors: ConfigErrors::new(),
        }
    }
}

/// Environment variable exported to every job of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(skip)]
    pub errors: ConfigErrors,
}

impl EnvironmentVariable {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            secure: false,
            errors: ConfigErrors::new(),
        }
    }
}

/// Link from commit messages to an issue tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingTool {
    pub link: String,
    pub regex: String,
    #[serde(skip)]
    pub errors: ConfigErrors,
}

/// Mingle project integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MingleConfig {
    pub base_url: String,
    pub project_identifier: String,
    #[serde(default)]
    pub mql: Option<String>,
    #[serde(skip)]
    pub errors: ConfigErrors,
}

/// Cron-triggered scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Quartz-style cron expression
    pub spec: String,
    #[serde(default)]
    pub only_on_changes: bool,
    #[serde(skip)]
    pub errors: ConfigErrors,
}

/// Reusable stage set that pipelines may reference instead of owning stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTemplate {
    pub name: CaseInsensitiveString,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl PipelineTemplate {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Flatten the errors of every stage, job and task of the template
    pub fn collect_errors(&self) -> Vec<NodeError> {
        let mut out = Vec::new();
        push_stage_errors(&mut out, &format!("template '{}'", self.name), &self.stages);
        out
    }
}
