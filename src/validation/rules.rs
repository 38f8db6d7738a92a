// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Field-level validation rules
//!
//! Every node validates only its own attributes. Siblings and ancestors are
//! read through the [`ValidationContext`], never through back-pointers.

use regex::Regex;
use std::path::{Component, Path};
use std::sync::OnceLock;

use super::{ConfigNode, ValidationContext};
use crate::config::{
    CaseInsensitiveString, ConfigErrors, EnvironmentVariable, FetchTask, Job, Material,
    MaterialSource, MingleConfig, Param, Pipeline, Stage, Task, TaskKind, TimerConfig,
    TrackingTool,
};

const MAX_NAME_LENGTH: usize = 255;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9_\-.]*$").expect("name pattern is valid")
    })
}

fn label_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("label token pattern is valid"))
}

/// A configuration node that knows how to check its own fields
pub trait Validatable {
    /// Append this node's problems to `errors`
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors);

    fn errors(&self) -> &ConfigErrors;

    fn errors_mut(&mut self) -> &mut ConfigErrors;

    /// Replace the node's errors with a fresh run of [`Self::validate`]
    fn revalidate(&mut self, ctx: &ValidationContext<'_>) -> bool {
        let mut errors = ConfigErrors::new();
        self.validate(ctx, &mut errors);
        let valid = errors.is_empty();
        *self.errors_mut() = errors;
        valid
    }
}

/// Run `validate` against a fresh error set, leaving the node untouched
pub fn check<T: Validatable + ?Sized>(node: &T, ctx: &ValidationContext<'_>) -> ConfigErrors {
    let mut errors = ConfigErrors::new();
    node.validate(ctx, &mut errors);
    errors
}

/// Whether `name` is usable as a pipeline, stage, job, material or param name
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && name_pattern().is_match(name)
}

fn invalid_name_message(kind: &str, name: &str) -> String {
    format!(
        "Invalid {} name '{}'. This must be alphanumeric and can contain underscores, hyphens \
         and periods (however, it cannot start with a period). The maximum allowed length is {} \
         characters.",
        kind, name, MAX_NAME_LENGTH
    )
}

/// True when `path` is relative and never climbs above its starting directory
pub fn is_inside_sandbox(path: &str) -> bool {
    let path = Path::new(path);
    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(up) => depth = up,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// "job 'j' in stage 's' of pipeline 'p'" as far as the context knows it
fn job_location(ctx: &ValidationContext<'_>) -> String {
    let name = |value: Option<&CaseInsensitiveString>| {
        value.map_or_else(|| "?".to_string(), ToString::to_string)
    };
    format!(
        "job '{}' in stage '{}' of pipeline '{}'",
        name(ctx.job().map(|j| &j.name)),
        name(ctx.stage().map(|s| &s.name)),
        name(ctx.pipeline().map(|p| &p.name)),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

impl Validatable for Pipeline {
    fn validate(&self, _ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if !is_valid_name(self.name.as_str()) {
            errors.add("name", invalid_name_message("pipeline", self.name.as_str()));
        }
        self.validate_label_template(errors);
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl Pipeline {
    fn validate_label_template(&self, errors: &mut ConfigErrors) {
        let template = self.label_template.as_str();
        let tokens: Vec<&str> = label_token_pattern()
            .captures_iter(template)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        if tokens.is_empty() && !template.contains("#{") {
            errors.add(
                "labelTemplate",
                format!(
                    "Invalid label '{}'. Label should be composed of alphanumeric text, it may \
                     contain the build number as ${{COUNT}}, it may contain a material revision \
                     as ${{<material-name>}}.",
                    template
                ),
            );
            return;
        }

        for token in tokens {
            let reference = token.split("[:").next().unwrap_or_default().trim();
            let known = reference.eq_ignore_ascii_case("COUNT")
                || reference.to_ascii_lowercase().starts_with("env:")
                || self
                    .materials
                    .iter()
                    .filter_map(Material::effective_name)
                    .any(|name| name.matches(reference));
            if !known {
                errors.add(
                    "labelTemplate",
                    format!(
                        "You have defined a label template in pipeline '{}' that refers to a \
                         material called '{}', but no material with this name is defined.",
                        self.name, reference
                    ),
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage and job
// ─────────────────────────────────────────────────────────────────────────────

impl Validatable for Stage {
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if !is_valid_name(self.name.as_str()) {
            errors.add("name", invalid_name_message("stage", self.name.as_str()));
        }

        let siblings: &[Stage] = match ctx.parent() {
            Some(ConfigNode::Template(template)) => &template.stages,
            _ => ctx.pipeline().map(|p| p.stages.as_slice()).unwrap_or_default(),
        };
        if siblings.iter().filter(|s| s.name == self.name).count() > 1 {
            errors.add(
                "name",
                format!(
                    "You have defined multiple stages called '{}'. Stage names are \
                     case-insensitive and must be unique.",
                    self.name
                ),
            );
        }

        if self.jobs.is_empty() {
            errors.add(
                "jobs",
                format!("Stage '{}' must have at least one job", self.name),
            );
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl Validatable for Job {
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if !is_valid_name(self.name.as_str()) {
            errors.add("name", invalid_name_message("job", self.name.as_str()));
        }

        if let Some(stage) = ctx.stage() {
            if stage.jobs.iter().filter(|j| j.name == self.name).count() > 1 {
                errors.add(
                    "name",
                    format!(
                        "You have defined multiple jobs called '{}'. Job names are \
                         case-insensitive and must be unique.",
                        self.name
                    ),
                );
            }
        }

        if self.tasks.is_empty() {
            errors.add("tasks", format!("Job '{}' must have at least one task", self.name));
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

impl Validatable for Task {
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if let Some(dir) = self.working_directory() {
            if !is_inside_sandbox(dir) {
                errors.add(
                    "workingDirectory",
                    format!(
                        "The path of the working directory for the {} task in {} is outside \
                         the agent sandbox: '{}'",
                        self.type_name(),
                        job_location(ctx),
                        dir
                    ),
                );
            }
        }

        match &self.kind {
            TaskKind::Exec { command, .. } if command.trim().is_empty() => {
                errors.add("command", "Command cannot be empty");
            }
            TaskKind::Pluggable { plugin_id, .. } if plugin_id.trim().is_empty() => {
                errors.add("pluginId", "Plugin id cannot be empty");
            }
            TaskKind::Fetch(fetch) => fetch.validate(ctx, errors),
            _ => {}
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl FetchTask {
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if self.stage.is_blank() {
            errors.add("stage", "Stage is a required field.");
        }
        if self.job.is_blank() {
            errors.add("job", "Job is a required field.");
        }
        if self.source.trim().is_empty() {
            errors.add("src", "Should provide either src or source");
        }
        if let Some(dest) = &self.destination {
            if !is_inside_sandbox(dest) {
                errors.add(
                    "dest",
                    format!(
                        "Task of {} has dest path '{}' which is outside the working directory.",
                        job_location(ctx),
                        dest
                    ),
                );
            }
        }

        // Target resolution only makes sense against concrete pipelines
        if ctx.is_within_templates() || ctx.template().is_some() {
            return;
        }
        let Some(current) = ctx.pipeline() else {
            return;
        };
        if self.stage.is_blank() || self.job.is_blank() {
            return;
        }

        let path = self.pipeline_path();
        let fetching_from_self = path.is_empty() || (path.len() == 1 && path[0] == current.name);
        if fetching_from_self {
            self.validate_local_target(ctx, current, errors);
            return;
        }

        // Written ancestor first, so the walk starts from the last segment
        let mut previous = current;
        for segment in path.iter().rev() {
            if !previous.dependencies().contains(segment) {
                errors.add(
                    "pipeline",
                    format!(
                        "Pipeline \"{}\" tries to fetch artifact from pipeline \"{}\" which is \
                         not an upstream pipeline",
                        previous.name, segment
                    ),
                );
                return;
            }
            let Some(next) = ctx.pipeline_by_name(segment) else {
                errors.add(
                    "pipeline",
                    format!(
                        "Pipeline \"{}\" tries to fetch artifact from pipeline \"{}\" which does \
                         not exist.",
                        current.name, segment
                    ),
                );
                return;
            };
            previous = next;
        }

        self.validate_stage_and_job(ctx.stages_of(previous), current, previous, errors);
    }

    fn validate_local_target<'a>(
        &self,
        ctx: &ValidationContext<'a>,
        current: &'a Pipeline,
        errors: &mut ConfigErrors,
    ) {
        let stages = ctx.stages_of(current);
        let target = stages.iter().position(|s| s.name == self.stage);
        let here = ctx
            .stage()
            .and_then(|stage| stages.iter().position(|s| s.name == stage.name));

        match (target, here) {
            (Some(target), Some(here)) if target >= here => {
                errors.add(
                    "stage",
                    format!(
                        "\"{} :: {}\" tries to fetch artifact from its stage \"{}\" which does \
                         not complete before the current stage \"{}\".",
                        current.name, stages[here].name, self.stage, stages[here].name
                    ),
                );
            }
            _ => self.validate_stage_and_job(stages, current, current, errors),
        }
    }

    fn validate_stage_and_job(
        &self,
        stages: &[Stage],
        current: &Pipeline,
        target: &Pipeline,
        errors: &mut ConfigErrors,
    ) {
        let Some(stage) = stages.iter().find(|s| s.name == self.stage) else {
            errors.add(
                "stage",
                format!(
                    "\"{}\" tries to fetch artifact from stage \"{} :: {}\" which does not exist.",
                    current.name, target.name, self.stage
                ),
            );
            return;
        };
        if stage.get_job(&self.job).is_none() {
            errors.add(
                "job",
                format!(
                    "\"{}\" tries to fetch artifact from job \"{} :: {} :: {}\" which does not \
                     exist.",
                    current.name, target.name, self.stage, self.job
                ),
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Materials
// ─────────────────────────────────────────────────────────────────────────────

impl Validatable for Material {
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if let Some(name) = &self.name {
            if !is_valid_name(name.as_str()) {
                errors.add("materialName", invalid_name_message("material", name.as_str()));
            }
        }

        if let (Some(name), Some(pipeline)) = (self.effective_name(), ctx.pipeline()) {
            let same_name = pipeline
                .materials
                .iter()
                .filter(|m| m.effective_name() == Some(name))
                .count();
            if same_name > 1 {
                errors.add(
                    "materialName",
                    format!(
                        "You have defined multiple materials called '{}'. Material names are \
                         case-insensitive and must be unique. Note that for dependency materials \
                         the default materialName is the name of the upstream pipeline.",
                        name
                    ),
                );
            }
        }

        if let Some(folder) = &self.destination {
            if !is_inside_sandbox(folder) {
                errors.add(
                    "folder",
                    format!("Dest folder '{}' is not valid. It must be a sub-directory of the working folder.", folder),
                );
            }
        }

        match &self.source {
            MaterialSource::Git { url, .. }
            | MaterialSource::Svn { url, .. }
            | MaterialSource::Hg { url } => {
                if url.trim().is_empty() {
                    errors.add("url", "URL cannot be blank");
                }
            }
            MaterialSource::P4 { port, view, .. } => {
                if port.trim().is_empty() {
                    errors.add("port", "P4 port cannot be empty.");
                }
                if view.trim().is_empty() {
                    errors.add("view", "P4 view cannot be empty.");
                }
            }
            MaterialSource::Tfs {
                url, project_path, ..
            } => {
                if url.trim().is_empty() {
                    errors.add("url", "URL cannot be blank");
                }
                if project_path.trim().is_empty() {
                    errors.add("projectPath", "Project Path cannot be blank");
                }
            }
            MaterialSource::Package { package_id } => {
                if package_id.trim().is_empty() {
                    errors.add("packageId", "Please select a repository and package");
                }
            }
            MaterialSource::PluggableScm { scm_id } => {
                if scm_id.trim().is_empty() {
                    errors.add("scmId", "Please select a SCM");
                }
            }
            MaterialSource::Dependency { pipeline, stage } => {
                self.validate_dependency(ctx, pipeline, stage, errors);
            }
        }

        if self.is_scm() {
            self.validate_auto_update(ctx, errors);
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl Material {
    fn validate_dependency(
        &self,
        ctx: &ValidationContext<'_>,
        upstream: &CaseInsensitiveString,
        stage: &CaseInsensitiveString,
        errors: &mut ConfigErrors,
    ) {
        let referrer = ctx
            .pipeline()
            .map_or_else(|| "?".to_string(), |p| p.name.to_string());

        let Some(upstream_pipeline) = ctx.pipeline_by_name(upstream) else {
            errors.add(
                "pipelineName",
                format!(
                    "Pipeline with name '{}' does not exist, it is defined as a dependency for \
                     pipeline '{}'",
                    upstream, referrer
                ),
            );
            return;
        };

        if !ctx.stages_of(upstream_pipeline).iter().any(|s| &s.name == stage) {
            errors.add(
                "stageName",
                format!(
                    "Stage with name '{}' does not exist on pipeline '{}'",
                    stage, upstream
                ),
            );
        }
    }

    /// Every copy of the same external source must poll the same way
    fn validate_auto_update(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        let own = ctx.pipeline().map(|p| &p.name);
        let conflicting = ctx
            .all_materials_by_fingerprint(&self.fingerprint())
            .iter()
            .filter(|other| Some(&other.pipeline().name) != own)
            .any(|other| other.material().auto_update != self.auto_update);

        if conflicting {
            errors.add(
                "autoUpdate",
                format!(
                    "Material of type {} ({}) is specified more than once in the configuration \
                     with different values for the autoUpdate attribute. All copies of a \
                     material must have the same value for this attribute.",
                    self.type_name(),
                    self.url().unwrap_or_default()
                ),
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline extras
// ─────────────────────────────────────────────────────────────────────────────

impl Validatable for Param {
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if !is_valid_name(&self.name) {
            errors.add("name", invalid_name_message("parameter", &self.name));
        }
        let duplicates = ctx.pipeline().map_or(0, |p| {
            p.params
                .iter()
                .filter(|other| other.name.eq_ignore_ascii_case(&self.name))
                .count()
        });
        if duplicates > 1 {
            errors.add(
                "name",
                format!("Param name '{}' is not unique for pipeline", self.name),
            );
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl Validatable for EnvironmentVariable {
    fn validate(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if self.name.trim().is_empty() {
            errors.add("name", "Environment Variable cannot have an empty name");
            return;
        }
        let duplicates = ctx.pipeline().map_or(0, |p| {
            p.environment_variables
                .iter()
                .filter(|other| other.name == self.name)
                .count()
        });
        if duplicates > 1 {
            errors.add(
                "name",
                format!(
                    "Environment Variable name '{}' is not unique for pipeline '{}'",
                    self.name,
                    ctx.pipeline().map(|p| p.name.as_str()).unwrap_or_default()
                ),
            );
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl Validatable for TrackingTool {
    fn validate(&self, _ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if !self.link.contains("${ID}") {
            errors.add("link", "Link must be a URL containing '${ID}'");
        }
        if self.regex.trim().is_empty() {
            errors.add("regex", "Regex should be populated");
        } else if let Err(err) = Regex::new(&self.regex) {
            errors.add("regex", format!("Regex '{}' is invalid: {}", self.regex, err));
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl Validatable for MingleConfig {
    fn validate(&self, _ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if !self.base_url.starts_with("https://") {
            errors.add("baseUrl", "Should be a URL starting with https://");
        }
        if self.project_identifier.trim().is_empty() {
            errors.add("projectIdentifier", "Should be a valid mingle identifier.");
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}

impl Validatable for TimerConfig {
    fn validate(&self, _ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        let fields = self.spec.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            errors.add(
                "timerSpec",
                format!(
                    "Invalid cron syntax '{}': expected 6 or 7 fields, found {}",
                    self.spec, fields
                ),
            );
        }
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }
}
