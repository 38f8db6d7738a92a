// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Whole-pipeline validation
//!
//! A pass walks the pipeline tree through shared borrows and records every
//! message in a [`PipelineReport`] shaped like the tree. Applying the report
//! afterwards replaces the errors of every node it covers. Every step runs
//! even when an earlier one failed, so one pass reports everything.

use tracing::{debug, warn};

use super::cycle::{DependencyCycleDetector, ProposedDependencyState};
use super::rules::{check, Validatable};
use super::{ConfigNode, ValidationContext};
use crate::config::{
    ConfigErrors, Job, Pipeline, PipelineTemplate, Stage, BASE,
};
use crate::index::IndexSnapshot;

/// Errors found on one job and its tasks
#[derive(Debug, Default)]
pub struct JobReport {
    pub errors: ConfigErrors,
    pub tasks: Vec<ConfigErrors>,
}

/// Errors found on one stage and everything below it
#[derive(Debug, Default)]
pub struct StageReport {
    pub errors: ConfigErrors,
    pub jobs: Vec<JobReport>,
}

/// Errors found on a pipeline tree, not yet written to it
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub valid: bool,
    pub errors: ConfigErrors,
    /// Errors on the material collection as a whole
    pub materials: ConfigErrors,
    pub material_errors: Vec<ConfigErrors>,
    pub stages: Vec<StageReport>,
    pub params: Vec<ConfigErrors>,
    pub variables: Vec<ConfigErrors>,
    pub tracking_tool: ConfigErrors,
    pub mingle: ConfigErrors,
    pub timer: ConfigErrors,
}

impl StageReport {
    fn is_clean(&self) -> bool {
        self.errors.is_empty()
            && self
                .jobs
                .iter()
                .all(|job| job.errors.is_empty() && job.tasks.iter().all(ConfigErrors::is_empty))
    }

    fn apply(self, stage: &mut Stage) {
        stage.errors = self.errors;
        for (job, report) in stage.jobs.iter_mut().zip(self.jobs) {
            job.errors = report.errors;
            for (task, errors) in job.tasks.iter_mut().zip(report.tasks) {
                task.errors = errors;
            }
        }
    }
}

impl PipelineReport {
    /// Total number of messages in the report
    pub fn error_count(&self) -> usize {
        let stages: usize = self
            .stages
            .iter()
            .map(|stage| {
                stage.errors.len()
                    + stage
                        .jobs
                        .iter()
                        .map(|job| job.errors.len() + job.tasks.iter().map(ConfigErrors::len).sum::<usize>())
                        .sum::<usize>()
            })
            .sum();

        self.errors.len()
            + self.materials.len()
            + self.material_errors.iter().map(ConfigErrors::len).sum::<usize>()
            + stages
            + self.params.iter().map(ConfigErrors::len).sum::<usize>()
            + self.variables.iter().map(ConfigErrors::len).sum::<usize>()
            + self.tracking_tool.len()
            + self.mingle.len()
            + self.timer.len()
    }

    /// Replace the errors of every node of `pipeline` and return the verdict
    ///
    /// `pipeline` must be the tree the report was produced from.
    pub fn apply(self, pipeline: &mut Pipeline) -> bool {
        pipeline.errors = self.errors;
        pipeline.materials.errors = self.materials;
        for (material, errors) in pipeline.materials.iter_mut().zip(self.material_errors) {
            material.errors = errors;
        }
        for (stage, report) in pipeline.stages.iter_mut().zip(self.stages) {
            report.apply(stage);
        }
        for (param, errors) in pipeline.params.iter_mut().zip(self.params) {
            param.errors = errors;
        }
        for (variable, errors) in pipeline.environment_variables.iter_mut().zip(self.variables) {
            variable.errors = errors;
        }
        if let Some(tool) = &mut pipeline.tracking_tool {
            tool.errors = self.tracking_tool;
        }
        if let Some(mingle) = &mut pipeline.mingle {
            mingle.errors = self.mingle;
        }
        if let Some(timer) = &mut pipeline.timer {
            timer.errors = self.timer;
        }
        self.valid
    }
}

/// Validates a pipeline tree against the rest of the configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeValidator;

impl TreeValidator {
    /// Validate `pipeline` as a proposed edit against `index`
    ///
    /// Other pipelines are read from the index, except that lookups of this
    /// pipeline's name see the edited version. Errors are written into the
    /// tree; nothing in `index` is modified.
    pub fn validate(pipeline: &mut Pipeline, index: &IndexSnapshot) -> bool {
        let report = {
            let edited: &Pipeline = pipeline;
            let ctx = ValidationContext::for_chain(index, [ConfigNode::Pipeline(edited)])
                .editing(edited);
            TreeValidator.check(edited, &ctx)
        };
        report.apply(pipeline)
    }

    /// Validate a template's stages, jobs and tasks
    pub fn validate_template(template: &mut PipelineTemplate, index: &IndexSnapshot) -> bool {
        let reports: Vec<StageReport> = {
            let ctx = ValidationContext::root(index).with_parent(ConfigNode::Template(&*template));
            template.stages.iter().map(|stage| check_stage(stage, &ctx)).collect()
        };
        let valid = reports.iter().all(StageReport::is_clean);
        for (stage, report) in template.stages.iter_mut().zip(reports) {
            report.apply(stage);
        }
        valid
    }

    /// Run every step against `pipeline` and collect the outcome
    ///
    /// `ctx` is the context the pipeline itself is validated in; its children
    /// get `ctx` extended with the pipeline.
    pub fn check<'a>(&self, pipeline: &'a Pipeline, ctx: &ValidationContext<'a>) -> PipelineReport {
        debug!(pipeline = %pipeline.name, "validating pipeline");
        let mut report = PipelineReport::default();

        // Own fields
        pipeline.validate(ctx, &mut report.errors);

        // Downstream dependency materials still resolve
        check_downstream_dependencies(pipeline, ctx, &mut report.errors);

        // Stage or template, never both, never neither
        match (&pipeline.template, pipeline.is_empty()) {
            (None, true) => {
                report.errors.add("stages", "A pipeline must have at least one stage");
            }
            (Some(template), false) => {
                report.errors.add(
                    "stages",
                    format!(
                        "Cannot add stages to pipeline '{}' which already references template '{}'",
                        pipeline.name, template
                    ),
                );
                report.errors.add(
                    "template",
                    format!(
                        "Cannot set template '{}' on pipeline '{}' because it already has stages defined",
                        template, pipeline.name
                    ),
                );
            }
            _ => {}
        }

        if let Some(template) = &pipeline.template {
            if !ctx.does_template_exist(template) {
                report
                    .errors
                    .add("template", format!("Template '{}' does not exist", template));
            }
        }
        let mut valid = report.errors.is_empty();

        let children = ctx.with_parent(ConfigNode::Pipeline(pipeline));

        for stage in &pipeline.stages {
            let stage_report = check_stage(stage, &children);
            valid = stage_report.is_clean() && valid;
            report.stages.push(stage_report);
        }

        let state = ProposedDependencyState::new(pipeline, ctx);
        if let Err(err) = DependencyCycleDetector::detect_cycle(&pipeline.name, &state) {
            warn!(pipeline = %pipeline.name, error = %err, "dependency check failed");
            report.materials.add(BASE, err.to_string());
        }
        valid = report.materials.is_empty() && valid;

        for material in pipeline.materials.iter() {
            let errors = check(material, &children);
            valid = errors.is_empty() && valid;
            report.material_errors.push(errors);
        }
        for param in &pipeline.params {
            let errors = check(param, &children);
            valid = errors.is_empty() && valid;
            report.params.push(errors);
        }
        for variable in &pipeline.environment_variables {
            let errors = check(variable, &children);
            valid = errors.is_empty() && valid;
            report.variables.push(errors);
        }
        if let Some(tool) = &pipeline.tracking_tool {
            report.tracking_tool = check(tool, &children);
            valid = report.tracking_tool.is_empty() && valid;
        }
        if let Some(mingle) = &pipeline.mingle {
            report.mingle = check(mingle, &children);
            valid = report.mingle.is_empty() && valid;
        }
        if let Some(timer) = &pipeline.timer {
            report.timer = check(timer, &children);
            valid = report.timer.is_empty() && valid;
        }

        // Downstream fetch tasks still resolve
        let mut fetch_errors = ConfigErrors::new();
        check_downstream_fetch_tasks(pipeline, ctx, &mut fetch_errors);
        valid = fetch_errors.is_empty() && valid;
        for message in fetch_errors.all() {
            report.errors.add(BASE, message);
        }

        report.valid = valid;
        if valid {
            debug!(pipeline = %pipeline.name, "pipeline is valid");
        } else {
            warn!(
                pipeline = %pipeline.name,
                errors = report.error_count(),
                "pipeline failed validation"
            );
        }
        report
    }
}

fn check_stage<'a>(stage: &'a Stage, ctx: &ValidationContext<'a>) -> StageReport {
    let stage_ctx = ctx.with_parent(ConfigNode::Stage(stage));
    StageReport {
        errors: check(stage, ctx),
        jobs: stage.jobs.iter().map(|job| check_job(job, &stage_ctx)).collect(),
    }
}

fn check_job<'a>(job: &'a Job, ctx: &ValidationContext<'a>) -> JobReport {
    let job_ctx = ctx.with_parent(ConfigNode::Job(job));
    JobReport {
        errors: check(job, ctx),
        tasks: job.tasks.iter().map(|task| check(task, &job_ctx)).collect(),
    }
}

/// Revalidate copies of downstream dependency materials that point at `pipeline`
fn check_downstream_dependencies<'a>(
    pipeline: &'a Pipeline,
    ctx: &ValidationContext<'a>,
    errors: &mut ConfigErrors,
) {
    let index = ctx.index();
    let root = ctx.to_root();

    for name in index.downstream_of(&pipeline.name) {
        if name == &pipeline.name {
            continue;
        }
        let Some(downstream) = index.pipeline(name) else {
            continue;
        };
        let downstream_ctx = root.with_parent(ConfigNode::Pipeline(downstream));

        for material in downstream.materials.dependencies() {
            if !matches!(material.dependency_target(), Some((upstream, _)) if upstream == &pipeline.name)
            {
                continue;
            }
            let mut copy = material.clone();
            if copy.revalidate(&downstream_ctx) {
                continue;
            }
            for message in copy.errors().all() {
                errors.add(
                    BASE,
                    format!(
                        "{}, it is being referred to from pipeline '{}'",
                        message, downstream.name
                    ),
                );
            }
        }
    }
}

/// Revalidate copies of downstream fetch tasks that name `pipeline` on their path
///
/// Every job of every transitive downstream is scanned on each pass.
fn check_downstream_fetch_tasks<'a>(
    pipeline: &'a Pipeline,
    ctx: &ValidationContext<'a>,
    errors: &mut ConfigErrors,
) {
    let index = ctx.index();
    let root = ctx.to_root();

    for name in index.transitive_downstream_of(&pipeline.name) {
        let Some(downstream) = index.pipeline(&name) else {
            continue;
        };
        let downstream_ctx = root.with_parent(ConfigNode::Pipeline(downstream));

        for stage in &downstream.stages {
            let stage_ctx = downstream_ctx.with_parent(ConfigNode::Stage(stage));
            for job in &stage.jobs {
                let job_ctx = stage_ctx.with_parent(ConfigNode::Job(job));
                for task in &job.tasks {
                    if !task.as_fetch().map_or(false, |f| f.names_pipeline(&pipeline.name)) {
                        continue;
                    }
                    let mut copy = task.clone();
                    copy.revalidate(&job_ctx);
                    for message in copy.errors().all() {
                        errors.add(BASE, message);
                    }
                }
            }
        }
    }
}
