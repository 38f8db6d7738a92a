// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! End-to-end validation scenarios against the library API

use pipewarden::config::{Job, PipelineGroup, Task, BASE};
use pipewarden::{Configuration, Material, Pipeline, PipelineConfigService, Stage, WardenError};

const CONFIG: &str = r#"
groups:
  - name: main
    pipelines:
      - name: A
        materials:
          - type: git
            url: https://example.com/app.git
        stages:
          - name: build
            jobs:
              - name: compile
                tasks:
                  - type: exec
                    command: make
      - name: B
        materials:
          - type: dependency
            pipeline: A
            stage: build
        stages:
          - name: test
            jobs:
              - name: unit
                tasks:
                  - type: fetch
                    pipeline: A
                    stage: build
                    job: compile
                    source: target
      - name: C
        materials:
          - type: dependency
            pipeline: B
            stage: test
        stages:
          - name: deploy
            jobs:
              - name: ship
                tasks:
                  - type: exec
                    command: ./ship.sh
"#;

fn service() -> (Configuration, PipelineConfigService) {
    let config = Configuration::from_yaml(CONFIG).unwrap();
    let service = PipelineConfigService::from_config(&config);
    (config, service)
}

#[test]
fn committed_configuration_is_valid() {
    let (config, service) = service();

    for (_, pipeline) in config.all_pipelines() {
        let mut pipeline = pipeline.clone();
        assert!(
            service.validate_pipeline(&mut pipeline),
            "{:?}",
            pipeline.collect_errors()
        );
    }
}

#[test]
fn closing_a_cycle_is_rejected_without_side_effects() {
    let (_, service) = service();
    let before: Vec<String> = service
        .index()
        .snapshot()
        .pipelines()
        .map(|entry| entry.pipeline.name.to_string())
        .collect();

    let mut a = service.get_pipeline("A").unwrap();
    a.materials.push(Material::dependency("C", "deploy"));

    let err = service.update_pipeline(&mut a, "main").unwrap_err();
    assert!(matches!(err, WardenError::ValidationFailed { .. }));

    let cycle = a.materials.errors.on(BASE);
    assert_eq!(cycle, ["Circular dependency: A <- C <- B <- A"]);

    // nothing committed, nothing else touched
    let snapshot = service.index().snapshot();
    assert!(snapshot.dependency_edges_for(&"A".into()).is_empty());
    for entry in snapshot.pipelines() {
        assert!(!entry.pipeline.has_errors());
    }
    let after: Vec<String> = snapshot
        .pipelines()
        .map(|entry| entry.pipeline.name.to_string())
        .collect();
    assert_eq!(before.len(), after.len());
}

#[test]
fn removing_the_back_edge_makes_it_valid_again() {
    let (_, service) = service();
    let mut a = service.get_pipeline("A").unwrap();

    a.materials.push(Material::dependency("C", "deploy"));
    assert!(!service.validate_pipeline(&mut a));

    a.materials.retain(|m| !m.is_dependency());
    assert!(service.validate_pipeline(&mut a));
    assert!(!a.has_errors());
}

#[test]
fn renaming_an_upstream_stage_names_every_broken_downstream() {
    let (_, service) = service();
    let mut a = service.get_pipeline("A").unwrap();
    a.stages[0].name = "package".into();

    assert!(!service.validate_pipeline(&mut a));

    let base = a.errors.on(BASE);
    assert!(base
        .iter()
        .any(|m| m.ends_with("it is being referred to from pipeline 'B'")));
    assert!(base
        .iter()
        .any(|m| m.contains("tries to fetch artifact from stage \"A :: build\"")));

    let b = service.index().snapshot();
    assert!(!b.pipeline(&"B".into()).unwrap().has_errors());
}

#[test]
fn fingerprint_index_follows_material_changes() {
    let (_, service) = service();
    let git = Material::git("https://example.com/app.git");
    let other = Material::git("https://example.com/other.git");

    let mut a = service.get_pipeline("A").unwrap();
    a.materials.retain(|_| false);
    a.materials.push(other.clone());
    service.update_pipeline(&mut a, "main").unwrap();

    let index = service.index();
    assert!(index.lookup_by_fingerprint(&git.fingerprint()).is_empty());
    assert_eq!(index.lookup_by_fingerprint(&other.fingerprint()).len(), 1);
}

#[test]
fn new_pipeline_fetching_from_non_upstream_is_rejected() {
    let (_, service) = service();
    let mut rogue = Pipeline::new("rogue").with_stage(Stage::new("s").with_job(
        Job::new("j").with_task(Task::fetch("A", "build", "compile", "target")),
    ));

    assert!(service.create_pipeline(&mut rogue, "side").is_err());
    let task_errors = &rogue.stages[0].jobs[0].tasks[0].errors;
    assert!(task_errors.on("pipeline")[0].contains("not an upstream pipeline"));
}

#[test]
fn concurrent_validation_and_replacement() {
    let (config, service) = service();
    let empty = Configuration::new().with_group(PipelineGroup::new("main"));

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..50 {
                service.on_config_change(if i % 2 == 0 { &empty } else { &config });
            }
        });
        for _ in 0..3 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let mut c = Configuration::from_yaml(CONFIG)
                        .unwrap()
                        .find_pipeline("C")
                        .unwrap()
                        .clone();
                    // Either B exists with its stage or nothing does; never a mix
                    let valid = service.validate_pipeline(&mut c);
                    if !valid {
                        assert!(c.materials[0].errors.on("pipelineName").len() == 1);
                    }
                }
            });
        }
    });
}

fn chain_of(length: usize) -> Configuration {
    let mut group = PipelineGroup::new("chain");
    for i in 0..length {
        let mut pipeline = Pipeline::new(&format!("p{}", i))
            .with_stage(Stage::new("s").with_job(Job::new("j").with_task(Task::exec("make"))));
        if i > 0 {
            pipeline = pipeline.with_material(Material::dependency(&format!("p{}", i - 1), "s"));
        }
        group = group.with_pipeline(pipeline);
    }
    Configuration::new().with_group(group)
}

#[test]
fn tip_of_a_long_dependency_chain_validates() {
    let config = chain_of(5000);
    let service = PipelineConfigService::from_config(&config);
    let mut tip = config.find_pipeline("p4999").unwrap().clone();

    assert!(service.validate_pipeline(&mut tip), "{:?}", tip.collect_errors());
}

#[test]
fn closing_a_long_dependency_chain_is_a_cycle() {
    let config = chain_of(5000);
    let service = PipelineConfigService::from_config(&config);
    let mut root = config
        .find_pipeline("p0")
        .unwrap()
        .clone()
        .with_material(Material::dependency("p4999", "s"));

    assert!(!service.validate_pipeline(&mut root));
    assert!(root.materials.errors.on(BASE)[0].starts_with("Circular dependency: p0 <- p4999"));
}
