// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewarden contributors

//! Command-line behaviour

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const VALID: &str = r#"
groups:
  - name: main
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
      - name: deploy
        materials:
          - type: dependency
            pipeline: build
            stage: compile
        stages:
          - name: ship
            jobs:
              - name: push
                tasks:
                  - type: exec
                    command: ./push.sh
"#;

const CYCLIC: &str = r#"
groups:
  - name: main
    pipelines:
      - name: ping
        materials:
          - type: dependency
            pipeline: pong
            stage: s
        stages:
          - name: s
            jobs:
              - name: j
                tasks:
                  - type: exec
                    command: "true"
      - name: pong
        materials:
          - type: dependency
            pipeline: ping
            stage: s
        stages:
          - name: s
            jobs:
              - name: j
                tasks:
                  - type: exec
                    command: "true"
"#;

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn pipewarden() -> Command {
    let mut cmd = Command::cargo_bin("pipewarden").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn validate_accepts_valid_configuration() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "pipelines.yaml", VALID);

    pipewarden()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid!"));
}

#[test]
fn validate_reports_cycle_and_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "pipelines.yml", CYCLIC);

    pipewarden()
        .args(["validate", "--format", "json"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Circular dependency: ping <- pong <- ping"));
}

#[test]
fn validate_single_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "pipelines.yaml", VALID);

    pipewarden()
        .args(["validate", "--pipeline", "DEPLOY"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("pipeline 'deploy'"))
        .stdout(predicate::str::contains("pipeline 'build'").not());

    pipewarden()
        .args(["validate", "--pipeline", "missing"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn json_configuration_is_accepted() {
    let dir = TempDir::new().unwrap();
    let json = r#"{"groups":[{"name":"g","pipelines":[{"name":"solo","stages":[
        {"name":"s","jobs":[{"name":"j","tasks":[{"type":"exec","command":"make"}]}]}]}]}]}"#;
    let path = write_config(&dir, "pipelines.json", json);

    pipewarden().arg("validate").arg(&path).assert().success();
}

#[test]
fn missing_and_unsupported_files_fail() {
    let dir = TempDir::new().unwrap();

    pipewarden()
        .arg("validate")
        .arg(dir.path().join("nope.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    let path = write_config(&dir, "pipelines.ini", "x=1");
    pipewarden()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported"));
}

#[test]
fn graph_renders_mermaid() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "pipelines.yaml", VALID);

    pipewarden()
        .args(["graph", "--format", "mermaid"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("build -->|compile| deploy"));
}

#[test]
fn can_delete_explains_blockers() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "pipelines.yaml", VALID);

    pipewarden()
        .arg("can-delete")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("pipeline 'deploy' depends on it"))
        .stdout(predicate::str::contains("Delete this pipeline."));
}

#[test]
fn materials_lists_users() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "pipelines.yaml", VALID);

    pipewarden()
        .arg("materials")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("GIT (https://example.com/app.git)"));

    pipewarden()
        .args(["materials", "--shared"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("No materials found."));
}
