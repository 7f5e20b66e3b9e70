// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const PIPELINE: &str = r#"
name: sweep-demo
config:
  cache: shared
steps:
  - name: f_ab
    parameters: [y, z]
    output: [a, b]
  - name: f_cd
    parameters: [x, a, z]
    output: [c, d]
  - name: f_aa
    parameters: [a]
    output: aa
  - name: f_i
    parameters: [aa, x, d]
    output: i
"#;

const SWEEP: &str = r#"
items:
  y: [1, 2]
  x: [3, 4]
  z: [5, 6]
  w: [0, 1]
dims:
  - [y, x]
  - z
  - w
"#;

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pipeflow.yaml"), PIPELINE).unwrap();
    std::fs::write(dir.path().join("sweep.yaml"), SWEEP).unwrap();
    dir
}

fn pipeflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pipeflow").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn graph_text_lists_steps_in_order() {
    let dir = workspace();
    pipeflow(dir.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. f_ab(y, z)"))
        .stdout(predicate::str::contains("[depends: f_cd, f_aa]").or(predicate::str::contains("[depends: f_aa, f_cd]")));
}

#[test]
fn graph_dot_and_mermaid() {
    let dir = workspace();
    pipeflow(dir.path())
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph pipeline {"));

    pipeflow(dir.path())
        .args(["graph", "-f", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph TD"));
}

#[test]
fn graph_reduced_merges_chain() {
    let dir = workspace();
    pipeflow(dir.path())
        .args(["graph", "--reduced", "i"])
        .assert()
        .success()
        .stdout(predicate::str::contains("f_ab+"))
        .stdout(predicate::str::contains("2. ").not());
}

#[test]
fn graph_missing_pipeline_file() {
    let dir = tempfile::tempdir().unwrap();
    pipeflow(dir.path())
        .arg("graph")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipeline file not found"));
}

#[test]
fn combinations_root_only() {
    let dir = workspace();
    pipeflow(dir.path())
        .args(["combinations", "c", "--root-only"])
        .assert()
        .success()
        .stdout("(x, y, z)\n");
}

#[test]
fn combinations_include_intermediates() {
    let dir = workspace();
    pipeflow(dir.path())
        .args(["combinations", "i"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(x, y, z)"))
        .stdout(predicate::str::contains("(aa, d, x)"));
}

#[test]
fn validate_accepts_good_pipeline() {
    let dir = workspace();
    pipeflow(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn validate_reports_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.yaml");
    std::fs::write(
        &path,
        "name: loop\nsteps:\n  - name: f\n    parameters: [b]\n    output: a\n  - name: g\n    parameters: [a]\n    output: b\n",
    )
    .unwrap();

    pipeflow(dir.path())
        .args(["validate", "--pipeline", "loop.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Circular dependency"));
}

#[test]
fn plan_text_report() {
    let dir = workspace();
    pipeflow(dir.path())
        .args(["plan", "i", "--sweep", "sweep.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sweep over 'i': 8 point(s)"))
        .stdout(predicate::str::contains("1. f_ab"));
}

#[test]
fn plan_json_report() {
    let dir = workspace();
    let output = pipeflow(dir.path())
        .args(["plan", "i", "--sweep", "sweep.yaml", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["counts"]["points"], 8);
    assert_eq!(report["precalculate"], serde_json::json!(["f_ab", "f_cd", "f_aa"]));

    let f_ab = report["counts"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "f_ab")
        .unwrap();
    assert_eq!(f_ab["keys"].as_array().unwrap().len(), 4);
}

#[test]
fn plan_nothing_repeats_above_threshold() {
    let dir = workspace();
    pipeflow(dir.path())
        .args(["plan", "i", "--sweep", "sweep.yaml", "--min-count", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No step repeats often enough"));
}

#[test]
fn plan_rejects_incomplete_sweep() {
    let dir = workspace();
    std::fs::write(dir.path().join("partial.yaml"), "items:\n  y: [1, 2]\n").unwrap();

    pipeflow(dir.path())
        .args(["plan", "i", "--sweep", "partial.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("x, z"));
}
