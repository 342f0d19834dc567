// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::temp_workspace::TempWorkspace;
use jasmine_explorer_metadata::{JasmineExplorerExitCode, TestSuiteInfo};
use pretty_assertions::assert_eq;
use std::process::{Command, Output};

fn cli(workspace: &TempWorkspace, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_jasmine-explorer-dup"));
    for (name, _) in std::env::vars() {
        if name.starts_with("JASMINE_EXPLORER_") {
            command.env_remove(name);
        }
    }
    command
        .args(["--workspace", workspace.root().as_str(), "--color", "never"])
        .args(args)
        .output()
        .expect("jasmine-explorer-dup ran")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout is UTF-8")
}

#[test]
fn list_json() {
    let workspace = TempWorkspace::new();
    workspace.write_cli_settings();

    let output = cli(&workspace, &["list", "--message-format", "json"]);
    assert_eq!(output.status.code(), Some(JasmineExplorerExitCode::OK));
    let suite: Option<TestSuiteInfo> =
        serde_json::from_slice(&output.stdout).expect("stdout is a JSON tree");
    let suite = suite.expect("tests were found");
    assert_eq!(suite.test_count(), 5);
    assert_eq!(suite.children[0].label(), "math.spec.js");
}

#[test]
fn list_human() {
    let workspace = TempWorkspace::new();
    workspace.write_cli_settings();

    let output = cli(&workspace, &["list"]);
    assert_eq!(output.status.code(), Some(JasmineExplorerExitCode::OK));
    let stdout = stdout(&output);
    assert!(stdout.contains("      adds (line 2)\n"), "stdout: {stdout}");
    assert!(stdout.ends_with("5 tests in 2 files\n"), "stdout: {stdout}");
}

#[test]
fn list_without_config_finds_nothing() {
    let workspace = TempWorkspace::empty();
    workspace.write_cli_settings();

    let output = cli(&workspace, &["list"]);
    assert_eq!(
        output.status.code(),
        Some(JasmineExplorerExitCode::NO_TESTS_FOUND)
    );
    assert_eq!(stdout(&output), "");
}

#[test]
fn run_with_failures() {
    let workspace = TempWorkspace::new();
    workspace.write_cli_settings();

    let output = cli(&workspace, &["run"]);
    assert_eq!(
        output.status.code(),
        Some(JasmineExplorerExitCode::TEST_RUN_FAILED)
    );
    let stdout = stdout(&output);
    assert!(stdout.contains("FAIL Math divides\n"), "stdout: {stdout}");
    let location = format!("at {}:7\n", workspace.path("spec/math.spec.js"));
    assert!(stdout.contains(&location), "stdout: {stdout}");
    assert!(
        stdout.contains("5 tests run: 2 passed, 2 failed, 1 skipped"),
        "stdout: {stdout}"
    );
}

#[test]
fn run_selected_passing_test() {
    let workspace = TempWorkspace::new();
    workspace.write_cli_settings();

    let output = cli(&workspace, &["run", "Math adds"]);
    assert_eq!(output.status.code(), Some(JasmineExplorerExitCode::OK));
    let stdout = stdout(&output);
    assert!(stdout.contains("Starting 1 selected ID\n"), "stdout: {stdout}");
    assert!(stdout.contains("PASS Math adds\n"), "stdout: {stdout}");
    assert!(!stdout.contains("Math divides"), "stdout: {stdout}");
}

#[test]
fn run_json_events() {
    let workspace = TempWorkspace::new();
    workspace.write_cli_settings();

    let output = cli(
        &workspace,
        &["run", "--message-format", "json", "Strings trim"],
    );
    assert_eq!(output.status.code(), Some(JasmineExplorerExitCode::OK));
    let events: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect();
    assert_eq!(
        events.first(),
        Some(&serde_json::json!({ "type": "started", "tests": ["Strings trim"] }))
    );
    assert_eq!(events.last(), Some(&serde_json::json!({ "type": "finished" })));
}

#[test]
fn missing_settings_file_is_a_setup_error() {
    let workspace = TempWorkspace::new();

    let output = cli(&workspace, &["--settings", "missing.toml", "list"]);
    assert_eq!(
        output.status.code(),
        Some(JasmineExplorerExitCode::SETUP_ERROR)
    );
}

#[test]
fn settings_without_worker_scripts_are_a_setup_error() {
    let workspace = TempWorkspace::new();
    workspace.write(
        jasmine_explorer::SETTINGS_FILE_NAME,
        &format!(
            "runtime-path = {}\n",
            serde_json::to_string(env!("CARGO_BIN_EXE_fake-worker")).expect("path serializes"),
        ),
    );

    let output = cli(&workspace, &["list"]);
    assert_eq!(
        output.status.code(),
        Some(JasmineExplorerExitCode::SETUP_ERROR)
    );
    assert_eq!(stdout(&output), "");
}
