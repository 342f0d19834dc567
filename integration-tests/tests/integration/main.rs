// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests
//!
//! These drive a [`JasmineAdapter`] end to end. The runtime is replaced with the `fake-worker`
//! binary from this package, which understands just enough of the spec file syntax to produce
//! realistic worker output.

use jasmine_explorer_metadata::{
    Decoration, NodeRef, RunEvent, SuiteEvent, SuiteState, TestEvent, TestNode, TestState,
    TestSuiteInfo,
};
use jasmine_explorer_runner::{errors::RunError, watch::SaveReaction};
use pretty_assertions::assert_eq;
use std::sync::Arc;

mod cli;
mod debug;
mod temp_workspace;

use temp_workspace::*;

fn ids(node: &TestNode, out: &mut Vec<String>) {
    out.push(node.id().to_owned());
    for child in node.children() {
        ids(child, out);
    }
}

fn all_ids(root: &TestSuiteInfo) -> Vec<String> {
    let mut out = Vec::new();
    for child in &root.children {
        ids(child, &mut out);
    }
    out
}

fn test_states(events: &[RunEvent]) -> Vec<(String, TestState)> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::Test(event) => Some((event.test.id().to_owned(), event.state)),
            _ => None,
        })
        .collect()
}

fn test_event<'a>(events: &'a [RunEvent], id: &str, state: TestState) -> &'a TestEvent {
    events
        .iter()
        .find_map(|event| match event {
            RunEvent::Test(event) if event.test.id() == id && event.state == state => Some(event),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no {state:?} event for {id}"))
}

#[tokio::test]
async fn missing_config_loads_nothing() {
    let workspace = TempWorkspace::empty();
    let (adapter, mut events) = workspace.adapter();

    adapter.load().await;
    assert_eq!(recv_load(&mut events.load).await, None);
    assert!(adapter.node_index().is_empty());
    assert!(adapter.loaded_config().is_none());
}

#[tokio::test]
async fn load_builds_sorted_tree() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = workspace.adapter();

    adapter.load().await;
    let root = recv_load(&mut events.load)
        .await
        .expect("tests were loaded");

    let spec_dir = workspace.path("spec");
    assert_eq!(root.id, "root");
    assert_eq!(root.label, "Jasmine");
    assert_eq!(
        root.children.iter().map(TestNode::label).collect::<Vec<_>>(),
        // Files sort case-insensitively; excluded files are not loaded.
        ["math.spec.js", "Strings.spec.js"],
    );
    assert_eq!(
        all_ids(&root),
        [
            spec_dir.join("math.spec.js").to_string(),
            "Math".to_owned(),
            "Math adds".to_owned(),
            "Math divides".to_owned(),
            "Math subtracts".to_owned(),
            spec_dir.join("Strings.spec.js").to_string(),
            "Strings".to_owned(),
            "Strings trim".to_owned(),
            "Strings trim removes whitespace".to_owned(),
            "Strings uses helpers".to_owned(),
        ],
    );
    assert_eq!(root.test_count(), 5);

    let index = adapter.node_index();
    assert_eq!(index.get("Math divides").and_then(TestNode::line), Some(5));
    assert_eq!(
        index.file_of("Strings trim removes whitespace"),
        Some(spec_dir.join("Strings.spec.js").as_path()),
    );
}

#[tokio::test]
async fn load_is_repeatable() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = workspace.adapter();

    adapter.load().await;
    let first = recv_load(&mut events.load).await;
    adapter.load().await;
    let second = recv_load(&mut events.load).await;
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[tokio::test]
async fn run_all_reports_every_spec() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = workspace.adapter();
    adapter.load().await;
    recv_load(&mut events.load).await;

    adapter.run(&[], &[]).await.expect("run started");
    let run = recv_run(&mut events.run).await;

    assert_eq!(run.first(), Some(&RunEvent::Started { tests: vec![] }));
    assert_eq!(
        run.iter().filter(|event| **event == RunEvent::Finished).count(),
        1
    );
    assert_eq!(
        test_states(&run),
        // The worker visits files in byte order, unlike the tree.
        [
            ("Strings trim removes whitespace".to_owned(), TestState::Running),
            ("Strings trim removes whitespace".to_owned(), TestState::Passed),
            ("Strings uses helpers".to_owned(), TestState::Running),
            ("Strings uses helpers".to_owned(), TestState::Failed),
            ("Math adds".to_owned(), TestState::Running),
            ("Math adds".to_owned(), TestState::Passed),
            ("Math divides".to_owned(), TestState::Running),
            ("Math divides".to_owned(), TestState::Failed),
            ("Math subtracts".to_owned(), TestState::Running),
            ("Math subtracts".to_owned(), TestState::Skipped),
        ],
    );
    assert!(run.contains(&RunEvent::Suite(SuiteEvent {
        suite: NodeRef::Id("Strings trim".to_owned()),
        state: SuiteState::Completed,
    })));

    // The failure points into the spec file: decorated on the failing line.
    let divides = test_event(&run, "Math divides", TestState::Failed);
    assert_eq!(divides.message.as_deref(), Some("Expected 0.5 to be 2."));
    assert_eq!(
        divides.decorations,
        [Decoration {
            line: 6,
            message: "Expected 0.5 to be 2.".to_owned(),
        }],
    );

    // The failure only points into a helper: no decoration.
    let helpers = test_event(&run, "Strings uses helpers", TestState::Failed);
    assert_eq!(helpers.message.as_deref(), Some("helper blew up"));
    assert!(helpers.decorations.is_empty());

    let skipped = test_event(&run, "Math subtracts", TestState::Skipped);
    assert!(skipped.message.is_some());
    assert!(!adapter.is_running());
}

#[tokio::test]
async fn run_expands_suites_and_ignores_unknown_ids() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = workspace.adapter();
    adapter.load().await;
    recv_load(&mut events.load).await;

    let ids = vec!["Strings trim".to_owned(), "No such test".to_owned()];
    adapter.run(&ids, &[]).await.expect("run started");
    let run = recv_run(&mut events.run).await;

    assert_eq!(run.first(), Some(&RunEvent::Started { tests: ids }));
    assert_eq!(
        test_states(&run),
        [
            ("Strings trim removes whitespace".to_owned(), TestState::Running),
            ("Strings trim removes whitespace".to_owned(), TestState::Passed),
        ],
    );
}

#[tokio::test]
async fn run_without_loaded_config_only_starts_and_finishes() {
    let workspace = TempWorkspace::empty();
    let (adapter, mut events) = workspace.adapter();

    adapter.run(&[], &[]).await.expect("run started");
    assert_eq!(
        recv_run(&mut events.run).await,
        [RunEvent::Started { tests: vec![] }, RunEvent::Finished],
    );
}

#[tokio::test]
async fn cancel_ends_a_hanging_run_once() {
    let workspace = TempWorkspace::new();
    workspace.write("spec/slow.spec.js", SLOW_SPEC);
    let (adapter, mut events) = workspace.adapter();
    let adapter = Arc::new(adapter);
    adapter.load().await;
    recv_load(&mut events.load).await;

    let run = tokio::spawn({
        let adapter = adapter.clone();
        async move { adapter.run(&["Slow hangs".to_owned()], &[]).await }
    });

    assert_eq!(
        recv(&mut events.run).await,
        RunEvent::Started {
            tests: vec!["Slow hangs".to_owned()],
        },
    );
    loop {
        if let RunEvent::Test(event) = recv(&mut events.run).await {
            assert_eq!(event.test.id(), "Slow hangs");
            assert_eq!(event.state, TestState::Running);
            break;
        }
    }

    // A second run is rejected while the first one is in progress, without emitting anything.
    assert!(matches!(
        adapter.run(&[], &[]).await,
        Err(RunError::RunInProgress)
    ));

    adapter.cancel();
    let rest = recv_run(&mut events.run).await;
    assert_eq!(rest.last(), Some(&RunEvent::Finished));
    assert!(
        !rest
            .iter()
            .any(|event| matches!(event, RunEvent::Started { .. })),
        "the rejected run emitted events: {rest:?}"
    );

    run.await.expect("run task completed").expect("run succeeded");
    assert!(!adapter.is_running());
    assert!(events.run.try_recv().is_err(), "Finished is emitted once");
}

#[tokio::test]
async fn saving_the_config_reloads() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = workspace.adapter();
    adapter.load().await;
    let first = recv_load(&mut events.load).await.expect("tests were loaded");
    assert_eq!(first.children.len(), 2);

    let config = workspace.write(
        "spec/support/jasmine.json",
        r#"{ "spec_dir": "spec", "spec_files": ["math.spec.js"] }"#,
    );
    assert_eq!(adapter.file_saved(&config).await, SaveReaction::ReloadConfig);

    let second = recv_load(&mut events.load).await.expect("tests were loaded");
    assert_eq!(
        second.children.iter().map(TestNode::label).collect::<Vec<_>>(),
        ["math.spec.js"],
    );
    assert_eq!(
        adapter
            .loaded_config()
            .map(|config| config.spec_files.patterns().to_vec()),
        Some(vec!["math.spec.js".to_owned()]),
    );
}

#[tokio::test]
async fn saving_files_reloads_or_autoruns() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = workspace.adapter();
    adapter.load().await;
    recv_load(&mut events.load).await;

    let spec = workspace.write(
        "spec/math.spec.js",
        r#"describe("Math", function () {
  it("multiplies", function () {
    expect(2 * 2).toBe(4);
  });
});
"#,
    );
    assert_eq!(adapter.file_saved(&spec).await, SaveReaction::Reload);
    let reloaded = recv_load(&mut events.load).await.expect("tests were loaded");
    assert!(all_ids(&reloaded).contains(&"Math multiplies".to_owned()));
    assert!(!all_ids(&reloaded).contains(&"Math adds".to_owned()));

    let source = workspace.path("src/math.js");
    assert_eq!(adapter.file_saved(&source).await, SaveReaction::Autorun);
    recv(&mut events.autorun).await;
    assert!(events.load.try_recv().is_err());
}
