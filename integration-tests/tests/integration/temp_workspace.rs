// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use jasmine_explorer::SETTINGS_FILE_NAME;
use jasmine_explorer_metadata::{LoadEvent, RunEvent, TestSuiteInfo};
use jasmine_explorer_runner::{
    adapter::JasmineAdapter,
    emitter::HostEvents,
    settings::{AdapterSettings, WorkerScripts},
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use walkdir::WalkDir;

/// How long to wait for any single event before failing the test.
pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) const SLOW_SPEC: &str = r#"describe("Slow", function () {
  it("hangs", function () {
    sleep();
  });
});
"#;

/// A copy of a fixture workspace in a temporary directory.
pub(crate) struct TempWorkspace {
    // Held for its Drop impl.
    _dir: Utf8TempDir,
    root: Utf8PathBuf,
}

impl TempWorkspace {
    /// Creates a copy of the `basic` fixture workspace.
    pub(crate) fn new() -> Self {
        let workspace = Self::empty();
        let fixture = Utf8Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/basic");
        for entry in WalkDir::new(&fixture) {
            let entry = entry.expect("fixture entry is readable");
            let rel = entry
                .path()
                .strip_prefix(&fixture)
                .expect("entry is under the fixture dir");
            let dest = workspace.root.as_std_path().join(rel);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest).expect("created fixture dir");
            } else {
                std::fs::copy(entry.path(), &dest).expect("copied fixture file");
            }
        }
        workspace
    }

    /// Creates an empty workspace.
    pub(crate) fn empty() -> Self {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        // Workers report canonical paths, so compare against those.
        let root = dir
            .path()
            .canonicalize_utf8()
            .expect("temp dir is canonicalizable");
        Self { _dir: dir, root }
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(crate) fn path(&self, rel: &str) -> Utf8PathBuf {
        self.root.join(rel)
    }

    pub(crate) fn write(&self, rel: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("created parent dir");
        }
        std::fs::write(&path, contents).expect("wrote file");
        path
    }

    /// Settings that run the fake worker instead of a JavaScript runtime.
    pub(crate) fn settings(&self) -> AdapterSettings {
        AdapterSettings {
            runtime_path: Some(env!("CARGO_BIN_EXE_fake-worker").into()),
            worker_scripts: Some(WorkerScripts {
                load: "load".into(),
                run: "run".into(),
            }),
            ..Default::default()
        }
    }

    pub(crate) fn adapter(&self) -> (JasmineAdapter, HostEvents) {
        JasmineAdapter::new(self.root.clone(), self.settings())
    }

    /// Writes a settings file for the command-line host.
    pub(crate) fn write_cli_settings(&self) {
        let contents = format!(
            "runtime-path = {}\n\n[worker-scripts]\nload = \"load\"\nrun = \"run\"\n",
            serde_json::to_string(env!("CARGO_BIN_EXE_fake-worker")).expect("path serializes"),
        );
        self.write(SETTINGS_FILE_NAME, &contents);
    }
}

pub(crate) async fn recv<T>(rx: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("event arrived in time")
        .expect("event channel is open")
}

/// Receives a load event pair, returning the loaded suite.
pub(crate) async fn recv_load(rx: &mut UnboundedReceiver<LoadEvent>) -> Option<TestSuiteInfo> {
    assert_eq!(recv(rx).await, LoadEvent::Started);
    match recv(rx).await {
        LoadEvent::Finished { suite } => suite,
        other => panic!("expected load to finish, got {other:?}"),
    }
}

/// Receives run events up to and including `Finished`.
pub(crate) async fn recv_run(rx: &mut UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    loop {
        let event = recv(rx).await;
        let finished = event == RunEvent::Finished;
        events.push(event);
        if finished {
            return events;
        }
    }
}
