// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::temp_workspace::*;
use camino::{Utf8Path, Utf8PathBuf};
use jasmine_explorer_metadata::{RunEvent, TestState};
use jasmine_explorer_runner::{
    adapter::JasmineAdapter,
    debug::{ATTACH_TIMEOUT, AttachRequest, BreakpointId, DebugHost, DebugSessionId},
    emitter::HostEvents,
    errors::DebugHostError,
};
use pretty_assertions::assert_eq;
use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::broadcast;

const SESSION: DebugSessionId = DebugSessionId(1);

/// A host that records what it's asked to do and attaches instantly.
struct FakeDebugHost {
    fail_attach: bool,
    next_breakpoint: AtomicU64,
    breakpoints: Mutex<Vec<(BreakpointId, Utf8PathBuf, u32)>>,
    requests: Mutex<Vec<AttachRequest>>,
    terminated: broadcast::Sender<DebugSessionId>,
}

impl FakeDebugHost {
    fn new(fail_attach: bool) -> Arc<Self> {
        Arc::new(Self {
            fail_attach,
            next_breakpoint: AtomicU64::new(0),
            breakpoints: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            terminated: broadcast::channel(16).0,
        })
    }

    fn breakpoints(&self) -> Vec<(Utf8PathBuf, u32)> {
        self.breakpoints
            .lock()
            .unwrap()
            .iter()
            .map(|(_, file, line)| (file.clone(), *line))
            .collect()
    }

    fn requests(&self) -> Vec<AttachRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn end_session(&self, session: DebugSessionId) {
        self.terminated
            .send(session)
            .expect("the core is subscribed to terminations");
    }
}

impl DebugHost for FakeDebugHost {
    fn add_breakpoint(&self, file: &Utf8Path, line: u32) -> BreakpointId {
        let id = BreakpointId(self.next_breakpoint.fetch_add(1, Ordering::SeqCst));
        self.breakpoints
            .lock()
            .unwrap()
            .push((id, file.to_owned(), line));
        id
    }

    fn remove_breakpoint(&self, breakpoint: BreakpointId) {
        self.breakpoints
            .lock()
            .unwrap()
            .retain(|(id, _, _)| *id != breakpoint);
    }

    fn start_debugging(
        &self,
        request: AttachRequest,
    ) -> impl Future<Output = Result<DebugSessionId, DebugHostError>> + Send {
        self.requests.lock().unwrap().push(request);
        let result = if self.fail_attach {
            Err(DebugHostError::new("no debugger available"))
        } else {
            Ok(SESSION)
        };
        async move { result }
    }

    fn session_terminated(&self) -> broadcast::Receiver<DebugSessionId> {
        self.terminated.subscribe()
    }
}

async fn loaded_adapter(workspace: &TempWorkspace) -> (Arc<JasmineAdapter>, HostEvents) {
    let mut settings = workspace.settings();
    settings.break_on_first_line = true;
    settings.debugger_port = 9339;
    settings.debug_profile = Some("Attach to worker".to_owned());
    let (adapter, mut events) = JasmineAdapter::new(workspace.root(), settings);
    adapter.load().await;
    recv_load(&mut events.load).await.expect("tests were loaded");
    (Arc::new(adapter), events)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition was met in time");
}

async fn recv_running(events: &mut HostEvents, id: &str) {
    loop {
        if let RunEvent::Test(event) = recv(&mut events.run).await {
            assert_eq!((event.test.id(), event.state), (id, TestState::Running));
            return;
        }
    }
}

#[tokio::test]
async fn debug_attaches_with_breakpoint() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = loaded_adapter(&workspace).await;
    let host = FakeDebugHost::new(false);

    adapter
        .debug(&["Math adds".to_owned()], host.clone())
        .await
        .expect("debug run started");
    let run = recv_run(&mut events.run).await;
    assert_eq!(
        run.first(),
        Some(&RunEvent::Started {
            tests: vec!["Math adds".to_owned()],
        })
    );
    assert_eq!(run.last(), Some(&RunEvent::Finished));

    assert_eq!(
        host.requests(),
        [AttachRequest {
            profile: Some("Attach to worker".to_owned()),
            port: 9339,
            timeout: ATTACH_TIMEOUT,
            stop_on_entry: false,
            cwd: workspace.root().to_owned(),
        }],
    );
    // "adds" is declared on line 1; the breakpoint goes on the line below.
    assert_eq!(
        host.breakpoints(),
        [(workspace.path("spec/math.spec.js"), 2)],
    );

    host.end_session(SESSION);
    wait_until(|| host.breakpoints().is_empty()).await;
}

#[tokio::test]
async fn ending_the_session_kills_the_worker() {
    let workspace = TempWorkspace::new();
    workspace.write("spec/slow.spec.js", SLOW_SPEC);
    let (adapter, mut events) = loaded_adapter(&workspace).await;
    let host = FakeDebugHost::new(false);

    let debug = tokio::spawn({
        let adapter = adapter.clone();
        let host = host.clone();
        async move { adapter.debug(&["Slow hangs".to_owned()], host).await }
    });

    recv_running(&mut events, "Slow hangs").await;
    host.end_session(SESSION);

    let rest = recv_run(&mut events.run).await;
    assert_eq!(rest.last(), Some(&RunEvent::Finished));
    debug
        .await
        .expect("debug task completed")
        .expect("debug run succeeded");
    wait_until(|| host.breakpoints().is_empty()).await;
    assert!(!adapter.is_running());
}

#[tokio::test]
async fn failed_attach_terminates_the_worker() {
    let workspace = TempWorkspace::new();
    workspace.write("spec/slow.spec.js", SLOW_SPEC);
    let (adapter, mut events) = loaded_adapter(&workspace).await;
    let host = FakeDebugHost::new(true);

    adapter
        .debug(&["Slow hangs".to_owned()], host.clone())
        .await
        .expect("debug run started");

    let run = recv_run(&mut events.run).await;
    assert_eq!(run.last(), Some(&RunEvent::Finished));
    assert_eq!(host.requests().len(), 1);
    wait_until(|| host.breakpoints().is_empty()).await;
}

#[tokio::test]
async fn debug_before_load_does_nothing() {
    let workspace = TempWorkspace::new();
    let (adapter, mut events) = workspace.adapter();
    let host = FakeDebugHost::new(false);

    adapter
        .debug(&["Math adds".to_owned()], host.clone())
        .await
        .expect("nothing to do");
    assert!(events.run.try_recv().is_err());
    assert!(host.requests().is_empty());
    assert!(host.breakpoints().is_empty());
}
