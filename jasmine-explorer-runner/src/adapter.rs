// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestration core.
//!
//! The main structure in this module is [`JasmineAdapter`], which owns all state for one workspace
//! folder: the cached configuration, the index over the last loaded tree, and the handle to the
//! running worker.

use crate::{
    config::LoadedConfig,
    emitter::{HostEmitters, HostEvents},
    errors::{ConfigReadError, DisplayErrorChain, RunError},
    helpers::{lock, plural},
    settings::AdapterSettings,
    stack_trace::decorate_failure,
    tree::{FileSuiteAccumulator, NodeIndex},
    worker::{WorkerCommand, WorkerControl, WorkerEvent, WorkerKind, WorkerProcess},
};
use camino::{Utf8Path, Utf8PathBuf};
use jasmine_explorer_metadata::{
    LoadEvent, NodeRef, RunEvent, TestEvent, TestSuiteInfo, WorkerReport, WorkerTestEvent,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};
use tracing::{debug, error, info, warn};

/// The orchestration core for one workspace folder.
///
/// All methods take `&self`; share the adapter through an [`Arc`] to drive it from several tasks,
/// for example to [`cancel`](Self::cancel) a run from a signal handler.
#[derive(Debug)]
pub struct JasmineAdapter {
    workspace: Utf8PathBuf,
    pub(crate) settings: Mutex<AdapterSettings>,
    config: Mutex<Option<Arc<LoadedConfig>>>,
    nodes: Mutex<Arc<NodeIndex>>,
    running: Mutex<Option<RunningWorker>>,
    next_run_id: AtomicU64,
    pub(crate) emitters: HostEmitters,
}

#[derive(Debug)]
struct RunningWorker {
    run_id: u64,
    // None while the worker is being spawned.
    control: Option<WorkerControl>,
    cancel_requested: bool,
}

/// A run that has been started but not driven to completion yet.
///
/// `Started` has been emitted for it; [`JasmineAdapter::drive_run`] must be called to emit
/// `Finished`.
#[derive(Debug)]
pub(crate) struct StartedRun {
    run_id: u64,
    worker: Option<WorkerProcess>,
    pub(crate) control: Option<WorkerControl>,
    nodes: Arc<NodeIndex>,
}

impl JasmineAdapter {
    /// Creates an adapter for the given workspace folder, along with the streams it publishes
    /// events on.
    pub fn new(workspace: impl Into<Utf8PathBuf>, settings: AdapterSettings) -> (Self, HostEvents) {
        let (emitters, events) = HostEmitters::new();
        let adapter = Self {
            workspace: workspace.into(),
            settings: Mutex::new(settings),
            config: Mutex::new(None),
            nodes: Mutex::new(Arc::new(NodeIndex::default())),
            running: Mutex::new(None),
            next_run_id: AtomicU64::new(0),
            emitters,
        };
        (adapter, events)
    }

    /// Returns the workspace folder.
    pub fn workspace(&self) -> &Utf8Path {
        &self.workspace
    }

    /// Returns the current host settings.
    pub fn settings(&self) -> AdapterSettings {
        lock(&self.settings).clone()
    }

    /// Returns the cached configuration, if any.
    pub fn loaded_config(&self) -> Option<Arc<LoadedConfig>> {
        lock(&self.config).clone()
    }

    /// Returns the index over the last loaded tree.
    pub fn node_index(&self) -> Arc<NodeIndex> {
        lock(&self.nodes).clone()
    }

    /// Returns true if a run or debug session is in progress.
    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Drops the cached configuration. The next load or run resolves it again.
    pub fn invalidate_config(&self) {
        if lock(&self.config).take().is_some() {
            debug!(workspace = %self.workspace, "dropped cached configuration");
        }
    }

    /// Returns the cached configuration, resolving it first if necessary.
    ///
    /// Returns `None` if the configuration can't be resolved. This is not an error: the folder
    /// just has no tests.
    pub(crate) fn resolve_config(&self) -> Option<Arc<LoadedConfig>> {
        if let Some(config) = self.loaded_config() {
            return Some(config);
        }

        let settings = self.settings();
        match LoadedConfig::resolve(&self.workspace, &settings) {
            Ok(config) => {
                let config = Arc::new(config);
                *lock(&self.config) = Some(config.clone());
                Some(config)
            }
            Err(ConfigReadError::NoWorkerScripts) => {
                warn!(
                    workspace = %self.workspace,
                    "no tests loaded: the host hasn't configured the worker scripts",
                );
                None
            }
            Err(err) => {
                info!(
                    workspace = %self.workspace,
                    "no tests loaded: {}",
                    DisplayErrorChain::new(&err),
                );
                None
            }
        }
    }

    /// Discovers the test tree.
    ///
    /// Emits [`LoadEvent::Started`], then [`LoadEvent::Finished`] once the load worker exits.
    pub async fn load(&self) {
        self.emitters.load(LoadEvent::Started);
        let suite = self.load_tree().await;
        *lock(&self.nodes) = Arc::new(NodeIndex::new(suite.clone()));
        self.emitters.load(LoadEvent::Finished { suite });
    }

    async fn load_tree(&self) -> Option<TestSuiteInfo> {
        let config = self.resolve_config()?;

        let command = WorkerCommand::new(WorkerKind::Load, &config, &[], None);
        let (mut worker, _control) = match command.spawn() {
            Ok(worker) => worker,
            Err(err) => {
                error!("{}", DisplayErrorChain::new(&err));
                return None;
            }
        };

        let mut files = FileSuiteAccumulator::new(&config.spec_dir);
        loop {
            match worker.next_event().await {
                WorkerEvent::Report(WorkerReport::FileSuite(suite)) => files.add(suite),
                WorkerEvent::Report(report) => {
                    debug!(?report, "ignoring run report from load worker");
                }
                WorkerEvent::Exited(_) => break,
            }
        }

        let file_count = files.file_count();
        let root = files.finish();
        let test_count = root.as_ref().map_or(0, |root| root.test_count());
        info!(
            workspace = %self.workspace,
            "loaded {test_count} {} in {file_count} {}",
            plural::tests_str(test_count),
            plural::files_str(file_count),
        );
        root
    }

    /// Runs the given tests.
    ///
    /// `ids` may name suites, which expand to all tests under them. Unknown IDs are ignored; if no
    /// ID resolves to a test, all tests are run. `extra_args` are passed to the runtime.
    ///
    /// Emits [`RunEvent::Started`], any number of suite and test events, and [`RunEvent::Finished`]
    /// once the run worker exits. Returns an error without emitting anything if a run is already
    /// in progress.
    pub async fn run(&self, ids: &[String], extra_args: &[String]) -> Result<(), RunError> {
        let run = self.start_run(ids, extra_args)?;
        self.drive_run(run).await;
        Ok(())
    }

    /// Asks the running worker, if any, to shut down.
    ///
    /// This is advisory: the run still ends with [`RunEvent::Finished`] once the worker exits.
    pub fn cancel(&self) {
        let mut running = lock(&self.running);
        let Some(running) = running.as_mut() else {
            debug!("no run in progress, nothing to cancel");
            return;
        };
        info!(run_id = running.run_id, "cancelling test run");
        running.cancel_requested = true;
        if let Some(control) = &running.control {
            control.terminate();
        }
    }

    /// Reserves the run slot, emits `Started`, and spawns the run worker.
    pub(crate) fn start_run(
        &self,
        ids: &[String],
        extra_args: &[String],
    ) -> Result<StartedRun, RunError> {
        let run_id = {
            let mut running = lock(&self.running);
            if running.is_some() {
                return Err(RunError::RunInProgress);
            }
            let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
            *running = Some(RunningWorker {
                run_id,
                control: None,
                cancel_requested: false,
            });
            run_id
        };

        self.emitters.run(RunEvent::Started {
            tests: ids.to_vec(),
        });

        let nodes = self.node_index();
        let mut run = StartedRun {
            run_id,
            worker: None,
            control: None,
            nodes,
        };
        let Some(config) = self.resolve_config() else {
            return Ok(run);
        };

        let tests: Vec<String> = run
            .nodes
            .resolve_tests(ids.iter().map(String::as_str))
            .into_keys()
            .collect();
        let test_ids = (!tests.is_empty()).then_some(tests.as_slice());
        debug!(
            run_id,
            "starting run with {}",
            match test_ids {
                Some(tests) => format!("{} {}", tests.len(), plural::tests_str(tests.len())),
                None => "all tests".to_owned(),
            },
        );

        match WorkerCommand::new(WorkerKind::Run, &config, extra_args, test_ids).spawn() {
            Ok((worker, control)) => {
                let mut running = lock(&self.running);
                if let Some(running) = running.as_mut().filter(|r| r.run_id == run_id) {
                    if running.cancel_requested {
                        control.terminate();
                    }
                    running.control = Some(control.clone());
                }
                run.worker = Some(worker);
                run.control = Some(control);
            }
            Err(err) => {
                error!(run_id, "{}", DisplayErrorChain::new(&err));
            }
        }
        Ok(run)
    }

    /// Forwards the run worker's events until it exits, then emits `Finished`.
    pub(crate) async fn drive_run(&self, run: StartedRun) {
        if let Some(mut worker) = run.worker {
            loop {
                match worker.next_event().await {
                    WorkerEvent::Report(WorkerReport::Suite(event)) => {
                        self.emitters.run(RunEvent::Suite(event));
                    }
                    WorkerEvent::Report(WorkerReport::Test(event)) => {
                        let event = decorate(event, &run.nodes);
                        self.emitters.run(RunEvent::Test(event));
                    }
                    WorkerEvent::Report(report @ WorkerReport::FileSuite(_)) => {
                        debug!(?report, "ignoring load report from run worker");
                    }
                    WorkerEvent::Exited(_) => break,
                }
            }
        }

        {
            let mut running = lock(&self.running);
            if running.as_ref().is_some_and(|r| r.run_id == run.run_id) {
                *running = None;
            }
        }
        debug!(run_id = run.run_id, "run finished");
        self.emitters.run(RunEvent::Finished);
    }
}

fn decorate(event: WorkerTestEvent, nodes: &NodeIndex) -> TestEvent {
    if event.failures.is_empty() {
        return event.into_test_event(Vec::new());
    }

    let file = match &event.test {
        NodeRef::Node(node) if node.file().is_some() => node.file(),
        test => nodes.file_of(test.id()),
    };
    let decorations = event
        .failures
        .iter()
        .filter_map(|failure| decorate_failure(failure, file))
        .collect();
    event.into_test_event(decorations)
}
