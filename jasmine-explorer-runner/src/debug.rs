// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running tests under a debugger.
//!
//! The host owns the debugger: the core only starts a run worker that waits for a debugger on a
//! known port, and asks the host (through [`DebugHost`]) to attach to it.

use crate::{
    adapter::JasmineAdapter,
    errors::{DebugHostError, RunError},
    worker::WorkerControl,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    oneshot,
};
use tracing::{debug, error, info};

/// How long the host is given to attach to the worker.
pub const ATTACH_TIMEOUT: Duration = Duration::from_secs(30);

/// A breakpoint handle issued by the host.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BreakpointId(pub u64);

/// A debug session handle issued by the host.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DebugSessionId(pub u64);

/// A request to attach the host's debugger to a waiting worker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttachRequest {
    /// The host's launch profile to base the session on, if configured.
    pub profile: Option<String>,

    /// The port the worker's debugger endpoint listens on.
    pub port: u16,

    /// How long the host should keep trying to attach.
    pub timeout: Duration,

    /// Whether the debugger should pause on the first statement. Always false: the worker is
    /// started paused already.
    pub stop_on_entry: bool,

    /// The worker's working directory.
    pub cwd: Utf8PathBuf,
}

/// The debugging facilities of the host.
pub trait DebugHost: Send + Sync + 'static {
    /// Adds a breakpoint at the given zero-based line.
    fn add_breakpoint(&self, file: &Utf8Path, line: u32) -> BreakpointId;

    /// Removes a breakpoint previously added with [`add_breakpoint`](Self::add_breakpoint).
    fn remove_breakpoint(&self, breakpoint: BreakpointId);

    /// Starts a debug session attached to a worker.
    fn start_debugging(
        &self,
        request: AttachRequest,
    ) -> impl Future<Output = Result<DebugSessionId, DebugHostError>> + Send;

    /// Subscribes to debug session terminations.
    fn session_terminated(&self) -> broadcast::Receiver<DebugSessionId>;
}

impl JasmineAdapter {
    /// Runs the given tests under the host's debugger.
    ///
    /// Does nothing if no configuration is cached (nothing was loaded yet) or `ids` is empty.
    /// Otherwise this behaves like [`run`](Self::run), with the runtime waiting for a debugger on
    /// the configured port. Debugger failures are logged and abort the workflow; the run still
    /// ends with `Finished`.
    pub async fn debug<H: DebugHost>(&self, ids: &[String], host: Arc<H>) -> Result<(), RunError> {
        let Some(config) = self.loaded_config() else {
            debug!("no configuration loaded, not debugging");
            return Ok(());
        };
        let Some(first) = ids.first() else {
            debug!("no tests to debug");
            return Ok(());
        };

        let breakpoint = if config.break_on_first_line {
            match self.node_index().first_test_location(first) {
                Some((file, line)) => {
                    debug!(%file, line, "adding breakpoint below the first test");
                    Some(host.add_breakpoint(&file, line + 1))
                }
                None => {
                    debug!(id = %first, "no source location for first test, no breakpoint added");
                    None
                }
            }
        } else {
            None
        };
        let remove_breakpoint = || {
            if let Some(breakpoint) = breakpoint {
                host.remove_breakpoint(breakpoint);
            }
        };

        let inspect_arg = format!("--inspect-brk={}", config.debugger_port);
        let run = match self.start_run(ids, &[inspect_arg]) {
            Ok(run) => run,
            Err(err) => {
                remove_breakpoint();
                return Err(err);
            }
        };
        let Some(control) = run.control.clone() else {
            error!("failed to start worker for debugging, not attaching");
            remove_breakpoint();
            self.drive_run(run).await;
            return Ok(());
        };

        // Subscribe before attaching, so that a session that ends right away is still seen.
        let terminated = host.session_terminated();
        let (session_tx, session_rx) = oneshot::channel();
        tokio::spawn(watch_session(
            host.clone(),
            terminated,
            session_rx,
            control.clone(),
            breakpoint,
        ));

        let request = AttachRequest {
            profile: config.debug_profile.clone(),
            port: config.debugger_port,
            timeout: ATTACH_TIMEOUT,
            stop_on_entry: false,
            cwd: config.cwd.clone(),
        };
        let attach = async move {
            match tokio::time::timeout(ATTACH_TIMEOUT, host.start_debugging(request)).await {
                Ok(Ok(session)) => {
                    info!(?session, "debugger attached");
                    _ = session_tx.send(session);
                }
                Ok(Err(err)) => {
                    error!("failed to attach debugger: {err}");
                    control.terminate();
                }
                Err(_) => {
                    error!("timed out attaching debugger after {ATTACH_TIMEOUT:?}");
                    control.terminate();
                }
            }
        };

        tokio::join!(self.drive_run(run), attach);
        Ok(())
    }
}

/// Waits for the given debug session to end, then kills the worker and cleans up the breakpoint.
///
/// If the session never starts (`session` is dropped), only the breakpoint is cleaned up.
async fn watch_session<H: DebugHost>(
    host: Arc<H>,
    mut terminated: broadcast::Receiver<DebugSessionId>,
    session: oneshot::Receiver<DebugSessionId>,
    control: WorkerControl,
    breakpoint: Option<BreakpointId>,
) {
    if let Ok(session) = session.await {
        loop {
            match terminated.recv().await {
                Ok(ended) if ended == session => break,
                Ok(_) => {}
                Err(RecvError::Lagged(count)) => {
                    debug!(count, "missed debug session terminations");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(?session, "debug session ended, killing worker");
        control.kill();
    }

    if let Some(breakpoint) = breakpoint {
        host.remove_breakpoint(breakpoint);
    }
}
