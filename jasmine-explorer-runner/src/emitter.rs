// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-facing event streams.

use jasmine_explorer_metadata::{LoadEvent, RunEvent};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;

/// The receiving ends of the events a [`JasmineAdapter`](crate::adapter::JasmineAdapter)
/// publishes.
///
/// Dropping a receiver is allowed: events for it are discarded.
#[derive(Debug)]
pub struct HostEvents {
    /// Load lifecycle events.
    pub load: UnboundedReceiver<LoadEvent>,

    /// Run lifecycle events.
    pub run: UnboundedReceiver<RunEvent>,

    /// Signals that a source file in the workspace folder was saved and tests should be rerun.
    pub autorun: UnboundedReceiver<()>,
}

#[derive(Debug)]
pub(crate) struct HostEmitters {
    load: UnboundedSender<LoadEvent>,
    run: UnboundedSender<RunEvent>,
    autorun: UnboundedSender<()>,
}

impl HostEmitters {
    pub(crate) fn new() -> (Self, HostEvents) {
        let (load_tx, load_rx) = unbounded_channel();
        let (run_tx, run_rx) = unbounded_channel();
        let (autorun_tx, autorun_rx) = unbounded_channel();
        (
            Self {
                load: load_tx,
                run: run_tx,
                autorun: autorun_tx,
            },
            HostEvents {
                load: load_rx,
                run: run_rx,
                autorun: autorun_rx,
            },
        )
    }

    pub(crate) fn load(&self, event: LoadEvent) {
        trace!(?event, "emitting load event");
        _ = self.load.send(event);
    }

    pub(crate) fn run(&self, event: RunEvent) {
        trace!(?event, "emitting run event");
        _ = self.run.send(event);
    }

    pub(crate) fn autorun(&self) {
        trace!("emitting autorun signal");
        _ = self.autorun.send(());
    }
}
