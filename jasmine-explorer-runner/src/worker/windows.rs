// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use tokio::process::{Child, Command};
use tracing::debug;

pub(super) fn set_process_group(_cmd: &mut Command) {}

/// There's no graceful termination signal on Windows, so this is a hard kill.
pub(super) fn terminate_child(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        debug!("failed to kill worker: {err}");
    }
}
