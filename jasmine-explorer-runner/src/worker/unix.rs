// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use libc::SIGTERM;
use tokio::process::{Child, Command};

/// Puts the worker in its own process group, so that terminal signals aimed at the host don't
/// reach it directly and termination reaches its children too.
pub(super) fn set_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

/// Asks the worker's process group to shut down.
pub(super) fn terminate_child(child: &mut Child) {
    if let Some(pid) = child.id() {
        // The worker is the leader of its own process group.
        unsafe {
            libc::kill(-(pid as libc::pid_t), SIGTERM);
        }
    }
}
