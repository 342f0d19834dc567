// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for the `jasmine-explorer` command-line host.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum JasmineExplorerExitCode {}

impl JasmineExplorerExitCode {
    /// No errors occurred and all selected tests passed.
    pub const OK: i32 = 0;

    /// No tests were found, but no other errors occurred.
    pub const NO_TESTS_FOUND: i32 = 4;

    /// One or more tests failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The run was cancelled by a signal.
    pub const RUN_CANCELLED: i32 = 101;

    /// A user issue happened while setting up an invocation, for example invalid settings.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing output failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
