// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A copy of the `jasmine-explorer` binary, built in this package so that tests can find it
//! through `CARGO_BIN_EXE_jasmine-explorer-dup`.

use clap::Parser;
use color_eyre::Result;
use jasmine_explorer::JasmineExplorerApp;

fn main() -> Result<()> {
    color_eyre::install()?;

    let app = JasmineExplorerApp::parse();
    let output = app.init_output();

    match app.exec(output) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr();
            std::process::exit(error.process_exit_code())
        }
    }
}
