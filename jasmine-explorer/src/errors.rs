// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use jasmine_explorer_metadata::JasmineExplorerExitCode;
use jasmine_explorer_runner::errors::{DisplayErrorChain, RunError};
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method.

/// An error that is expected to happen in normal use, as opposed to a bug.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("workspace directory is not valid UTF-8")]
    WorkspaceDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("failed to read settings")]
    SettingsReadError {
        path: Utf8PathBuf,
        #[source]
        err: config::ConfigError,
    },
    #[error("no worker scripts configured")]
    NoWorkerScripts { path: Utf8PathBuf },
    #[error("failed to create async runtime")]
    RuntimeBuildError {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to serialize output")]
    SerializeError {
        #[source]
        err: serde_json::Error,
    },
    #[error("failed to write output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to start test run")]
    RunError {
        #[from]
        err: RunError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkspaceDirInvalidUtf8 { .. }
            | Self::SettingsReadError { .. }
            | Self::NoWorkerScripts { .. }
            | Self::RuntimeBuildError { .. }
            | Self::RunError { .. } => JasmineExplorerExitCode::SETUP_ERROR,
            Self::SerializeError { .. } | Self::WriteOutputError { .. } => {
                JasmineExplorerExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let next_error = match self {
            Self::CurrentDirFailed { err } => {
                tracing::error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::WorkspaceDirInvalidUtf8 { path } => {
                tracing::error!("workspace directory `{}` is not valid UTF-8", path.display());
                None
            }
            Self::SettingsReadError { path, err } => {
                tracing::error!("failed to read settings from `{path}`");
                Some(err as &dyn Error)
            }
            Self::NoWorkerScripts { path } => {
                tracing::error!(
                    "no worker scripts configured: set `load` and `run` under \
                     [worker-scripts] in `{path}`"
                );
                None
            }
            Self::RuntimeBuildError { err } => {
                tracing::error!("failed to create async runtime");
                Some(err as &dyn Error)
            }
            Self::SerializeError { err } => {
                tracing::error!("failed to serialize output");
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                tracing::error!("failed to write output");
                Some(err as &dyn Error)
            }
            Self::RunError { err } => {
                tracing::error!("{}", DisplayErrorChain::new(err));
                None
            }
        };

        if let Some(err) = next_error {
            tracing::error!("  caused by: {}", DisplayErrorChain::new(err));
        }
    }
}
