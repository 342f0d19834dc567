// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by jasmine-explorer-runner.

use crate::worker::WorkerKind;
use camino::Utf8PathBuf;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while resolving the Jasmine configuration for a workspace folder.
///
/// The orchestration core never surfaces this to the host: a configuration that cannot be read is
/// reported as "no tests found".
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigReadError {
    /// The Jasmine config file could not be read.
    #[error("failed to read Jasmine config at `{path}`")]
    Read {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The Jasmine config file is not valid JSON, or has the wrong shape.
    #[error("failed to parse Jasmine config at `{path}`")]
    Parse {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: serde_json::Error,
    },

    /// A spec file pattern could not be compiled.
    #[error("invalid spec file pattern `{pattern}` in `{path}`")]
    Glob {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The pattern that failed to compile.
        pattern: String,

        /// The underlying error.
        #[source]
        err: globset::Error,
    },

    /// The host hasn't configured the worker scripts.
    #[error("no worker scripts configured")]
    NoWorkerScripts,
}

/// An error that occurred while spawning a worker process.
#[derive(Debug, Error)]
#[error("failed to spawn {kind} worker `{program}`")]
pub struct WorkerSpawnError {
    kind: WorkerKind,
    program: String,
    #[source]
    err: std::io::Error,
}

impl WorkerSpawnError {
    pub(crate) fn new(kind: WorkerKind, program: impl Into<String>, err: std::io::Error) -> Self {
        Self {
            kind,
            program: program.into(),
            err,
        }
    }

    /// Returns the kind of worker that failed to spawn.
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }
}

/// An error returned by [`JasmineAdapter::run`](crate::adapter::JasmineAdapter::run) and
/// [`JasmineAdapter::debug`](crate::adapter::JasmineAdapter::debug).
///
/// Test failures and worker crashes are not errors: they are reported through run events.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum RunError {
    /// A run is already in progress for this workspace folder.
    ///
    /// No events are emitted for the rejected request.
    #[error("a test run is already in progress for this workspace folder")]
    RunInProgress,
}

/// An error reported by a [`DebugHost`](crate::debug::DebugHost).
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("debugger host error: {message}")]
pub struct DebugHostError {
    message: String,
}

impl DebugHostError {
    /// Creates a new `DebugHostError` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An error that occurred while parsing the arguments passed to a worker process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkerArgsError {
    /// The config file argument was missing.
    #[error("missing argument: path to the Jasmine config file")]
    MissingConfigFile,

    /// The logging flag was missing or not `true`/`false`.
    #[error("invalid logging flag `{0}` (expected `true` or `false`)")]
    InvalidLogFlag(String),

    /// The test ID list was not a JSON array of strings.
    #[error("invalid test ID list (expected a JSON array of strings)")]
    InvalidTestIds(#[source] serde_json::Error),

    /// Unexpected extra arguments were passed.
    #[error("unexpected extra arguments: {}", .0.join(" "))]
    ExtraArguments(Vec<String>),
}

/// Displays an error along with its chain of sources, on a single line.
///
/// Useful for log messages, which are expected to be one line each.
pub struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
