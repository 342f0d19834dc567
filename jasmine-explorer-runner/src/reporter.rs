// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker side of the protocol.
//!
//! A worker process parses its arguments with [`WorkerArgs`], subscribes an [`EventReporter`] to
//! the test engine's lifecycle callbacks, and writes everything through a [`MessageChannel`] on
//! its standard output.

use crate::errors::WorkerArgsError;
use camino::Utf8PathBuf;
use jasmine_explorer_metadata::{
    MESSAGE_SEPARATOR, NodeRef, RawFailure, SuiteEvent, SuiteState, TestState, TestSuiteInfo,
    WorkerMessage, WorkerReport, WorkerTestEvent,
};
use serde::Deserialize;
use std::io::{self, Write};

/// Arguments passed to a worker process after its script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerArgs {
    /// The absolute path to the Jasmine config file.
    pub config_file: Utf8PathBuf,

    /// Whether verbose diagnostic output is enabled.
    pub log_enabled: bool,

    /// The tests to run. `None` means all tests.
    pub test_ids: Option<Vec<String>>,
}

impl WorkerArgs {
    /// Parses worker arguments.
    ///
    /// Leading arguments starting with `--` are runtime flags some interpreters pass through, and
    /// are skipped.
    pub fn parse<I>(args: I) -> Result<Self, WorkerArgsError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut args = args
            .into_iter()
            .map(Into::into)
            .skip_while(|arg: &String| arg.starts_with("--"));

        let config_file = args.next().ok_or(WorkerArgsError::MissingConfigFile)?;
        let log_enabled = match args.next().as_deref() {
            Some("true") => true,
            Some("false") => false,
            Some(other) => return Err(WorkerArgsError::InvalidLogFlag(other.to_owned())),
            None => return Err(WorkerArgsError::InvalidLogFlag(String::new())),
        };
        let test_ids = args
            .next()
            .map(|ids| serde_json::from_str(&ids).map_err(WorkerArgsError::InvalidTestIds))
            .transpose()?;

        let extra: Vec<String> = args.collect();
        if !extra.is_empty() {
            return Err(WorkerArgsError::ExtraArguments(extra));
        }

        Ok(Self {
            config_file: config_file.into(),
            log_enabled,
            test_ids,
        })
    }
}

/// Writes protocol messages, one per line, each preceded by [`MESSAGE_SEPARATOR`].
#[derive(Debug)]
pub struct MessageChannel<W> {
    writer: W,
    log_enabled: bool,
}

impl<W: Write> MessageChannel<W> {
    /// Creates a new channel over `writer`.
    ///
    /// If `log_enabled` is false, [`log`](Self::log) messages are dropped.
    pub fn new(writer: W, log_enabled: bool) -> Self {
        Self {
            writer,
            log_enabled,
        }
    }

    /// Sends a structured report.
    pub fn send(&mut self, report: WorkerReport) -> io::Result<()> {
        self.write_message(&WorkerMessage::Report(report))
    }

    /// Sends a diagnostic log line.
    pub fn log(&mut self, message: impl Into<String>) -> io::Result<()> {
        if !self.log_enabled {
            return Ok(());
        }
        self.write_message(&WorkerMessage::Log(message.into()))
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_message(&mut self, message: &WorkerMessage) -> io::Result<()> {
        writeln!(self.writer, "{MESSAGE_SEPARATOR}{}", message.to_line())?;
        // The core reads messages as they arrive, so each one is flushed immediately.
        self.writer.flush()
    }
}

/// A lifecycle callback from the test engine.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EngineEvent {
    /// A suite started.
    SuiteStarted(SuiteResult),

    /// A suite finished.
    SuiteDone(SuiteResult),

    /// A spec started.
    SpecStarted(SpecResult),

    /// A spec finished.
    SpecDone(SpecResult),
}

/// The engine's description of a suite.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    /// The suite's own description.
    pub description: String,

    /// The descriptions of the suite and all its ancestors, space-separated.
    pub full_name: String,
}

/// The engine's description of a spec.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecResult {
    /// The spec's own description.
    pub description: String,

    /// The descriptions of the spec and all its ancestors, space-separated.
    pub full_name: String,

    /// The spec's status. Only meaningful once the spec is done.
    #[serde(default)]
    pub status: Option<SpecStatus>,

    /// The expectations that failed.
    #[serde(default)]
    pub failed_expectations: Vec<ExpectationResult>,

    /// Why the spec is pending, if it is.
    #[serde(default)]
    pub pending_reason: String,
}

/// The final status of a spec.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecStatus {
    /// All expectations passed.
    Passed,

    /// At least one expectation failed.
    Failed,

    /// The spec was marked pending (`xit`, `pending()`) or has no body.
    Pending,

    /// The spec was filtered out of this run.
    Excluded,
}

/// A failed expectation.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct ExpectationResult {
    /// The failure message.
    pub message: String,

    /// The raw stack trace.
    #[serde(default)]
    pub stack: String,
}

/// Translates engine callbacks into protocol messages.
#[derive(Debug)]
pub struct EventReporter<W> {
    channel: MessageChannel<W>,
}

impl<W: Write> EventReporter<W> {
    /// Creates a reporter that writes to `channel`.
    pub fn new(channel: MessageChannel<W>) -> Self {
        Self { channel }
    }

    /// Handles an engine callback.
    pub fn report(&mut self, event: EngineEvent) -> io::Result<()> {
        match translate(event) {
            Some(report) => self.channel.send(report),
            None => Ok(()),
        }
    }

    /// Reports a discovered file suite.
    pub fn report_file_suite(&mut self, suite: TestSuiteInfo) -> io::Result<()> {
        self.channel.send(WorkerReport::FileSuite(suite))
    }

    /// Returns the channel this reporter writes to, for logging.
    pub fn channel(&mut self) -> &mut MessageChannel<W> {
        &mut self.channel
    }

    /// Consumes the reporter, returning the channel.
    pub fn into_channel(self) -> MessageChannel<W> {
        self.channel
    }
}

/// Translates an engine callback into a report.
///
/// Node IDs are the engine's full names. Specs excluded from the run produce no report, so that
/// tests outside the requested set keep their previous state.
pub fn translate(event: EngineEvent) -> Option<WorkerReport> {
    let report = match event {
        EngineEvent::SuiteStarted(suite) => WorkerReport::Suite(SuiteEvent {
            suite: NodeRef::Id(suite.full_name),
            state: SuiteState::Running,
        }),
        EngineEvent::SuiteDone(suite) => WorkerReport::Suite(SuiteEvent {
            suite: NodeRef::Id(suite.full_name),
            state: SuiteState::Completed,
        }),
        EngineEvent::SpecStarted(spec) => WorkerReport::Test(WorkerTestEvent {
            test: NodeRef::Id(spec.full_name),
            state: TestState::Running,
            message: None,
            failures: Vec::new(),
        }),
        EngineEvent::SpecDone(spec) => {
            let test = NodeRef::Id(spec.full_name);
            match spec.status? {
                SpecStatus::Passed => WorkerReport::Test(WorkerTestEvent {
                    test,
                    state: TestState::Passed,
                    message: None,
                    failures: Vec::new(),
                }),
                SpecStatus::Failed => {
                    let message = spec
                        .failed_expectations
                        .iter()
                        .map(|e| e.message.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                    let failures = spec
                        .failed_expectations
                        .into_iter()
                        .map(|e| RawFailure {
                            message: e.message,
                            stack: e.stack,
                        })
                        .collect();
                    WorkerReport::Test(WorkerTestEvent {
                        test,
                        state: TestState::Failed,
                        message: Some(message),
                        failures,
                    })
                }
                SpecStatus::Pending => WorkerReport::Test(WorkerTestEvent {
                    test,
                    state: TestState::Skipped,
                    message: (!spec.pending_reason.is_empty()).then_some(spec.pending_reason),
                    failures: Vec::new(),
                }),
                SpecStatus::Excluded => return None,
            }
        }
    };
    Some(report)
}
