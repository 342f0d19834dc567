// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{MessageParseError, NodeRef, SuiteEvent, TestEvent, TestState, TestSuiteInfo};
use serde::{Deserialize, Serialize};

/// Marks the start of a message on a worker's standard output.
///
/// This is the ASCII record separator, as in JSON text sequences (RFC 7464). Test code shares
/// standard output with the message channel and may leave its last line unterminated, so anything
/// before the separator on a line is plain output.
pub const MESSAGE_SEPARATOR: char = '\u{1e}';

/// Splits a line of worker output into plain output and the message text that follows
/// [`MESSAGE_SEPARATOR`], if any.
///
/// Lines without a separator are plain output in their entirety.
pub fn split_output_line(line: &str) -> (&str, Option<&str>) {
    match line.split_once(MESSAGE_SEPARATOR) {
        Some((output, message)) => (output, Some(message)),
        None => (line, None),
    }
}

/// A message sent by a worker process to the orchestration core.
///
/// Messages are written as one JSON document per line on the worker's standard output, each
/// preceded by [`MESSAGE_SEPARATOR`]. A JSON string is a diagnostic log line; a JSON object is a
/// [`WorkerReport`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerMessage {
    /// A diagnostic log line.
    Log(String),

    /// A structured report.
    Report(WorkerReport),
}

impl WorkerMessage {
    /// Parses the text of a single message, without the separator.
    pub fn parse_line(line: &str) -> Result<Self, MessageParseError> {
        serde_json::from_str(line).map_err(|err| MessageParseError::new(line, err))
    }

    /// Serializes this message as a single line, without the separator or the trailing newline.
    pub fn to_line(&self) -> String {
        // Serializing these types cannot fail: all map keys are strings.
        serde_json::to_string(self).expect("worker messages are always serializable")
    }
}

/// A structured report sent by a worker.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerReport {
    /// A (possibly partial) report of the suites declared in one file, sent by load workers.
    ///
    /// With random ordering the engine may split one file into several reports; the core merges
    /// them under the file key.
    FileSuite(TestSuiteInfo),

    /// A suite state transition, sent by run workers.
    Suite(SuiteEvent),

    /// A test state transition, sent by run workers.
    Test(WorkerTestEvent),
}

/// A test state transition as reported by the worker, with raw failure records.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkerTestEvent {
    /// The test.
    pub test: NodeRef,

    /// The new state.
    pub state: TestState,

    /// A summary of the failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Raw failures, in the order the engine reported them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RawFailure>,
}

impl WorkerTestEvent {
    /// Converts this into the host-facing event, dropping the raw failures in favor of the given
    /// decorations.
    pub fn into_test_event(self, decorations: Vec<crate::Decoration>) -> TestEvent {
        TestEvent {
            test: self.test,
            state: self.state,
            message: self.message,
            decorations,
        }
    }
}

/// A failed expectation as reported by the engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawFailure {
    /// The failure message.
    pub message: String,

    /// The raw stack trace text, in whatever format the engine produced.
    #[serde(default)]
    pub stack: String,
}
