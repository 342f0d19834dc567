// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing a line of worker output as a
/// [`WorkerMessage`](crate::WorkerMessage).
#[derive(Debug)]
pub struct MessageParseError {
    line: String,
    err: serde_json::Error,
}

impl MessageParseError {
    pub(crate) fn new(line: impl Into<String>, err: serde_json::Error) -> Self {
        Self {
            line: line.into(),
            err,
        }
    }

    /// Returns the line that failed to parse.
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for MessageParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "worker output is not a protocol message: `{}`", self.line)
    }
}

impl error::Error for MessageParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.err)
    }
}
