// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping test failures to source locations through their stack traces.
//!
//! Stack traces are parsed leniently: frames in V8 format (`at fn (file:line:col)`,
//! `at file:line:col`) and in SpiderMonkey/JavaScriptCore format (`fn@file:line:col`) are
//! recognized, and every other line is skipped.

use camino::Utf8Path;
use jasmine_explorer_metadata::{Decoration, RawFailure};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static V8_FRAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at (?:async )?(?P<function>.*?) \((?P<location>.*)\)$").unwrap()
});
static V8_BARE_FRAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*at (?:async )?(?P<location>\S.*)$").unwrap());
static GECKO_FRAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?P<function>[^@\s]*)@(?P<location>.+)$").unwrap());
static LOCATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>.+?):(?P<line>\d+)(?::(?P<column>\d+))?$").unwrap()
});

/// A single parsed stack frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackFrame {
    /// The function name, if the frame has one.
    pub function: Option<String>,

    /// The source file, with any `file://` prefix stripped.
    pub file: String,

    /// The one-based line number.
    pub line: u32,

    /// The one-based column number, if present.
    pub column: Option<u32>,
}

/// Parses a raw stack trace into frames, outermost call last.
///
/// Lines that aren't recognized as frames (including the error message that usually heads the
/// trace) are skipped.
pub fn parse_stack(stack: &str) -> Vec<StackFrame> {
    stack.lines().filter_map(parse_frame).collect()
}

fn parse_frame(line: &str) -> Option<StackFrame> {
    let (function, location) = if let Some(caps) = V8_FRAME_REGEX.captures(line) {
        (Some(caps["function"].to_owned()), caps.name("location")?.as_str())
    } else if let Some(caps) = V8_BARE_FRAME_REGEX.captures(line) {
        (None, caps.name("location")?.as_str())
    } else if let Some(caps) = GECKO_FRAME_REGEX.captures(line) {
        let function = &caps["function"];
        let function = (!function.is_empty()).then(|| function.to_owned());
        (function, caps.name("location")?.as_str())
    } else {
        return None;
    };

    let caps = LOCATION_REGEX.captures(location)?;
    Some(StackFrame {
        function,
        file: strip_file_url(&caps["file"]).to_owned(),
        line: caps["line"].parse().ok()?,
        column: caps.name("column").and_then(|c| c.as_str().parse().ok()),
    })
}

fn strip_file_url(file: &str) -> &str {
    let Some(path) = file.strip_prefix("file://") else {
        return file;
    };
    // file:///C:/work/a.js -> C:/work/a.js
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
    {
        &path[1..]
    } else {
        path
    }
}

/// Maps a failure to a decoration on the test's source file.
///
/// The first frame whose file is exactly `test_file`, with a line number, determines the line.
/// Returns `None` if no such frame exists.
pub fn decorate_failure(failure: &RawFailure, test_file: Option<&Utf8Path>) -> Option<Decoration> {
    let Some(test_file) = test_file else {
        debug!("no source file known for failed test, skipping decoration");
        return None;
    };

    // Line numbers are one-based, so frames at line 0 are malformed and skipped.
    let line = parse_stack(&failure.stack)
        .into_iter()
        .filter(|frame| frame.file == test_file.as_str())
        .find_map(|frame| frame.line.checked_sub(1));
    match line {
        Some(line) => Some(Decoration {
            line,
            message: failure.message.clone(),
        }),
        None => {
            debug!(
                %test_file,
                message = %failure.message,
                "no stack frame points into the test file, skipping decoration",
            );
            None
        }
    }
}
