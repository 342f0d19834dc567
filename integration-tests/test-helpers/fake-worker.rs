// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for the Jasmine worker scripts, so integration tests don't need a JavaScript runtime.
//!
//! The test harness configures this binary as the runtime, and the worker scripts as `load` and
//! `run`. The binary is then invoked as:
//!
//! ```text
//! fake-worker [--runtime-flag...] <path/to/load|path/to/run> <config-file> <log-enabled> [ids]
//! ```
//!
//! Instead of evaluating JavaScript, spec files are scanned line by line for `describe("...")`,
//! `it("...")` and `xit("...")` blocks closed by `});`. Spec bodies may contain these markers:
//!
//! * `fail("message")`: the spec fails, with a stack frame pointing at that line.
//! * `helperFail("message")`: the spec fails, with a stack pointing only into a helper file.
//! * `sleep()`: the worker hangs until it is killed.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use jasmine_explorer_metadata::{TestInfo, TestNode, TestSuiteInfo};
use jasmine_explorer_runner::{
    config::{JasmineConfig, SpecFilePatterns},
    reporter::{
        EngineEvent, EventReporter, ExpectationResult, MessageChannel, SpecResult, SpecStatus,
        SuiteResult, WorkerArgs,
    },
};
use regex::Regex;
use std::{collections::BTreeSet, io::Write, sync::LazyLock, time::Duration};
use walkdir::WalkDir;

static BLOCK_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(describe|it|xit)\("([^"]*)""#).unwrap());
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\}\);").unwrap());
static FAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bfail\("([^"]*)"\)"#).unwrap());
static HELPER_FAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bhelperFail\("([^"]*)"\)"#).unwrap());
static SLEEP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bsleep\(\)").unwrap());

#[derive(Debug)]
enum Block {
    Suite {
        description: String,
        line: u32,
        children: Vec<Block>,
    },
    Spec {
        description: String,
        line: u32,
        pending: bool,
        actions: Vec<Action>,
    },
}

#[derive(Debug)]
enum Action {
    Fail { message: String, line: u32 },
    HelperFail { message: String },
    Sleep,
}

impl Block {
    fn new(kind: &str, description: &str, line: u32) -> Self {
        match kind {
            "describe" => Self::Suite {
                description: description.to_owned(),
                line,
                children: Vec::new(),
            },
            _ => Self::Spec {
                description: description.to_owned(),
                line,
                pending: kind == "xit",
                actions: Vec::new(),
            },
        }
    }

    fn description(&self) -> &str {
        match self {
            Self::Suite { description, .. } | Self::Spec { description, .. } => description,
        }
    }
}

fn full_name(parent: &str, description: &str) -> String {
    if parent.is_empty() {
        description.to_owned()
    } else {
        format!("{parent} {description}")
    }
}

/// Parses the top-level blocks of a spec file. Line numbers are zero-based.
fn parse_spec_file(contents: &str) -> Vec<Block> {
    let mut top_level = Vec::new();
    let mut open: Vec<Block> = Vec::new();

    for (index, text) in contents.lines().enumerate() {
        let line = index as u32;
        if let Some(captures) = BLOCK_START.captures(text) {
            open.push(Block::new(&captures[1], &captures[2], line));
        } else if BLOCK_END.is_match(text) {
            let Some(block) = open.pop() else {
                continue;
            };
            match open.last_mut() {
                Some(Block::Suite { children, .. }) => children.push(block),
                // Blocks nested in a spec are ignored.
                Some(Block::Spec { .. }) => {}
                None => top_level.push(block),
            }
        } else if let Some(Block::Spec { actions, .. }) = open.last_mut() {
            if let Some(captures) = FAIL.captures(text) {
                actions.push(Action::Fail {
                    message: captures[1].to_owned(),
                    line,
                });
            } else if let Some(captures) = HELPER_FAIL.captures(text) {
                actions.push(Action::HelperFail {
                    message: captures[1].to_owned(),
                });
            } else if SLEEP.is_match(text) {
                actions.push(Action::Sleep);
            }
        }
    }

    top_level
}

fn to_node(block: &Block, parent: &str, file: &Utf8Path) -> TestNode {
    let id = full_name(parent, block.description());
    match block {
        Block::Suite {
            description,
            line,
            children,
        } => TestNode::Suite(TestSuiteInfo {
            children: children
                .iter()
                .map(|child| to_node(child, &id, file))
                .collect(),
            id,
            label: description.clone(),
            file: Some(file.to_owned()),
            line: Some(*line),
        }),
        Block::Spec {
            description, line, ..
        } => TestNode::Test(TestInfo {
            id,
            label: description.clone(),
            file: Some(file.to_owned()),
            line: Some(*line),
        }),
    }
}

struct Runner<'a, W> {
    reporter: EventReporter<W>,
    test_ids: Option<&'a BTreeSet<String>>,
    helper_file: Utf8PathBuf,
}

impl<W: Write> Runner<'_, W> {
    fn run_block(&mut self, block: &Block, parent: &str, file: &Utf8Path) -> Result<()> {
        let full_name = full_name(parent, block.description());
        match block {
            Block::Suite {
                description,
                children,
                ..
            } => {
                let suite = SuiteResult {
                    description: description.clone(),
                    full_name: full_name.clone(),
                };
                self.reporter.report(EngineEvent::SuiteStarted(suite.clone()))?;
                for child in children {
                    self.run_block(child, &full_name, file)?;
                }
                self.reporter.report(EngineEvent::SuiteDone(suite))?;
            }
            Block::Spec {
                description,
                pending,
                actions,
                ..
            } => {
                let mut result = SpecResult {
                    description: description.clone(),
                    full_name: full_name.clone(),
                    status: None,
                    failed_expectations: Vec::new(),
                    pending_reason: String::new(),
                };

                if self.test_ids.is_some_and(|ids| !ids.contains(&full_name)) {
                    result.status = Some(SpecStatus::Excluded);
                    self.reporter.report(EngineEvent::SpecDone(result))?;
                    return Ok(());
                }

                self.reporter.report(EngineEvent::SpecStarted(result.clone()))?;
                if *pending {
                    result.status = Some(SpecStatus::Pending);
                    result.pending_reason = "Temporarily disabled with xit".to_owned();
                } else {
                    for action in actions {
                        match action {
                            Action::Fail { message, line } => {
                                result.failed_expectations.push(ExpectationResult {
                                    message: message.clone(),
                                    stack: format!(
                                        "Error: {message}\n    at UserContext.<anonymous> ({file}:{}:13)\n    at <Jasmine>",
                                        line + 1,
                                    ),
                                });
                            }
                            Action::HelperFail { message } => {
                                result.failed_expectations.push(ExpectationResult {
                                    message: message.clone(),
                                    stack: format!(
                                        "Error: {message}\n    at helperFail ({}:3:9)",
                                        self.helper_file,
                                    ),
                                });
                            }
                            Action::Sleep => std::thread::sleep(Duration::from_secs(600)),
                        }
                    }
                    result.status = Some(if result.failed_expectations.is_empty() {
                        SpecStatus::Passed
                    } else {
                        SpecStatus::Failed
                    });
                }
                self.reporter.report(EngineEvent::SpecDone(result))?;
            }
        }
        Ok(())
    }
}

fn spec_files(spec_dir: &Utf8Path, patterns: &SpecFilePatterns) -> Vec<Utf8PathBuf> {
    let mut files: Vec<Utf8PathBuf> = WalkDir::new(spec_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .filter(|path| patterns.is_match(path))
        .collect();
    files.sort();
    files
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let mut args = std::env::args().skip(1).skip_while(|arg| arg.starts_with("--"));
    let script = args.next().ok_or_else(|| eyre!("missing worker script"))?;
    let kind = Utf8Path::new(&script)
        .file_name()
        .ok_or_else(|| eyre!("invalid worker script `{script}`"))?
        .to_owned();
    let args = WorkerArgs::parse(args).wrap_err("failed to parse worker arguments")?;

    eprintln!("fake-worker: {kind} worker started");

    let cwd = Utf8PathBuf::try_from(std::env::current_dir()?)?;
    let config = JasmineConfig::read(&args.config_file)?;
    let spec_dir = cwd.join(&config.spec_dir);
    let patterns = SpecFilePatterns::new(&spec_dir, &config.spec_files)
        .map_err(|(pattern, err)| eyre!("invalid pattern `{pattern}`: {err}"))?;

    let stdout = std::io::stdout().lock();
    let mut channel = MessageChannel::new(stdout, args.log_enabled);
    channel.log(format!("loading specs with config {}", args.config_file))?;

    let files = spec_files(&spec_dir, &patterns);
    let mut reporter = EventReporter::new(channel);

    match kind.as_str() {
        "load" => {
            for file in &files {
                let contents = std::fs::read_to_string(file)?;
                // One report per top-level block, as the real loader does.
                for block in parse_spec_file(&contents) {
                    reporter.report_file_suite(TestSuiteInfo {
                        id: file.to_string(),
                        label: file.to_string(),
                        file: Some(file.clone()),
                        line: None,
                        children: vec![to_node(&block, "", file)],
                    })?;
                }
            }
        }
        "run" => {
            let test_ids: Option<BTreeSet<String>> =
                args.test_ids.map(|ids| ids.into_iter().collect());
            let mut runner = Runner {
                reporter,
                test_ids: test_ids.as_ref(),
                helper_file: spec_dir.join("helpers/helper.js"),
            };
            for file in &files {
                let contents = std::fs::read_to_string(file)?;
                for block in parse_spec_file(&contents) {
                    runner.run_block(&block, "", file)?;
                }
            }
            runner.reporter.channel().log("run complete")?;
        }
        other => bail!("unknown worker script `{other}`"),
    }

    Ok(())
}
