// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable output for test trees and run events.

use crate::output::ReporterStyles;
use jasmine_explorer_metadata::{RunEvent, TestNode, TestState, TestSuiteInfo};
use jasmine_explorer_runner::{plural, tree::NodeIndex};
use owo_colors::OwoColorize;
use std::{
    io::{self, Write},
    sync::Arc,
};

/// Writes the tree as an indented outline.
pub(crate) fn write_tree(
    root: &TestSuiteInfo,
    styles: &ReporterStyles,
    mut writer: impl Write,
) -> io::Result<()> {
    writeln!(writer, "{}", root.label.style(styles.suite))?;
    for child in &root.children {
        write_node(child, 1, styles, &mut writer)?;
    }
    let count = root.test_count();
    writeln!(
        writer,
        "{} {} in {} {}",
        count.style(styles.count),
        plural::tests_str(count),
        root.children.len().style(styles.count),
        plural::files_str(root.children.len()),
    )
}

fn write_node(
    node: &TestNode,
    depth: usize,
    styles: &ReporterStyles,
    writer: &mut impl Write,
) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    match node {
        TestNode::Suite(suite) => {
            writeln!(writer, "{indent}{}", suite.label.style(styles.suite))?;
            for child in &suite.children {
                write_node(child, depth + 1, styles, writer)?;
            }
        }
        TestNode::Test(test) => match test.line {
            // Lines are zero-based; editors count from 1.
            Some(line) => writeln!(
                writer,
                "{indent}{} {}",
                test.label,
                format!("(line {})", line + 1).style(styles.location),
            )?,
            None => writeln!(writer, "{indent}{}", test.label)?,
        },
    }
    Ok(())
}

/// Counts of tests by final state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct RunStats {
    pub(crate) passed: usize,
    pub(crate) failed: usize,
    pub(crate) skipped: usize,
}

impl RunStats {
    pub(crate) fn finished_count(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Prints run events as they arrive.
pub(crate) struct RunReporter<W> {
    writer: W,
    styles: ReporterStyles,
    nodes: Arc<NodeIndex>,
    verbose: bool,
    stats: RunStats,
}

impl<W: Write> RunReporter<W> {
    pub(crate) fn new(
        writer: W,
        styles: ReporterStyles,
        nodes: Arc<NodeIndex>,
        verbose: bool,
    ) -> Self {
        Self {
            writer,
            styles,
            nodes,
            verbose,
            stats: RunStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> RunStats {
        self.stats
    }

    /// Updates the counts without printing anything.
    pub(crate) fn record(&mut self, event: &RunEvent) {
        if let RunEvent::Test(event) = event {
            match event.state {
                TestState::Running => {}
                TestState::Passed => self.stats.passed += 1,
                TestState::Failed => self.stats.failed += 1,
                TestState::Skipped => self.stats.skipped += 1,
            }
        }
    }

    pub(crate) fn handle(&mut self, event: &RunEvent) -> io::Result<()> {
        self.record(event);
        match event {
            RunEvent::Started { tests } => {
                if tests.is_empty() {
                    writeln!(self.writer, "{:>12} all tests", "Starting".style(self.styles.pass))?;
                } else {
                    writeln!(
                        self.writer,
                        "{:>12} {} selected {}",
                        "Starting".style(self.styles.pass),
                        tests.len().style(self.styles.count),
                        if tests.len() == 1 { "ID" } else { "IDs" },
                    )?;
                }
            }
            RunEvent::Suite(event) => {
                if self.verbose {
                    writeln!(
                        self.writer,
                        "{:>12} {} ({:?})",
                        "SUITE".style(self.styles.suite),
                        event.suite.id(),
                        event.state,
                    )?;
                }
            }
            RunEvent::Test(event) => {
                let id = event.test.id();
                match event.state {
                    TestState::Running => {
                        if self.verbose {
                            writeln!(self.writer, "{:>12} {id}", "START".style(self.styles.suite))?;
                        }
                    }
                    TestState::Passed => {
                        writeln!(self.writer, "{:>12} {id}", "PASS".style(self.styles.pass))?;
                    }
                    TestState::Skipped => {
                        writeln!(self.writer, "{:>12} {id}", "SKIP".style(self.styles.skip))?;
                    }
                    TestState::Failed => {
                        writeln!(self.writer, "{:>12} {id}", "FAIL".style(self.styles.fail))?;
                        if let Some(message) = &event.message {
                            for line in message.lines() {
                                writeln!(self.writer, "{:>12} {line}", "")?;
                            }
                        }
                        let file = self.nodes.file_of(id);
                        for decoration in &event.decorations {
                            let location = match file {
                                Some(file) => format!("{file}:{}", decoration.line + 1),
                                None => format!("line {}", decoration.line + 1),
                            };
                            writeln!(
                                self.writer,
                                "{:>12} at {}",
                                "",
                                location.style(self.styles.location),
                            )?;
                        }
                    }
                }
            }
            RunEvent::Finished => {
                let stats = self.stats;
                let count = stats.finished_count();
                writeln!(
                    self.writer,
                    "{:>12} {} {} run: {} passed, {} failed, {} skipped",
                    "Summary".style(self.styles.pass),
                    count.style(self.styles.count),
                    plural::tests_str(count),
                    stats.passed.style(self.styles.pass),
                    stats.failed.style(self.styles.fail),
                    stats.skipped.style(self.styles.skip),
                )?;
            }
        }
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use jasmine_explorer_metadata::{Decoration, SuiteEvent, SuiteState, TestEvent, TestInfo};
    use pretty_assertions::assert_eq;

    fn tree() -> TestSuiteInfo {
        TestSuiteInfo::root(vec![TestNode::Suite(TestSuiteInfo {
            id: "/work/spec/math.spec.js".to_owned(),
            label: "math.spec.js".to_owned(),
            file: Some("/work/spec/math.spec.js".into()),
            line: None,
            children: vec![TestNode::Suite(TestSuiteInfo {
                id: "Math".to_owned(),
                label: "Math".to_owned(),
                file: None,
                line: Some(0),
                children: vec![
                    TestNode::Test(TestInfo {
                        id: "Math adds".to_owned(),
                        label: "adds".to_owned(),
                        file: None,
                        line: Some(1),
                    }),
                    TestNode::Test(TestInfo {
                        id: "Math divides".to_owned(),
                        label: "divides".to_owned(),
                        file: None,
                        line: Some(4),
                    }),
                ],
            })],
        })])
    }

    #[test]
    fn tree_outline() {
        let mut out = Vec::new();
        write_tree(&tree(), &ReporterStyles::default(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            indoc! {"
                Jasmine
                  math.spec.js
                    Math
                      adds (line 2)
                      divides (line 5)
                2 tests in 1 file
            "}
        );
    }

    #[test]
    fn run_output_and_stats() {
        let nodes = Arc::new(NodeIndex::new(Some(tree())));
        let mut reporter = RunReporter::new(Vec::new(), ReporterStyles::default(), nodes, false);
        let events = [
            RunEvent::Started { tests: vec![] },
            RunEvent::Suite(SuiteEvent {
                suite: "Math".into(),
                state: SuiteState::Running,
            }),
            RunEvent::Test(TestEvent {
                test: "Math adds".into(),
                state: TestState::Passed,
                message: None,
                decorations: vec![],
            }),
            RunEvent::Test(TestEvent {
                test: "Math divides".into(),
                state: TestState::Failed,
                message: Some("Expected 1 to be 2.".to_owned()),
                decorations: vec![Decoration {
                    line: 5,
                    message: "Expected 1 to be 2.".to_owned(),
                }],
            }),
            RunEvent::Finished,
        ];
        for event in &events {
            reporter.handle(event).unwrap();
        }

        assert_eq!(
            reporter.stats(),
            RunStats {
                passed: 1,
                failed: 1,
                skipped: 0,
            }
        );
        assert_eq!(
            String::from_utf8(reporter.writer).unwrap(),
            indoc! {"
                    Starting all tests
                        PASS Math adds
                        FAIL Math divides
                             Expected 1 to be 2.
                             at /work/spec/math.spec.js:6
                     Summary 2 tests run: 1 passed, 1 failed, 0 skipped
            "}
        );
    }
}
