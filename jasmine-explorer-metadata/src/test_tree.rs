// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// The ID of the synthetic suite at the top of every loaded tree.
pub const ROOT_SUITE_ID: &str = "root";

/// The label of the synthetic suite at the top of every loaded tree.
pub const ROOT_SUITE_LABEL: &str = "Jasmine";

/// A node in the test tree: either a suite or a leaf test.
///
/// The `id` of a node is derived from the fully-qualified name reported by the engine, so it stays
/// stable across loads as long as suite and spec names don't change. It is the key used to
/// correlate a host's "run these tests" request with the worker's test selection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TestNode {
    /// A suite, owning an ordered list of children.
    Suite(TestSuiteInfo),

    /// A leaf test.
    Test(TestInfo),
}

impl TestNode {
    /// Returns the ID of this node.
    pub fn id(&self) -> &str {
        match self {
            Self::Suite(suite) => &suite.id,
            Self::Test(test) => &test.id,
        }
    }

    /// Returns the human-readable label of this node.
    pub fn label(&self) -> &str {
        match self {
            Self::Suite(suite) => &suite.label,
            Self::Test(test) => &test.label,
        }
    }

    /// Returns the source file this node was declared in, if known.
    pub fn file(&self) -> Option<&Utf8Path> {
        match self {
            Self::Suite(suite) => suite.file.as_deref(),
            Self::Test(test) => test.file.as_deref(),
        }
    }

    /// Returns the zero-based line this node was declared on, if known.
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Suite(suite) => suite.line,
            Self::Test(test) => test.line,
        }
    }

    /// Returns the children of this node. Tests have no children.
    pub fn children(&self) -> &[TestNode] {
        match self {
            Self::Suite(suite) => &suite.children,
            Self::Test(_) => &[],
        }
    }

    /// Returns true if this is a suite.
    pub fn is_suite(&self) -> bool {
        matches!(self, Self::Suite(_))
    }
}

/// A suite in the test tree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestSuiteInfo {
    /// The unique ID of the suite.
    pub id: String,

    /// The label shown to the user.
    pub label: String,

    /// The file the suite was declared in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Utf8PathBuf>,

    /// The zero-based line the suite was declared on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Child suites and tests, owned exclusively by this suite.
    #[serde(default)]
    pub children: Vec<TestNode>,
}

impl TestSuiteInfo {
    /// Creates the synthetic root suite with the given children.
    pub fn root(children: Vec<TestNode>) -> Self {
        Self {
            id: ROOT_SUITE_ID.to_owned(),
            label: ROOT_SUITE_LABEL.to_owned(),
            file: None,
            line: None,
            children,
        }
    }

    /// Returns the number of leaf tests under this suite.
    pub fn test_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                TestNode::Suite(suite) => suite.test_count(),
                TestNode::Test(_) => 1,
            })
            .sum()
    }
}

/// A leaf test in the test tree.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestInfo {
    /// The unique ID of the test.
    pub id: String,

    /// The label shown to the user.
    pub label: String,

    /// The file the test was declared in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Utf8PathBuf>,

    /// The zero-based line the test was declared on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}
