// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{TestNode, TestSuiteInfo};
use serde::{Deserialize, Serialize};

/// An event in the load lifecycle, published to the host.
///
/// Every load produces exactly one [`Started`](Self::Started) followed by exactly one
/// [`Finished`](Self::Finished).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LoadEvent {
    /// Discovery started.
    Started,

    /// Discovery finished.
    Finished {
        /// The loaded tree, rooted at the synthetic root suite.
        ///
        /// `None` means that no tests were found. This is not an error.
        suite: Option<TestSuiteInfo>,
    },
}

/// An event in the run lifecycle, published to the host.
///
/// Every run produces exactly one [`Started`](Self::Started), any number of suite and test
/// events, and finally exactly one [`Finished`](Self::Finished).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RunEvent {
    /// The run started.
    Started {
        /// The IDs requested by the host, verbatim (including unknown ones).
        tests: Vec<String>,
    },

    /// A suite changed state.
    Suite(SuiteEvent),

    /// A test changed state.
    Test(TestEvent),

    /// The run finished. Always the last event of a run.
    Finished,
}

/// A reference to a node in a run event.
///
/// The first mention of a node may carry its full description; later state changes usually carry
/// just the ID.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    /// A bare node ID.
    Id(String),

    /// A full node description.
    Node(TestNode),
}

impl NodeRef {
    /// Returns the ID of the referenced node.
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Node(node) => node.id(),
        }
    }
}

impl From<&str> for NodeRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_owned())
    }
}

/// A suite state transition.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SuiteEvent {
    /// The suite.
    pub suite: NodeRef,

    /// The new state.
    pub state: SuiteState,
}

/// The state of a suite during a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuiteState {
    /// The suite started running.
    Running,

    /// All children of the suite completed.
    Completed,
}

/// A test state transition, as published to the host.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    /// The test.
    pub test: NodeRef,

    /// The new state.
    pub state: TestState,

    /// A summary of the failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Source decorations for failures in this test.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<Decoration>,
}

/// The state of a test during a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestState {
    /// The test started running.
    Running,

    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was pending.
    Skipped,
}

impl TestState {
    /// Returns true if this state ends the test.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A source-anchored annotation for a failing test.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    /// The zero-based line in the test's source file.
    pub line: u32,

    /// The failure message.
    pub message: String,
}
