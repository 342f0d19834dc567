// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building the canonical test tree out of streamed worker reports, and indexing it by ID.

use crate::helpers::convert_rel_path_to_forward_slash;
use camino::{Utf8Path, Utf8PathBuf};
use jasmine_explorer_metadata::{TestNode, TestSuiteInfo};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, hash_map::Entry},
};
use tracing::{debug, warn};

/// Merges per-file suite reports from a load worker.
///
/// A worker may report the same file several times, for example once per top-level `describe`
/// block. Reports for the same file are merged by appending their children.
#[derive(Debug)]
pub struct FileSuiteAccumulator {
    spec_dir: Utf8PathBuf,
    files: BTreeMap<String, TestSuiteInfo>,
}

impl FileSuiteAccumulator {
    /// Creates a new accumulator for files under `spec_dir`.
    pub fn new(spec_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            spec_dir: spec_dir.into(),
            files: BTreeMap::new(),
        }
    }

    /// Adds a (possibly partial) file suite report.
    pub fn add(&mut self, mut report: TestSuiteInfo) {
        let key = match &report.file {
            Some(file) => file.to_string(),
            None => report.id.clone(),
        };
        if let Some(file) = &report.file {
            report.label = self.relative_label(file);
        }

        match self.files.get_mut(&key) {
            Some(existing) => existing.children.append(&mut report.children),
            None => {
                self.files.insert(key, report);
            }
        }
    }

    /// Returns the number of distinct files reported so far.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Builds the root suite out of the reports received so far.
    ///
    /// Returns `None` if no files were reported.
    pub fn finish(self) -> Option<TestSuiteInfo> {
        if self.files.is_empty() {
            return None;
        }

        let mut files: Vec<(String, TestSuiteInfo)> = self.files.into_iter().collect();
        // BTreeMap order breaks ties between paths that differ only in case.
        files.sort_by_cached_key(|(key, _)| key.to_lowercase());

        let children = files
            .into_iter()
            .map(|(_, mut suite)| {
                sort_by_line(&mut suite.children);
                TestNode::Suite(suite)
            })
            .collect();
        Some(TestSuiteInfo::root(children))
    }

    fn relative_label(&self, file: &Utf8Path) -> String {
        match file.strip_prefix(&self.spec_dir) {
            Ok(rel) => convert_rel_path_to_forward_slash(rel).into_string(),
            Err(_) => file.to_string(),
        }
    }
}

/// Sorts nodes by ascending line, recursively. Nodes without a line go last.
fn sort_by_line(nodes: &mut [TestNode]) {
    nodes.sort_by(|a, b| match (a.line(), b.line()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    for node in nodes {
        if let TestNode::Suite(suite) = node {
            sort_by_line(&mut suite.children);
        }
    }
}

/// An ID-to-node index over the last loaded tree.
///
/// The index is immutable: each load builds a new one, which replaces the old one wholesale.
#[derive(Clone, Debug, Default)]
pub struct NodeIndex {
    root: Option<TestNode>,
    // Child indexes from the root to each node.
    paths: HashMap<String, Vec<usize>>,
}

impl NodeIndex {
    /// Indexes the given tree. `None` produces an empty index.
    pub fn new(root: Option<TestSuiteInfo>) -> Self {
        let Some(root) = root else {
            return Self::default();
        };

        let root = TestNode::Suite(root);
        let mut paths = HashMap::new();
        let mut path = Vec::new();
        index_node(&root, &mut path, &mut paths);
        Self {
            root: Some(root),
            paths,
        }
    }

    /// Returns the root suite, if a tree is loaded.
    pub fn root(&self) -> Option<&TestSuiteInfo> {
        match &self.root {
            Some(TestNode::Suite(root)) => Some(root),
            _ => None,
        }
    }

    /// Returns the number of indexed nodes, including the root.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if no tree is loaded.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Looks up a node by ID.
    pub fn get(&self, id: &str) -> Option<&TestNode> {
        self.lookup(id).map(|(node, _)| node)
    }

    /// Resolves the given IDs to the set of leaf tests they denote, along with each test's source
    /// file.
    ///
    /// Suites expand to all tests under them. Unknown IDs are skipped.
    pub fn resolve_tests<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, Option<Utf8PathBuf>> {
        let mut tests = BTreeMap::new();
        for id in ids {
            match self.lookup(id) {
                Some((node, file)) => collect_tests(node, file, &mut tests),
                None => debug!(id, "ignoring unknown test ID"),
            }
        }
        tests
    }

    /// Returns the source file of the given node, inherited from its closest ancestor if the node
    /// doesn't carry one itself.
    pub fn file_of(&self, id: &str) -> Option<&Utf8Path> {
        self.lookup(id).and_then(|(_, file)| file)
    }

    /// Returns the file and line of the first test at or under the given node.
    pub fn first_test_location(&self, id: &str) -> Option<(Utf8PathBuf, u32)> {
        let (node, file) = self.lookup(id)?;
        first_test(node, file)
    }

    /// Walks to the node with the given ID, tracking the closest source file on the way.
    fn lookup(&self, id: &str) -> Option<(&TestNode, Option<&Utf8Path>)> {
        let path = self.paths.get(id)?;
        let mut node = self.root.as_ref()?;
        let mut file = node.file();
        for &index in path {
            node = node.children().get(index)?;
            file = node.file().or(file);
        }
        Some((node, file))
    }
}

fn index_node(node: &TestNode, path: &mut Vec<usize>, paths: &mut HashMap<String, Vec<usize>>) {
    match paths.entry(node.id().to_owned()) {
        Entry::Occupied(_) => {
            warn!(id = node.id(), "duplicate test ID, only the first node is addressable");
        }
        Entry::Vacant(entry) => {
            entry.insert(path.clone());
        }
    }

    for (index, child) in node.children().iter().enumerate() {
        path.push(index);
        index_node(child, path, paths);
        path.pop();
    }
}

fn collect_tests(
    node: &TestNode,
    file: Option<&Utf8Path>,
    tests: &mut BTreeMap<String, Option<Utf8PathBuf>>,
) {
    match node {
        TestNode::Test(test) => {
            tests.insert(test.id.clone(), file.map(ToOwned::to_owned));
        }
        TestNode::Suite(suite) => {
            for child in &suite.children {
                collect_tests(child, child.file().or(file), tests);
            }
        }
    }
}

fn first_test(node: &TestNode, file: Option<&Utf8Path>) -> Option<(Utf8PathBuf, u32)> {
    match node {
        TestNode::Test(test) => Some((file?.to_owned(), test.line?)),
        TestNode::Suite(suite) => suite
            .children
            .iter()
            .find_map(|child| first_test(child, child.file().or(file))),
    }
}
