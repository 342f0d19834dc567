// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment variables for worker processes.

use std::collections::BTreeMap;
use tracing::debug;

/// The full set of environment variables passed to worker processes.
///
/// This is the environment of the current process, overridden and extended by per-workspace
/// settings. An override with a `None` value removes the variable.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EnvironmentMap {
    map: BTreeMap<String, String>,
}

impl EnvironmentMap {
    /// Resolves the environment from the current process and the given overrides.
    pub fn new(overrides: &BTreeMap<String, Option<String>>) -> Self {
        let base = std::env::vars_os().filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
            (Ok(k), Ok(v)) => Some((k, v)),
            (k, _) => {
                // Workers are handed a UTF-8 environment only.
                debug!(key = ?k, "skipping non-UTF-8 environment variable");
                None
            }
        });
        Self::with_base(base, overrides)
    }

    /// Resolves the environment from the given base variables and overrides.
    pub fn with_base(
        base: impl IntoIterator<Item = (String, String)>,
        overrides: &BTreeMap<String, Option<String>>,
    ) -> Self {
        let mut map: BTreeMap<String, String> = base.into_iter().collect();

        for (name, value) in overrides {
            // Environment variable names are case-insensitive on Windows, so an override must
            // replace any existing spelling of the same name.
            map.retain(|existing, _| !imp::same_key(existing, name));
            if let Some(value) = value {
                map.insert(name.clone(), value.clone());
            }
        }

        Self { map }
    }

    /// Returns the value of a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map
            .iter()
            .find(|(k, _)| imp::same_key(k, name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over all variables in the environment.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn apply_env(&self, command: &mut tokio::process::Command) {
        command.env_clear();
        command.envs(&self.map);
    }
}

#[cfg(windows)]
mod imp {
    pub(super) fn same_key(a: &str, b: &str) -> bool {
        a.eq_ignore_ascii_case(b)
    }
}

#[cfg(not(windows))]
mod imp {
    pub(super) fn same_key(a: &str, b: &str) -> bool {
        a == b
    }
}
