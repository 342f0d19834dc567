// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host settings for a workspace folder.
//!
//! These are provided by the host verbatim. The orchestration core resolves them into a
//! [`LoadedConfig`](crate::config::LoadedConfig) the first time they are needed.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize, de::Error};
use std::collections::BTreeMap;

/// The default location of the Jasmine config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "spec/support/jasmine.json";

/// The default port the runtime exposes its debugger inspection endpoint on.
pub const DEFAULT_DEBUGGER_PORT: u16 = 9229;

/// Settings for one workspace folder.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdapterSettings {
    /// The working directory for workers, relative to the workspace folder.
    pub cwd: Option<Utf8PathBuf>,

    /// The path to the Jasmine config file, relative to the working directory.
    pub config: Utf8PathBuf,

    /// Environment variable overrides. A `None` value removes the variable.
    ///
    /// Formats without a null value, such as TOML, remove a variable with `false`.
    #[serde(deserialize_with = "deserialize_env")]
    pub env: BTreeMap<String, Option<String>>,

    /// The port the runtime's debugger listens on while debugging.
    pub debugger_port: u16,

    /// The runtime executable. If unset, `node` is looked up on `PATH`.
    pub runtime_path: Option<Utf8PathBuf>,

    /// Extra arguments passed to the runtime before the worker script.
    pub runtime_args: Vec<String>,

    /// The scripts run by the runtime for each kind of worker.
    ///
    /// The host supplies these: they bind the test engine to the worker protocol (see
    /// [`reporter`](crate::reporter)). No tests are loaded until they are set.
    pub worker_scripts: Option<WorkerScripts>,

    /// The name of the host's debug launch profile to attach with.
    pub debug_profile: Option<String>,

    /// Whether to set a breakpoint on the first line of the first debugged test.
    pub break_on_first_line: bool,

    /// Whether workers should produce verbose diagnostic output.
    pub log_enabled: bool,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            cwd: None,
            config: DEFAULT_CONFIG_PATH.into(),
            env: BTreeMap::new(),
            debugger_port: DEFAULT_DEBUGGER_PORT,
            runtime_path: None,
            runtime_args: Vec::new(),
            worker_scripts: None,
            debug_profile: None,
            break_on_first_line: false,
            log_enabled: false,
        }
    }
}

impl AdapterSettings {
    /// Returns the working directory for the given workspace folder.
    pub fn working_dir(&self, workspace: &Utf8Path) -> Utf8PathBuf {
        match &self.cwd {
            Some(cwd) => workspace.join(cwd),
            None => workspace.to_path_buf(),
        }
    }

    /// Returns the absolute path to the Jasmine config file for the given workspace folder.
    pub fn config_file(&self, workspace: &Utf8Path) -> Utf8PathBuf {
        self.working_dir(workspace).join(&self.config)
    }

    /// Returns true if switching from `self` to `other` requires the resolved configuration to be
    /// discarded.
    ///
    /// This is the case if the config file location, the environment, or the runtime changed.
    /// Debugging and logging toggles are read on each use and don't require a reload.
    pub fn requires_reload(&self, other: &Self) -> bool {
        self.cwd != other.cwd
            || self.config != other.config
            || self.env != other.env
            || self.runtime_path != other.runtime_path
            || self.runtime_args != other.runtime_args
            || self.worker_scripts != other.worker_scripts
    }
}

fn deserialize_env<'de, D>(deserializer: D) -> Result<BTreeMap<String, Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum EnvValue {
        Set(String),
        Flag(bool),
    }

    let values = BTreeMap::<String, Option<EnvValue>>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|(name, value)| match value {
            Some(EnvValue::Set(value)) => Ok((name, Some(value))),
            None | Some(EnvValue::Flag(false)) => Ok((name, None)),
            Some(EnvValue::Flag(true)) => Err(D::Error::custom(format!(
                "invalid value `true` for environment variable `{name}`: \
                 expected a string, or `false` to remove it"
            ))),
        })
        .collect()
}

/// Scripts the runtime executes for each worker kind.
///
/// Relative paths are resolved against the workspace folder.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkerScripts {
    /// The script that discovers tests.
    pub load: Utf8PathBuf,

    /// The script that runs tests.
    pub run: Utf8PathBuf,
}
