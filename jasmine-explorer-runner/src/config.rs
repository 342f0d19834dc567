// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of the Jasmine configuration for a workspace folder.
//!
//! The main structure in this module is [`LoadedConfig`], the cached result of combining the
//! host's [`AdapterSettings`] with the Jasmine config file on disk.

use crate::{
    env::EnvironmentMap,
    errors::ConfigReadError,
    helpers::convert_rel_path_to_forward_slash,
    settings::{AdapterSettings, WorkerScripts},
};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use tracing::debug;

/// The name of the runtime executable looked up on `PATH` if none is configured.
pub const DEFAULT_RUNTIME: &str = "node";

/// The fully resolved configuration for one workspace folder.
///
/// A `LoadedConfig` is never updated in place: whenever an input changes it is discarded and
/// rebuilt from scratch.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    /// The absolute path to the Jasmine config file.
    pub config_file: Utf8PathBuf,

    /// The working directory for worker processes.
    pub cwd: Utf8PathBuf,

    /// The absolute spec directory.
    pub spec_dir: Utf8PathBuf,

    /// The compiled spec file patterns.
    pub spec_files: SpecFilePatterns,

    /// The environment passed to worker processes.
    pub env: EnvironmentMap,

    /// The runtime used to execute worker scripts.
    pub runtime: RuntimeCommand,

    /// The absolute paths to the worker scripts.
    pub worker_scripts: WorkerScripts,

    /// The port the runtime's debugger listens on while debugging.
    pub debugger_port: u16,

    /// Whether to set a breakpoint on the first line of the first debugged test.
    pub break_on_first_line: bool,

    /// The host's debug launch profile, if any.
    pub debug_profile: Option<String>,

    /// Whether workers should produce verbose diagnostic output.
    pub log_enabled: bool,
}

impl LoadedConfig {
    /// Resolves the configuration for the given workspace folder.
    pub fn resolve(
        workspace: &Utf8Path,
        settings: &AdapterSettings,
    ) -> Result<Self, ConfigReadError> {
        let cwd = settings.working_dir(workspace);
        let config_file = settings.config_file(workspace);
        let jasmine = JasmineConfig::read(&config_file)?;

        let spec_dir = cwd.join(&jasmine.spec_dir);
        let spec_files = SpecFilePatterns::new(&spec_dir, &jasmine.spec_files).map_err(
            |(pattern, err)| ConfigReadError::Glob {
                path: config_file.clone(),
                pattern,
                err,
            },
        )?;
        let scripts = settings
            .worker_scripts
            .as_ref()
            .ok_or(ConfigReadError::NoWorkerScripts)?;

        let runtime =
            RuntimeCommand::resolve(settings.runtime_path.as_deref(), &settings.runtime_args);
        debug!(
            %config_file,
            %spec_dir,
            runtime = %runtime.program,
            "resolved Jasmine configuration",
        );

        Ok(Self {
            config_file,
            cwd,
            spec_dir,
            spec_files,
            env: EnvironmentMap::new(&settings.env),
            runtime,
            worker_scripts: WorkerScripts {
                load: workspace.join(&scripts.load),
                run: workspace.join(&scripts.run),
            },
            debugger_port: settings.debugger_port,
            break_on_first_line: settings.break_on_first_line,
            debug_profile: settings.debug_profile.clone(),
            log_enabled: settings.log_enabled,
        })
    }
}

/// The contents of a Jasmine config file (usually `spec/support/jasmine.json`).
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct JasmineConfig {
    /// The spec directory, relative to the working directory.
    #[serde(default = "default_spec_dir")]
    pub spec_dir: Utf8PathBuf,

    /// Glob patterns for spec files, relative to the spec directory. Patterns starting with `!`
    /// exclude files.
    #[serde(default)]
    pub spec_files: Vec<String>,

    /// Glob patterns for helper files, relative to the spec directory.
    #[serde(default)]
    pub helpers: Vec<String>,

    /// Whether specs run in random order.
    #[serde(default)]
    pub random: Option<bool>,
}

fn default_spec_dir() -> Utf8PathBuf {
    "spec".into()
}

impl JasmineConfig {
    /// Reads and parses the Jasmine config file at `path`.
    pub fn read(path: &Utf8Path) -> Result<Self, ConfigReadError> {
        let contents = std::fs::read_to_string(path).map_err(|err| ConfigReadError::Read {
            path: path.to_owned(),
            err,
        })?;
        serde_json::from_str(&contents).map_err(|err| ConfigReadError::Parse {
            path: path.to_owned(),
            err,
        })
    }
}

/// Compiled spec file patterns, anchored at the spec directory.
#[derive(Clone, Debug)]
pub struct SpecFilePatterns {
    spec_dir: Utf8PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    patterns: Vec<String>,
}

impl SpecFilePatterns {
    /// Compiles `patterns` relative to `spec_dir`.
    ///
    /// On failure, returns the pattern that could not be compiled along with the error.
    pub fn new(
        spec_dir: &Utf8Path,
        patterns: &[String],
    ) -> Result<Self, (String, globset::Error)> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();

        for pattern in patterns {
            let (builder, glob) = match pattern.strip_prefix('!') {
                Some(negated) => (&mut exclude, negated),
                None => (&mut include, pattern.as_str()),
            };
            let glob = GlobBuilder::new(glob)
                .literal_separator(true)
                .build()
                .map_err(|err| (pattern.clone(), err))?;
            builder.add(glob);
        }

        let include = include.build().map_err(|err| (patterns.join(", "), err))?;
        let exclude = exclude.build().map_err(|err| (patterns.join(", "), err))?;
        Ok(Self {
            spec_dir: spec_dir.to_owned(),
            include,
            exclude,
            patterns: patterns.to_vec(),
        })
    }

    /// Returns true if the given absolute path is a spec file.
    ///
    /// Paths outside the spec directory never match.
    pub fn is_match(&self, path: &Utf8Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.spec_dir) else {
            return false;
        };
        let rel = convert_rel_path_to_forward_slash(rel);
        self.include.is_match(&rel) && !self.exclude.is_match(&rel)
    }

    /// Returns the patterns as written in the config file.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// The runtime executable and the arguments passed to it before the worker script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuntimeCommand {
    /// The executable.
    pub program: Utf8PathBuf,

    /// Interpreter arguments.
    pub args: Vec<String>,
}

impl RuntimeCommand {
    /// Resolves the runtime: the configured path if any, otherwise `node` from `PATH`.
    ///
    /// If `node` can't be found, the bare name is used and the spawn will report the failure.
    pub fn resolve(configured: Option<&Utf8Path>, args: &[String]) -> Self {
        let program = match configured {
            Some(path) => path.to_owned(),
            None => match which::which(DEFAULT_RUNTIME) {
                Ok(path) => match Utf8PathBuf::try_from(path) {
                    Ok(path) => path,
                    Err(err) => {
                        debug!("runtime path is not UTF-8: {}", err.as_path().display());
                        DEFAULT_RUNTIME.into()
                    }
                },
                Err(err) => {
                    debug!("`{DEFAULT_RUNTIME}` not found on PATH: {err}");
                    DEFAULT_RUNTIME.into()
                }
            },
        };
        Self {
            program,
            args: args.to_vec(),
        }
    }
}
