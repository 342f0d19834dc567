// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts, clap_styles},
    reporter::{RunReporter, write_tree},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{Config, File, FileFormat};
use jasmine_explorer_metadata::{JasmineExplorerExitCode, LoadEvent, RunEvent, TestSuiteInfo};
use jasmine_explorer_runner::{
    adapter::JasmineAdapter, emitter::HostEvents, settings::AdapterSettings,
};
use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

/// The name of the settings file looked up in the workspace folder.
pub const SETTINGS_FILE_NAME: &str = "jasmine-explorer.toml";

/// Discover and run Jasmine specs the way an editor's test explorer does.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct JasmineExplorerApp {
    /// Workspace folder [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    settings_opts: SettingsOpts,

    #[command(subcommand)]
    command: Command,
}

impl JasmineExplorerApp {
    /// Initializes logging and color output.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let workspace = resolve_workspace(self.workspace.as_deref())?;
        let settings = self.settings_opts.make_settings(&workspace)?;
        if settings.worker_scripts.is_none() {
            return Err(ExpectedError::NoWorkerScripts {
                path: self.settings_opts.settings_path(&workspace),
            });
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("jasmine-explorer-worker")
            .build()
            .map_err(|err| ExpectedError::RuntimeBuildError { err })?;

        let (adapter, events) = JasmineAdapter::new(workspace, settings);
        match self.command {
            Command::List { message_format } => {
                runtime.block_on(exec_list(adapter, events, message_format, output))
            }
            Command::Run {
                message_format,
                ids,
                extra_args,
            } => runtime.block_on(exec_run(
                Arc::new(adapter),
                events,
                RunOpts {
                    message_format,
                    ids,
                    extra_args,
                },
                output,
            )),
        }
    }
}

#[derive(Debug, Args)]
struct SettingsOpts {
    /// Settings file [default: <workspace>/jasmine-explorer.toml]
    #[arg(long, global = true, value_name = "PATH", env = "JASMINE_EXPLORER_SETTINGS")]
    settings: Option<Utf8PathBuf>,

    /// Jasmine config file, relative to the working directory
    #[arg(long, global = true, value_name = "PATH", env = "JASMINE_EXPLORER_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Runtime executable used to start workers [default: node on PATH]
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "JASMINE_EXPLORER_RUNTIME_PATH"
    )]
    runtime_path: Option<Utf8PathBuf>,

    /// Ask workers for verbose diagnostics
    #[arg(long, global = true, env = "JASMINE_EXPLORER_WORKER_LOG")]
    worker_log: bool,
}

impl SettingsOpts {
    /// Reads the settings file, then applies command-line overrides.
    fn settings_path(&self, workspace: &Utf8Path) -> Utf8PathBuf {
        match &self.settings {
            Some(path) => workspace.join(path),
            None => workspace.join(SETTINGS_FILE_NAME),
        }
    }

    fn make_settings(&self, workspace: &Utf8Path) -> Result<AdapterSettings> {
        let path = self.settings_path(workspace);
        // An explicitly passed settings file must exist.
        let source = File::new(path.as_str(), FileFormat::Toml).required(self.settings.is_some());

        let mut settings = Config::builder()
            .add_source(source)
            .build()
            .and_then(|config| config.try_deserialize::<AdapterSettings>())
            .map_err(|err| ExpectedError::SettingsReadError {
                path: path.clone(),
                err,
            })?;

        if let Some(config) = &self.config {
            settings.config = config.clone();
        }
        if let Some(runtime_path) = &self.runtime_path {
            settings.runtime_path = Some(runtime_path.clone());
        }
        if self.worker_log {
            settings.log_enabled = true;
        }
        Ok(settings)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the specs in the workspace
    ///
    /// This runs the load worker and prints the discovered tree. Use --message-format json to get
    /// machine-readable output.
    List {
        /// Output format
        #[arg(short = 'T', long, value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormat,
    },
    /// Discover, then run specs
    ///
    /// IDs may name tests or suites; suites expand to every test they contain. With no IDs, every
    /// spec is run.
    Run {
        /// Output format
        #[arg(short = 'T', long, value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormat,

        /// Test or suite IDs to run
        #[arg(value_name = "IDS")]
        ids: Vec<String>,

        /// Extra arguments passed to the runtime
        #[arg(last = true)]
        extra_args: Vec<String>,
    },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum MessageFormat {
    /// Human-readable output
    #[default]
    Human,
    /// One JSON document per event
    Json,
}

struct RunOpts {
    message_format: MessageFormat,
    ids: Vec<String>,
    extra_args: Vec<String>,
}

fn resolve_workspace(workspace: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
    let current_dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    let current_dir = Utf8PathBuf::try_from(current_dir)
        .map_err(|err| ExpectedError::WorkspaceDirInvalidUtf8 {
            path: err.into_path_buf(),
        })?;
    Ok(match workspace {
        Some(workspace) => current_dir.join(workspace),
        None => current_dir,
    })
}

/// Loads the tree and returns the suite from the final load event.
async fn load_suite(
    adapter: &JasmineAdapter,
    events: &mut UnboundedReceiver<LoadEvent>,
) -> Option<TestSuiteInfo> {
    adapter.load().await;
    let mut suite = None;
    while let Ok(event) = events.try_recv() {
        if let LoadEvent::Finished { suite: loaded } = event {
            suite = loaded;
        }
    }
    suite
}

async fn exec_list(
    adapter: JasmineAdapter,
    mut events: HostEvents,
    message_format: MessageFormat,
    output: OutputContext,
) -> Result<i32> {
    let suite = load_suite(&adapter, &mut events.load).await;
    let mut stdout = std::io::stdout().lock();

    match message_format {
        MessageFormat::Human => match &suite {
            Some(suite) => write_tree(suite, &output.reporter_styles(), &mut stdout)
                .map_err(|err| ExpectedError::WriteOutputError { err })?,
            None => warn!("no tests found in {}", adapter.workspace()),
        },
        MessageFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, &suite)
                .map_err(|err| ExpectedError::SerializeError { err })?;
            writeln!(stdout).map_err(|err| ExpectedError::WriteOutputError { err })?;
        }
    }

    Ok(if suite.is_some() {
        JasmineExplorerExitCode::OK
    } else {
        JasmineExplorerExitCode::NO_TESTS_FOUND
    })
}

async fn exec_run(
    adapter: Arc<JasmineAdapter>,
    mut events: HostEvents,
    opts: RunOpts,
    output: OutputContext,
) -> Result<i32> {
    let RunOpts {
        message_format,
        ids,
        extra_args,
    } = opts;

    // Suite IDs can only be expanded against a loaded tree.
    load_suite(&adapter, &mut events.load).await;

    let cancelled = Arc::new(AtomicBool::new(false));
    let signal_task = tokio::spawn({
        let adapter = adapter.clone();
        let cancelled = cancelled.clone();
        async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                info!("received interrupt, cancelling run");
                cancelled.store(true, Ordering::SeqCst);
                adapter.cancel();
            }
        }
    });

    let mut reporter = RunReporter::new(
        std::io::stdout(),
        output.reporter_styles(),
        adapter.node_index(),
        output.verbose,
    );

    let run = adapter.run(&ids, &extra_args);
    tokio::pin!(run);
    let mut run_done = false;
    let result = loop {
        tokio::select! {
            result = &mut run, if !run_done => {
                if let Err(err) = result {
                    break Err(ExpectedError::from(err));
                }
                run_done = true;
            }
            event = events.run.recv() => {
                let Some(event) = event else {
                    break Ok(());
                };
                let finished = matches!(event, RunEvent::Finished);
                if let Err(err) = write_run_event(&mut reporter, message_format, &event) {
                    adapter.cancel();
                    break Err(err);
                }
                if finished {
                    break Ok(());
                }
            }
        }
    };
    signal_task.abort();
    result?;

    let stats = reporter.stats();
    Ok(if cancelled.load(Ordering::SeqCst) {
        JasmineExplorerExitCode::RUN_CANCELLED
    } else if stats.failed > 0 {
        JasmineExplorerExitCode::TEST_RUN_FAILED
    } else if stats.finished_count() == 0 {
        JasmineExplorerExitCode::NO_TESTS_FOUND
    } else {
        JasmineExplorerExitCode::OK
    })
}

fn write_run_event<W: Write>(
    reporter: &mut RunReporter<W>,
    message_format: MessageFormat,
    event: &RunEvent,
) -> Result<()> {
    match message_format {
        MessageFormat::Human => reporter
            .handle(event)
            .map_err(|err| ExpectedError::WriteOutputError { err }),
        MessageFormat::Json => {
            // Keep the counts used for the exit code, but print JSON instead.
            reporter.record(event);
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer(&mut stdout, event)
                .map_err(|err| ExpectedError::SerializeError { err })?;
            writeln!(stdout).map_err(|err| ExpectedError::WriteOutputError { err })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_app() {
        JasmineExplorerApp::command().debug_assert();
    }

    #[test]
    fn run_arguments() {
        let app = JasmineExplorerApp::try_parse_from([
            "jasmine-explorer",
            "run",
            "Math",
            "Strings trims",
            "--",
            "--inspect",
        ])
        .unwrap();
        let Command::Run {
            ids, extra_args, ..
        } = app.command
        else {
            panic!("expected run");
        };
        assert_eq!(ids, ["Math", "Strings trims"]);
        assert_eq!(extra_args, ["--inspect"]);
    }

    #[test]
    fn settings_file_and_overrides() {
        let dir = camino_tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            indoc::indoc! {r#"
                config = "jasmine.json"
                debugger-port = 9333
                runtime-args = ["--no-warnings"]

                [worker-scripts]
                load = "tools/load.js"
                run = "tools/run.js"

                [env]
                DEBUG = false
                NODE_ENV = "test"
            "#},
        )
        .unwrap();

        let opts = SettingsOpts {
            settings: None,
            config: None,
            runtime_path: Some("/opt/node/bin/node".into()),
            worker_log: true,
        };
        let settings = opts.make_settings(dir.path()).unwrap();
        assert_eq!(settings.config, "jasmine.json");
        assert_eq!(settings.debugger_port, 9333);
        assert_eq!(settings.runtime_args, ["--no-warnings"]);
        assert_eq!(
            settings.worker_scripts.map(|scripts| scripts.load),
            Some("tools/load.js".into())
        );
        assert_eq!(settings.runtime_path.as_deref(), Some(Utf8Path::new("/opt/node/bin/node")));
        assert!(settings.log_enabled);
        // `false` removes a variable.
        assert_eq!(
            settings.env.into_values().collect::<Vec<_>>(),
            [None, Some("test".to_owned())]
        );
    }

    #[test]
    fn missing_default_settings_file_is_fine() {
        let dir = camino_tempfile::tempdir().unwrap();
        let opts = SettingsOpts {
            settings: None,
            config: None,
            runtime_path: None,
            worker_log: false,
        };
        assert_eq!(opts.make_settings(dir.path()).unwrap(), AdapterSettings::default());
    }

    #[test]
    fn missing_explicit_settings_file_is_an_error() {
        let dir = camino_tempfile::tempdir().unwrap();
        let opts = SettingsOpts {
            settings: Some("nope.toml".into()),
            config: None,
            runtime_path: None,
            worker_log: false,
        };
        let err = opts.make_settings(dir.path()).unwrap_err();
        assert!(matches!(err, ExpectedError::SettingsReadError { .. }));
        assert_eq!(err.process_exit_code(), JasmineExplorerExitCode::SETUP_ERROR);
    }
}
