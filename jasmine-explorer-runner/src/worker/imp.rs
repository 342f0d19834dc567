// Copyright (c) The jasmine-explorer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::LoadedConfig,
    env::EnvironmentMap,
    errors::{DisplayErrorChain, WorkerSpawnError},
    helpers::display_exited_with,
};
use camino::Utf8PathBuf;
use jasmine_explorer_metadata::{WorkerMessage, WorkerReport, split_output_line};
use std::{fmt, io, process::ExitStatus, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, ChildStderr, ChildStdout, Command},
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

/// How long to keep reading output after the worker exits.
///
/// Grandchildren may inherit the worker's stdout and stderr and keep them open indefinitely.
const LEAK_TIMEOUT: Duration = Duration::from_millis(200);

/// The kind of a worker process.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerKind {
    /// Discovers tests and reports the test tree.
    Load,

    /// Runs tests and reports state transitions.
    Run,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Run => write!(f, "run"),
        }
    }
}

/// A fully assembled worker command line.
///
/// The command line is
/// `<runtime> <runtime args> <extra args> <worker script> <config file> <log flag> [<test IDs>]`.
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    kind: WorkerKind,
    program: Utf8PathBuf,
    args: Vec<String>,
    cwd: Utf8PathBuf,
    env: EnvironmentMap,
}

impl WorkerCommand {
    /// Assembles the command for a worker of the given kind.
    ///
    /// `test_ids` is only passed to run workers. `None` means "run everything".
    pub fn new(
        kind: WorkerKind,
        config: &LoadedConfig,
        extra_args: &[String],
        test_ids: Option<&[String]>,
    ) -> Self {
        let script = match kind {
            WorkerKind::Load => &config.worker_scripts.load,
            WorkerKind::Run => &config.worker_scripts.run,
        };

        let mut args = config.runtime.args.clone();
        args.extend(extra_args.iter().cloned());
        args.push(script.to_string());
        args.push(config.config_file.to_string());
        args.push(config.log_enabled.to_string());
        if let Some(ids) = test_ids {
            // Serializing a list of strings can't fail.
            args.push(serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_owned()));
        }

        Self {
            kind,
            program: config.runtime.program.clone(),
            args,
            cwd: config.cwd.clone(),
            env: config.env.clone(),
        }
    }

    /// Returns the kind of worker this command starts.
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Returns the program that will be executed.
    pub fn program(&self) -> &Utf8PathBuf {
        &self.program
    }

    /// Returns the arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Spawns the worker.
    pub fn spawn(self) -> Result<(WorkerProcess, WorkerControl), WorkerSpawnError> {
        let mut cmd = Command::new(self.program.as_std_path());
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.env.apply_env(&mut cmd);
        super::os::set_process_group(&mut cmd);

        debug!(
            kind = %self.kind,
            program = %self.program,
            args = ?self.args,
            cwd = %self.cwd,
            "spawning worker",
        );
        let mut child = cmd
            .spawn()
            .map_err(|err| WorkerSpawnError::new(self.kind, self.program.as_str(), err))?;

        let stdout = child.stdout.take().map(OutputLines::new);
        let stderr = child.stderr.take().map(OutputLines::new);
        let (req_tx, req_rx) = unbounded_channel();

        let process = WorkerProcess {
            kind: self.kind,
            pid: child.id(),
            child,
            stdout,
            stderr,
            exit: None,
            leak_deadline: None,
            req_rx,
        };
        Ok((process, WorkerControl { req_tx }))
    }
}

/// A request sent to a running worker through a [`WorkerControl`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WorkerRequest {
    /// Ask the worker to shut down (SIGTERM on Unix).
    Terminate,

    /// Kill the worker immediately.
    Kill,
}

/// A handle used to cancel a running worker from elsewhere.
///
/// Requests sent after the worker has exited are ignored.
#[derive(Clone, Debug)]
pub struct WorkerControl {
    req_tx: UnboundedSender<WorkerRequest>,
}

impl WorkerControl {
    /// Asks the worker to shut down.
    pub fn terminate(&self) {
        _ = self.req_tx.send(WorkerRequest::Terminate);
    }

    /// Kills the worker.
    pub fn kill(&self) {
        _ = self.req_tx.send(WorkerRequest::Kill);
    }
}

/// Something a worker process produced.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A structured report.
    Report(WorkerReport),

    /// The worker exited and its output was drained. This is always the last event.
    ///
    /// The status is `None` if waiting on the process failed.
    Exited(Option<ExitStatus>),
}

/// A running worker process.
///
/// Log lines and other diagnostic output are logged under this module's target; only structured
/// reports and the final exit are surfaced through [`next_event`](Self::next_event).
#[derive(Debug)]
pub struct WorkerProcess {
    kind: WorkerKind,
    pid: Option<u32>,
    child: Child,
    stdout: Option<OutputLines<ChildStdout>>,
    stderr: Option<OutputLines<ChildStderr>>,
    exit: Option<Option<ExitStatus>>,
    leak_deadline: Option<Instant>,
    req_rx: UnboundedReceiver<WorkerRequest>,
}

impl WorkerProcess {
    /// Returns the kind of this worker.
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Returns the worker's process ID.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Waits for the next report, or for the worker to exit.
    ///
    /// Once [`WorkerEvent::Exited`] has been returned, this must not be called again.
    pub async fn next_event(&mut self) -> WorkerEvent {
        loop {
            if let Some(status) = self.exit
                && self.stdout.is_none()
                && self.stderr.is_none()
            {
                return WorkerEvent::Exited(status);
            }

            let leak_deadline = self.leak_deadline;
            tokio::select! {
                line = next_line(&mut self.stdout), if self.stdout.is_some() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(report) = self.handle_stdout_line(&line) {
                                return WorkerEvent::Report(report);
                            }
                        }
                        Ok(None) => self.stdout = None,
                        Err(err) => {
                            warn!(kind = %self.kind, "error reading worker stdout: {err}");
                            self.stdout = None;
                        }
                    }
                }
                line = next_line(&mut self.stderr), if self.stderr.is_some() => {
                    match line {
                        Ok(Some(line)) => {
                            info!(target: WORKER_TARGET, kind = %self.kind, stream = "stderr", "{line}");
                        }
                        Ok(None) => self.stderr = None,
                        Err(err) => {
                            warn!(kind = %self.kind, "error reading worker stderr: {err}");
                            self.stderr = None;
                        }
                    }
                }
                res = self.child.wait(), if self.exit.is_none() => {
                    self.exit = Some(self.handle_exit(res));
                    self.leak_deadline = Some(Instant::now() + LEAK_TIMEOUT);
                }
                () = sleep_until(leak_deadline.unwrap_or_else(Instant::now)), if leak_deadline.is_some() => {
                    warn!(
                        kind = %self.kind,
                        "worker exited but its output is still open after {:?}, ignoring the rest",
                        LEAK_TIMEOUT,
                    );
                    self.stdout = None;
                    self.stderr = None;
                }
                Some(req) = self.req_rx.recv() => self.handle_request(req),
            }
        }
    }

    fn handle_stdout_line(&self, line: &str) -> Option<WorkerReport> {
        let (output, message) = split_output_line(line);
        if !output.is_empty() {
            info!(target: WORKER_TARGET, kind = %self.kind, stream = "stdout", "{output}");
        }

        match WorkerMessage::parse_line(message?) {
            Ok(WorkerMessage::Report(report)) => Some(report),
            Ok(WorkerMessage::Log(message)) => {
                info!(target: WORKER_TARGET, kind = %self.kind, "{message}");
                None
            }
            Err(err) => {
                warn!(
                    kind = %self.kind,
                    "skipping malformed worker message: {}",
                    DisplayErrorChain::new(&err),
                );
                None
            }
        }
    }

    fn handle_exit(&self, res: io::Result<ExitStatus>) -> Option<ExitStatus> {
        match res {
            Ok(status) => {
                if status.success() {
                    debug!(kind = %self.kind, pid = ?self.pid, "worker {}", display_exited_with(status));
                } else {
                    info!(kind = %self.kind, pid = ?self.pid, "worker {}", display_exited_with(status));
                }
                Some(status)
            }
            Err(err) => {
                warn!(kind = %self.kind, "failed to wait for worker: {err}");
                None
            }
        }
    }

    fn handle_request(&mut self, req: WorkerRequest) {
        if self.exit.is_some() {
            // The process is done executing, so requests are moot.
            return;
        }
        debug!(kind = %self.kind, pid = ?self.pid, ?req, "sending request to worker");
        match req {
            WorkerRequest::Terminate => super::os::terminate_child(&mut self.child),
            WorkerRequest::Kill => {
                if let Err(err) = self.child.start_kill() {
                    debug!(kind = %self.kind, "failed to kill worker: {err}");
                }
            }
        }
    }
}

/// The tracing target worker diagnostics are logged under.
pub const WORKER_TARGET: &str = "jasmine_explorer_runner::worker";

/// Lines of worker output, read as bytes.
///
/// Output is decoded lossily, so a line of invalid UTF-8 doesn't end the stream.
#[derive(Debug)]
struct OutputLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Returns the next line without its line ending, or `None` at the end of the stream.
    ///
    /// This is cancel safe: a partially read line stays in the buffer until the next call.
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.buf);
        let line = bytes.strip_suffix(b"\n").unwrap_or(&bytes);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

async fn next_line<R>(lines: &mut Option<OutputLines<R>>) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}
