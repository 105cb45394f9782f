// src/exec/task_runner.rs

//! Job runner: drives one spawned process to its terminal status.
//!
//! The process gets a single pipe for both stdout and stderr, so the order of
//! lines in the sink is the order the process wrote them. The pipe is read on
//! Tokio's blocking pool and decoded into lines there; lines travel to the
//! runner task over a bounded channel, and the runner task is the only place
//! that appends lines for its job. The completion event is sent only after
//! the last line was appended.

use std::io::{self, PipeReader, Read};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, trace, warn};

use crate::errors::LaunchError;
use crate::exec::lines::LineDecoder;
use crate::job::{Completion, JobDescriptor, JobId, JobStatus, StatusSender};
use crate::sink::{LineSource, LogSink};

const READ_CHUNK: usize = 8 * 1024;
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Per-runner behaviour.
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Append `>>> starting` / `>>> finished` banner lines around the output.
    pub announce: bool,
    /// After killing a cancelled process, how long to keep draining output
    /// still buffered in the pipe.
    pub drain_grace: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            announce: false,
            drain_grace: Duration::from_secs(2),
        }
    }
}

/// Everything a runner reports through: its identity, the status writer,
/// the sink and the completion channel back to the supervisor.
#[derive(Debug)]
pub struct JobContext {
    pub id: JobId,
    pub descriptor: Arc<JobDescriptor>,
    pub status: StatusSender,
    pub sink: LogSink,
    pub completions: mpsc::UnboundedSender<Completion>,
}

impl JobContext {
    /// Publish the terminal status and send the completion event.
    ///
    /// Must be called after the job's last line was appended.
    pub fn finish(self, status: JobStatus) {
        self.status.set(status.clone());
        let seq = self.sink.reserve_seq();
        let completion = Completion {
            id: self.id,
            class: self.descriptor.class().clone(),
            descriptor: self.descriptor,
            status,
            seq,
            finished_at: SystemTime::now(),
        };
        if self.completions.send(completion).is_err() {
            debug!(job = %self.id, "supervisor gone; completion dropped");
        }
    }
}

/// A started process and the read end of its merged output pipe.
#[derive(Debug)]
pub struct SpawnedProcess {
    child: Child,
    output: PipeReader,
}

impl SpawnedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Check what can be checked before spawning.
pub fn validate_descriptor(descriptor: &JobDescriptor) -> Result<(), LaunchError> {
    if descriptor.argv().is_empty() {
        return Err(LaunchError::EmptyCommand);
    }
    if let Some(dir) = descriptor.workdir() {
        if !dir.exists() {
            return Err(LaunchError::MissingWorkdir(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(LaunchError::WorkdirNotADirectory(dir.to_path_buf()));
        }
    }
    Ok(())
}

/// Start the process described by `descriptor` with stdout and stderr merged.
///
/// This returns as soon as the OS created the process; it never waits on it.
pub fn spawn_process(descriptor: &JobDescriptor) -> Result<SpawnedProcess, LaunchError> {
    validate_descriptor(descriptor)?;
    let program = descriptor.program().unwrap_or_default().to_string();
    let spawn_err = |source: io::Error| LaunchError::Spawn {
        program: program.clone(),
        source,
    };

    let (output, writer) = io::pipe().map_err(spawn_err)?;
    let writer_for_stderr = writer.try_clone().map_err(spawn_err)?;

    let child = {
        let mut cmd = Command::new(&program);
        cmd.args(descriptor.args())
            .envs(descriptor.envs().iter().cloned())
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_for_stderr)
            .kill_on_drop(true);
        if let Some(dir) = descriptor.workdir() {
            cmd.current_dir(dir);
        }
        cmd.spawn().map_err(spawn_err)?
        // `cmd` drops here and closes our copies of the write end, so the
        // reader sees EOF once the process (and its children) exit.
    };

    Ok(SpawnedProcess { child, output })
}

/// Run a spawned job to completion. Never returns an error: every failure
/// becomes a terminal status plus a diagnostic line.
pub async fn run_job(
    ctx: JobContext,
    process: SpawnedProcess,
    cancel: oneshot::Receiver<()>,
    options: RunnerOptions,
) {
    let id = ctx.id;
    info!(
        job = %id,
        class = %ctx.descriptor.class(),
        pid = ?process.pid(),
        cmd = %ctx.descriptor.display_command(),
        "job process started"
    );

    if options.announce {
        ctx.sink.append(
            id,
            LineSource::Notice,
            format!(">>> starting: {}", ctx.descriptor.display_command()),
        );
    }

    let SpawnedProcess { child, output } = process;
    let status = match drive(id, child, output, cancel, &ctx.sink, options).await {
        Ok(status) => status,
        Err(err) => {
            error!(job = %id, error = %format!("{err:#}"), "job runtime error");
            JobStatus::Errored(format!("{err:#}"))
        }
    };

    match &status {
        JobStatus::Errored(cause) => {
            ctx.sink
                .append(id, LineSource::Notice, format!(">>> error: {cause}"));
        }
        other if options.announce => {
            ctx.sink.append(id, LineSource::Notice, banner_for(other));
        }
        _ => {}
    }

    info!(job = %id, status = %status, "job finished");
    ctx.finish(status);
}

fn banner_for(status: &JobStatus) -> String {
    match status {
        JobStatus::Succeeded => ">>> finished successfully".to_string(),
        JobStatus::Failed(code) => format!(">>> failed with exit code {code}"),
        JobStatus::Cancelled => ">>> cancelled".to_string(),
        other => format!(">>> {other}"),
    }
}

enum ReaderMsg {
    Line(String),
    Failed(io::Error),
}

async fn drive(
    id: JobId,
    mut child: Child,
    output: PipeReader,
    mut cancel_rx: oneshot::Receiver<()>,
    sink: &LogSink,
    options: RunnerOptions,
) -> Result<JobStatus> {
    let mut lines = spawn_reader(output);
    let mut cancel_open = true;
    let mut cancelled = false;
    let mut drain_deadline: Option<Instant> = None;

    // Phase 1: stream output until EOF (or until the drain grace after a
    // cancellation runs out).
    loop {
        tokio::select! {
            msg = lines.recv() => match msg {
                Some(ReaderMsg::Line(text)) => {
                    trace!(job = %id, "output: {}", text);
                    sink.append(id, LineSource::Output, text);
                }
                Some(ReaderMsg::Failed(err)) => {
                    warn!(job = %id, error = %err, "reading job output failed; killing process");
                    kill(id, &mut child);
                    let _ = child.wait().await;
                    return Err(err).context("reading job output");
                }
                None => break,
            },
            res = &mut cancel_rx, if cancel_open => {
                cancel_open = false;
                if res.is_ok() {
                    info!(job = %id, "cancellation requested; killing process");
                    cancelled = true;
                    kill(id, &mut child);
                    drain_deadline = Some(Instant::now() + options.drain_grace);
                }
            }
            _ = sleep_until(drain_deadline.unwrap_or_else(Instant::now)), if drain_deadline.is_some() => {
                debug!(job = %id, "drain grace elapsed; dropping remaining output");
                break;
            }
        }
    }
    // Stops the reader at its next line if the pipe is still open.
    drop(lines);

    // Phase 2: the output is closed, but the process may still be running.
    let exit_status = loop {
        tokio::select! {
            res = child.wait() => break res.context("waiting for job process")?,
            res = &mut cancel_rx, if cancel_open => {
                cancel_open = false;
                if res.is_ok() {
                    info!(job = %id, "cancellation requested; killing process");
                    cancelled = true;
                    kill(id, &mut child);
                }
            }
        }
    };

    if cancelled {
        return Ok(JobStatus::Cancelled);
    }
    if exit_status.success() {
        return Ok(JobStatus::Succeeded);
    }
    let code = exit_code(&exit_status);
    info!(job = %id, exit_code = code, "job process exited unsuccessfully");
    Ok(JobStatus::Failed(code))
}

fn kill(id: JobId, child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(job = %id, error = %e, "kill failed; process probably already exited");
    }
}

#[cfg(unix)]
fn exit_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn spawn_reader(output: PipeReader) -> mpsc::Receiver<ReaderMsg> {
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || read_lines(output, tx));
    rx
}

fn read_lines(mut output: impl Read, tx: mpsc::Sender<ReaderMsg>) {
    let mut decoder = LineDecoder::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match output.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for line in decoder.feed(&buf[..n]) {
                    if tx.blocking_send(ReaderMsg::Line(line)).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.blocking_send(ReaderMsg::Failed(e));
                return;
            }
        }
    }
    if let Some(line) = decoder.finish() {
        let _ = tx.blocking_send(ReaderMsg::Line(line));
    }
}
