use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use jobdeck::errors::LaunchError;
use jobdeck::exec::{JobContext, JobLauncher};
use jobdeck::job::{JobDescriptor, JobStatus};
use jobdeck::sink::LineSource;
use tokio::sync::{oneshot, watch};

/// Scripted behaviour of one fake job.
#[derive(Debug, Clone)]
pub struct FakeJob {
    lines: Vec<String>,
    status: JobStatus,
    gate: Option<watch::Receiver<bool>>,
}

impl FakeJob {
    pub fn succeed() -> Self {
        Self {
            lines: Vec::new(),
            status: JobStatus::Succeeded,
            gate: None,
        }
    }

    pub fn fail(code: i32) -> Self {
        Self {
            status: JobStatus::Failed(code),
            ..Self::succeed()
        }
    }

    pub fn error(cause: &str) -> Self {
        Self {
            status: JobStatus::Errored(cause.to_string()),
            ..Self::succeed()
        }
    }

    pub fn with_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Hold the job after its output until the returned gate is opened (or
    /// the job is cancelled).
    pub fn gated(mut self) -> (Self, Gate) {
        let (tx, rx) = watch::channel(false);
        self.gate = Some(rx);
        (self, Gate(tx))
    }
}

/// Releases every job created by the matching [`FakeJob::gated`].
#[derive(Debug)]
pub struct Gate(watch::Sender<bool>);

impl Gate {
    pub fn open(&self) {
        self.0.send_replace(true);
    }
}

/// A launcher that never spawns a process.
///
/// - Jobs are matched by program name (`argv[0]`); unknown programs succeed
///   without output.
/// - Programs marked with [`FakeLauncher::missing`] fail to spawn with
///   `NotFound`, like a missing executable.
/// - Every successfully spawned descriptor is recorded.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    jobs: HashMap<String, FakeJob>,
    missing: HashSet<String>,
    spawned: Arc<Mutex<Vec<JobDescriptor>>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, program: &str, job: FakeJob) -> Self {
        self.jobs.insert(program.to_string(), job);
        self
    }

    pub fn missing(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Shared record of spawned descriptors; stays valid after the launcher
    /// moved into a supervisor.
    pub fn spawned(&self) -> Arc<Mutex<Vec<JobDescriptor>>> {
        Arc::clone(&self.spawned)
    }
}

impl JobLauncher for FakeLauncher {
    type Process = FakeJob;

    fn spawn(&mut self, descriptor: &JobDescriptor) -> Result<FakeJob, LaunchError> {
        let program = descriptor.program().unwrap_or_default().to_string();
        if self.missing.contains(&program) {
            return Err(LaunchError::Spawn {
                program,
                source: io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
        self.spawned.lock().unwrap().push(descriptor.clone());
        Ok(self
            .jobs
            .get(&program)
            .cloned()
            .unwrap_or_else(FakeJob::succeed))
    }

    fn run(&mut self, job: FakeJob, ctx: JobContext, mut cancel: oneshot::Receiver<()>) {
        tokio::spawn(async move {
            for line in &job.lines {
                ctx.sink.append(ctx.id, LineSource::Output, line.clone());
            }

            let mut cancelled = false;
            if let Some(mut gate) = job.gate {
                let mut cancel_open = true;
                loop {
                    tokio::select! {
                        _ = wait_open(&mut gate) => break,
                        res = &mut cancel, if cancel_open => {
                            if res.is_ok() {
                                cancelled = true;
                                break;
                            }
                            cancel_open = false;
                        }
                    }
                }
            } else {
                cancelled = cancel.try_recv().is_ok();
            }

            let status = if cancelled { JobStatus::Cancelled } else { job.status };
            if let JobStatus::Errored(cause) = &status {
                ctx.sink
                    .append(ctx.id, LineSource::Notice, format!(">>> error: {cause}"));
            }
            ctx.finish(status);
        });
    }
}

async fn wait_open(gate: &mut watch::Receiver<bool>) {
    let _ = gate.wait_for(|open| *open).await;
}
