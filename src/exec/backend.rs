// src/exec/backend.rs

//! Pluggable launcher abstraction.
//!
//! The supervisor talks to a `JobLauncher` instead of spawning processes
//! itself. Launching is split in two steps so that spawn failures can be
//! returned synchronously from `submit` while everything that waits happens
//! in the runner's own task:
//!
//! 1. [`JobLauncher::spawn`] starts the process (or fails with a
//!    [`LaunchError`]) without waiting on it.
//! 2. [`JobLauncher::run`] hands the started process to a runner task.
//!
//! - `ProcessLauncher` is the production implementation.
//! - Tests can provide their own launcher that, for example, replays scripted
//!   output and statuses without spawning anything.

use tokio::sync::oneshot;

use crate::errors::LaunchError;
use crate::job::JobDescriptor;

use super::task_runner::{JobContext, RunnerOptions, SpawnedProcess, run_job, spawn_process};

/// Trait abstracting how accepted jobs are started and driven.
pub trait JobLauncher: Send {
    /// Whatever `spawn` produced and `run` consumes.
    type Process: Send + 'static;

    /// Start the job. Must return without waiting on the job.
    fn spawn(&mut self, descriptor: &JobDescriptor) -> Result<Self::Process, LaunchError>;

    /// Drive a started job in its own task until it finishes.
    ///
    /// The implementation must append every line of the job before calling
    /// [`JobContext::finish`] exactly once, and must treat a message on
    /// `cancel` as a request to terminate the job with `Cancelled`.
    fn run(&mut self, process: Self::Process, ctx: JobContext, cancel: oneshot::Receiver<()>);
}

/// Launcher that runs real OS processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    options: RunnerOptions,
}

impl ProcessLauncher {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RunnerOptions {
        self.options
    }
}

impl JobLauncher for ProcessLauncher {
    type Process = SpawnedProcess;

    fn spawn(&mut self, descriptor: &JobDescriptor) -> Result<SpawnedProcess, LaunchError> {
        spawn_process(descriptor)
    }

    fn run(&mut self, process: SpawnedProcess, ctx: JobContext, cancel: oneshot::Receiver<()>) {
        let options = self.options;
        tokio::spawn(run_job(ctx, process, cancel, options));
    }
}
