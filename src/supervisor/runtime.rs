// src/supervisor/runtime.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::LaunchError;
use crate::exec::{JobContext, JobLauncher, validate_descriptor};
use crate::job::{
    Completion, JobClass, JobDescriptor, JobHandle, JobId, JobStatus, StatusSender, status_channel,
};
use crate::sink::{LineSource, LogSink};

use super::core::{Admission, AdmissionCore, SupervisorPolicy};
use super::rules::{CallbackId, CallbackRegistry, CompletionRule};

/// Where an accepted job is in its life, from the supervisor's side.
enum Slot {
    /// Waiting for its class slot; the supervisor still owns the status
    /// writer.
    Queued(StatusSender),
    /// Handed to a runner. `cancel` is taken once cancellation was requested.
    Running { cancel: Option<oneshot::Sender<()>> },
    /// Completion already sent, waiting to be dispatched.
    Finishing,
}

struct ActiveJob {
    descriptor: Arc<JobDescriptor>,
    submitted_at: SystemTime,
    status_rx: watch::Receiver<JobStatus>,
    slot: Slot,
}

/// Read-only view of an accepted, not yet dispatched job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: JobId,
    pub class: JobClass,
    pub status: JobStatus,
    pub command: String,
    pub submitted_at: SystemTime,
}

/// Accepts submissions, enforces the concurrency policy and dispatches
/// completions to registered callbacks.
///
/// The supervisor is owned by the coordinating context and is never shared:
/// runners only hold a sender for completions. Every change to the job table
/// and every callback happens inside `submit`, `cancel`, `dispatch_next` or
/// `dispatch_pending`, i.e. on the owner's context.
pub struct Supervisor<L: JobLauncher> {
    core: AdmissionCore,
    launcher: L,
    sink: LogSink,
    jobs: BTreeMap<JobId, ActiveJob>,
    callbacks: CallbackRegistry,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    next_id: u64,
}

impl<L: JobLauncher> fmt::Debug for Supervisor<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("core", &self.core)
            .field("active", &self.jobs.len())
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

impl<L: JobLauncher> Supervisor<L> {
    pub fn new(policy: SupervisorPolicy, launcher: L, sink: LogSink) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        info!(
            concurrency = %policy.concurrency,
            on_busy = ?policy.on_busy,
            queue_length = policy.queue_length,
            "supervisor created"
        );
        Self {
            core: AdmissionCore::new(policy),
            launcher,
            sink,
            jobs: BTreeMap::new(),
            callbacks: CallbackRegistry::default(),
            completions_tx,
            completions_rx,
            next_id: 1,
        }
    }

    pub fn policy(&self) -> SupervisorPolicy {
        self.core.policy()
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Register a callback for completions matching `rule`.
    pub fn register<F>(&mut self, rule: CompletionRule, callback: F) -> CallbackId
    where
        F: FnMut(&Completion) + Send + 'static,
    {
        debug!(%rule, "registering completion callback");
        self.callbacks.register(rule, Box::new(callback))
    }

    pub fn unregister(&mut self, id: CallbackId) -> bool {
        self.callbacks.unregister(id)
    }

    /// Submit a job.
    ///
    /// Returns without waiting on the job. On `Err` nothing was created: no
    /// handle, no table entry, no sink line.
    pub fn submit(&mut self, descriptor: JobDescriptor) -> Result<JobHandle, LaunchError> {
        validate_descriptor(&descriptor)?;

        let class = descriptor.class().clone();
        let id = JobId(self.next_id);

        match self.core.admit(&class, id) {
            Admission::Reject(err) => {
                warn!(%class, error = %err, "submission rejected by policy");
                Err(err)
            }
            Admission::Enqueue => {
                self.next_id += 1;
                let (status, status_rx) = status_channel(JobStatus::Queued);
                let handle = self.track(id, Arc::new(descriptor), status_rx, Slot::Queued(status));
                info!(job = %id, %class, "job queued behind running job of the same class");
                Ok(handle)
            }
            Admission::Start => {
                let process = self.launcher.spawn(&descriptor).inspect_err(|err| {
                    warn!(%class, error = %err, "job launch failed");
                })?;
                self.next_id += 1;
                let descriptor = Arc::new(descriptor);
                let (status, status_rx) = status_channel(JobStatus::Running);
                let handle = self.track(id, Arc::clone(&descriptor), status_rx, Slot::Finishing);
                let cancel = self.start(id, descriptor, process, status);
                if let Some(job) = self.jobs.get_mut(&id) {
                    job.slot = Slot::Running {
                        cancel: Some(cancel),
                    };
                }
                Ok(handle)
            }
        }
    }

    fn track(
        &mut self,
        id: JobId,
        descriptor: Arc<JobDescriptor>,
        status_rx: watch::Receiver<JobStatus>,
        slot: Slot,
    ) -> JobHandle {
        let submitted_at = SystemTime::now();
        let handle = JobHandle::new(
            id,
            descriptor.class().clone(),
            submitted_at,
            status_rx.clone(),
        );
        self.jobs.insert(
            id,
            ActiveJob {
                descriptor,
                submitted_at,
                status_rx,
                slot,
            },
        );
        handle
    }

    fn start(
        &mut self,
        id: JobId,
        descriptor: Arc<JobDescriptor>,
        process: L::Process,
        status: StatusSender,
    ) -> oneshot::Sender<()> {
        status.set(JobStatus::Running);
        self.core.started(descriptor.class(), id);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let ctx = self.context(id, descriptor, status);
        self.launcher.run(process, ctx, cancel_rx);
        cancel_tx
    }

    /// Request cancellation.
    ///
    /// - Running job: the runner kills the process and finishes with
    ///   `Cancelled`.
    /// - Queued job: removed from its queue and finished with `Cancelled`.
    ///
    /// Returns false for unknown ids, jobs already finishing, and repeated
    /// requests.
    pub fn cancel(&mut self, id: JobId) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        match std::mem::replace(&mut job.slot, Slot::Finishing) {
            Slot::Running { cancel } => {
                let sent = cancel.is_some_and(|tx| tx.send(()).is_ok());
                job.slot = Slot::Running { cancel: None };
                info!(job = %id, sent, "cancellation requested");
                sent
            }
            Slot::Queued(status) => {
                let descriptor = Arc::clone(&job.descriptor);
                self.core.dequeue(descriptor.class(), id);
                info!(job = %id, "queued job cancelled");
                self.context(id, descriptor, status)
                    .finish(JobStatus::Cancelled);
                true
            }
            Slot::Finishing => false,
        }
    }

    /// Cancel every accepted job. Returns how many requests were made.
    pub fn cancel_all(&mut self) -> usize {
        let ids: Vec<JobId> = self.jobs.keys().copied().collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    fn context(&self, id: JobId, descriptor: Arc<JobDescriptor>, status: StatusSender) -> JobContext {
        JobContext {
            id,
            descriptor,
            status,
            sink: self.sink.clone(),
            completions: self.completions_tx.clone(),
        }
    }

    /// Wait for the next completion and dispatch it.
    ///
    /// Cancel-safe: if the future is dropped before a completion arrived,
    /// nothing was consumed. Pends forever while no job is active.
    pub async fn dispatch_next(&mut self) -> Option<Completion> {
        let completion = self.completions_rx.recv().await?;
        Some(self.handle_completion(completion))
    }

    /// Dispatch every completion that already arrived, without waiting.
    pub fn dispatch_pending(&mut self) -> Vec<Completion> {
        let mut dispatched = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            dispatched.push(self.handle_completion(completion));
        }
        dispatched
    }

    /// Dispatch completions until no accepted job is left.
    pub async fn wait_idle(&mut self) -> Vec<Completion> {
        let mut dispatched = Vec::new();
        while !self.is_idle() {
            match self.dispatch_next().await {
                Some(completion) => dispatched.push(completion),
                None => break,
            }
        }
        dispatched
    }

    fn handle_completion(&mut self, completion: Completion) -> Completion {
        let id = completion.id;
        let class = completion.class.clone();

        self.jobs.remove(&id);
        self.core.finished(&class, id);

        info!(
            job = %id,
            %class,
            status = %completion.status,
            seq = completion.seq,
            "dispatching completion"
        );

        let invoked = self.callbacks.dispatch(&completion);
        debug!(job = %id, invoked, "completion callbacks done");

        self.start_queued(&class);
        completion
    }

    /// Start the next queued job of `class` if its slot is free. A queued
    /// job that cannot be spawned finishes as `Errored` and the next one is
    /// tried, so a free slot never coexists with waiting jobs.
    fn start_queued(&mut self, class: &JobClass) {
        while let Some(id) = self.core.pop_ready(class) {
            let (descriptor, status) = match self.jobs.get_mut(&id) {
                Some(job) => match std::mem::replace(&mut job.slot, Slot::Finishing) {
                    Slot::Queued(status) => (Arc::clone(&job.descriptor), status),
                    other => {
                        job.slot = other;
                        continue;
                    }
                },
                None => continue,
            };

            match self.launcher.spawn(&descriptor) {
                Ok(process) => {
                    info!(job = %id, %class, "starting queued job");
                    let cancel = self.start(id, descriptor, process, status);
                    if let Some(job) = self.jobs.get_mut(&id) {
                        job.slot = Slot::Running {
                            cancel: Some(cancel),
                        };
                    }
                    return;
                }
                Err(err) => {
                    warn!(job = %id, %class, error = %err, "queued job failed to launch");
                    self.sink
                        .append(id, LineSource::Notice, format!(">>> error: {err}"));
                    self.context(id, descriptor, status)
                        .finish(JobStatus::Errored(err.to_string()));
                }
            }
        }
    }

    /// True when every accepted job was dispatched.
    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }

    /// Accepted jobs that were not dispatched yet, by id.
    pub fn active(&self) -> Vec<JobSummary> {
        self.jobs
            .iter()
            .map(|(id, job)| JobSummary {
                id: *id,
                class: job.descriptor.class().clone(),
                status: job.status_rx.borrow().clone(),
                command: job.descriptor.display_command(),
                submitted_at: job.submitted_at,
            })
            .collect()
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs.get(&id).map(|job| job.status_rx.borrow().clone())
    }
}
