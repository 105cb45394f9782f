// src/job/handle.rs

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;

use super::{JobClass, JobDescriptor, JobId, JobStatus};

/// Writing side of a job's status.
///
/// Exactly one exists per job. The supervisor holds it while the job is
/// queued and moves it into the runner at launch, so the runner is the only
/// writer while the process lives.
#[derive(Debug)]
pub struct StatusSender(watch::Sender<JobStatus>);

impl StatusSender {
    pub fn set(&self, status: JobStatus) {
        self.0.send_replace(status);
    }
}

/// Create a status channel seeded with `initial`.
pub fn status_channel(initial: JobStatus) -> (StatusSender, watch::Receiver<JobStatus>) {
    let (tx, rx) = watch::channel(initial);
    (StatusSender(tx), rx)
}

/// Tracking record returned by `Supervisor::submit`.
///
/// Cheap to clone; every clone observes the same status.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    class: JobClass,
    submitted_at: SystemTime,
    status_rx: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn new(
        id: JobId,
        class: JobClass,
        submitted_at: SystemTime,
        status_rx: watch::Receiver<JobStatus>,
    ) -> Self {
        Self {
            id,
            class,
            submitted_at,
            status_rx,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn class(&self) -> &JobClass {
        &self.class
    }

    pub fn submitted_at(&self) -> SystemTime {
        self.submitted_at
    }

    /// Latest status written by the runner.
    pub fn status(&self) -> JobStatus {
        self.status_rx.borrow().clone()
    }

    /// Wait until the job reaches a terminal status.
    ///
    /// This only observes the runner; completion callbacks still run when the
    /// coordinating context dispatches the completion.
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.status_rx.clone();
        let seen = rx.wait_for(JobStatus::is_terminal).await.map(|s| s.clone());
        match seen {
            Ok(status) => status,
            // Sender gone without a terminal status; report what we last saw.
            Err(_) => rx.borrow().clone(),
        }
    }
}

/// Terminal event for one job, dispatched on the coordinating context.
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: JobId,
    pub class: JobClass,
    pub descriptor: Arc<JobDescriptor>,
    pub status: JobStatus,
    /// Sequence number reserved from the log sink after the job's last line,
    /// so it is greater than every line sequence number of this job.
    pub seq: u64,
    pub finished_at: SystemTime,
}
