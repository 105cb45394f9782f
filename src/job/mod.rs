// src/job/mod.rs

//! Job data model.
//!
//! - [`descriptor`] holds the immutable description of what to run.
//! - [`handle`] holds the live tracking side: the handle returned by
//!   `Supervisor::submit` and the completion event dispatched when a job ends.

pub mod descriptor;
pub mod handle;

use std::fmt;

pub use descriptor::{JobClass, JobDescriptor};
pub use handle::{Completion, JobHandle, StatusSender, status_channel};

/// Identifier assigned by the supervisor, unique for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status of a job from submission to its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted but waiting for its class slot (single-flight + queue only).
    Queued,
    Running,
    /// Exited with code 0.
    Succeeded,
    /// Exited with a non-zero code. A process killed by a signal it did not
    /// get from cancellation reports `128 + signal`.
    Failed(i32),
    /// Something went wrong after launch (reading output, waiting for exit,
    /// or a queued launch that could not be spawned).
    Errored(String),
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed(code) => write!(f, "failed (exit code {code})"),
            JobStatus::Errored(cause) => write!(f, "errored: {cause}"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}
