// src/supervisor/core.rs

//! Pure admission state machine.
//!
//! This decides, for each submission, whether it starts now, waits in its
//! class queue, or is rejected, and which queued job starts when a class
//! slot frees up. It has no channels, no Tokio types and performs no IO, so
//! the policy can be tested on its own.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::errors::LaunchError;
use crate::job::{JobClass, JobId};
use crate::supervisor::queue::ClassQueues;
use crate::types::{BusyBehaviour, ConcurrencyPolicy};

/// Concurrency settings of a supervisor.
///
/// The default is unrestricted: every submission starts independently.
/// Single-flight is opt-in and is the only place a per-class limit exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    pub concurrency: ConcurrencyPolicy,
    pub on_busy: BusyBehaviour,
    /// Waiting jobs per class when `on_busy = Queue`.
    pub queue_length: usize,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyPolicy::Unrestricted,
            on_busy: BusyBehaviour::Reject,
            queue_length: 1,
        }
    }
}

impl SupervisorPolicy {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn single_flight(on_busy: BusyBehaviour) -> Self {
        Self {
            concurrency: ConcurrencyPolicy::SingleFlight,
            on_busy,
            ..Self::default()
        }
    }

    pub fn with_queue_length(mut self, queue_length: usize) -> Self {
        self.queue_length = queue_length;
        self
    }
}

/// Decision for one submission.
#[derive(Debug)]
pub enum Admission {
    /// Spawn now.
    Start,
    /// Recorded in the class queue; spawn later.
    Enqueue,
    Reject(LaunchError),
}

#[derive(Debug)]
pub struct AdmissionCore {
    policy: SupervisorPolicy,
    running: HashMap<JobClass, HashSet<JobId>>,
    queues: ClassQueues,
}

impl AdmissionCore {
    pub fn new(policy: SupervisorPolicy) -> Self {
        Self {
            policy,
            running: HashMap::new(),
            queues: ClassQueues::new(policy.queue_length),
        }
    }

    pub fn policy(&self) -> SupervisorPolicy {
        self.policy
    }

    pub fn is_running(&self, class: &JobClass) -> bool {
        self.running.get(class).is_some_and(|ids| !ids.is_empty())
    }

    /// Decide what to do with a new submission of `class`.
    ///
    /// `Enqueue` already recorded `id` in the class queue; `Start` records
    /// nothing until [`AdmissionCore::started`] confirms the spawn.
    pub fn admit(&mut self, class: &JobClass, id: JobId) -> Admission {
        if self.policy.concurrency == ConcurrencyPolicy::Unrestricted {
            return Admission::Start;
        }

        // Single-flight: a free slot with waiting jobs cannot happen, because
        // the queue is drained whenever a slot frees up.
        if !self.is_running(class) {
            return Admission::Start;
        }

        match self.policy.on_busy {
            BusyBehaviour::Reject => {
                debug!(%class, job = %id, "single-flight: class busy; rejecting");
                Admission::Reject(LaunchError::Busy {
                    class: class.clone(),
                })
            }
            BusyBehaviour::Queue => {
                if self.queues.push(class, id) {
                    Admission::Enqueue
                } else {
                    Admission::Reject(LaunchError::QueueFull {
                        class: class.clone(),
                    })
                }
            }
        }
    }

    /// The job's process was spawned.
    pub fn started(&mut self, class: &JobClass, id: JobId) {
        self.running.entry(class.clone()).or_default().insert(id);
    }

    /// The job reached a terminal status (running or not).
    pub fn finished(&mut self, class: &JobClass, id: JobId) {
        if let Some(ids) = self.running.get_mut(class) {
            ids.remove(&id);
            if ids.is_empty() {
                self.running.remove(class);
            }
        }
        self.queues.remove(class, id);
    }

    /// Next queued job of `class` that may start now, if any.
    pub fn pop_ready(&mut self, class: &JobClass) -> Option<JobId> {
        if self.is_running(class) {
            return None;
        }
        self.queues.pop(class)
    }

    /// Remove a waiting job (cancellation). Returns false if it was not queued.
    pub fn dequeue(&mut self, class: &JobClass, id: JobId) -> bool {
        self.queues.remove(class, id)
    }
}
