// src/supervisor/queue.rs

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::job::{JobClass, JobId};

/// Per-class FIFO of accepted jobs waiting for their single-flight slot.
///
/// Semantics:
/// - Each class has its own queue; classes never wait on each other.
/// - `max_per_class` bounds each queue. A push into a full queue is refused
///   (the caller rejects the submission), nothing already queued is dropped.
/// - Jobs leave a queue either when their class slot frees up (`pop`) or
///   when they are cancelled while waiting (`remove`).
#[derive(Debug)]
pub struct ClassQueues {
    max_per_class: usize,
    queues: HashMap<JobClass, VecDeque<JobId>>,
}

impl ClassQueues {
    /// `max_per_class` is clamped to at least 1.
    pub fn new(max_per_class: usize) -> Self {
        Self {
            max_per_class: max_per_class.max(1),
            queues: HashMap::new(),
        }
    }

    pub fn max_per_class(&self) -> usize {
        self.max_per_class
    }

    /// Returns false if the class queue is full.
    pub fn push(&mut self, class: &JobClass, id: JobId) -> bool {
        let queue = self.queues.entry(class.clone()).or_default();
        if queue.len() >= self.max_per_class {
            debug!(%class, job = %id, len = queue.len(), "class queue full");
            return false;
        }
        queue.push_back(id);
        debug!(%class, job = %id, position = queue.len(), "job queued");
        true
    }

    pub fn pop(&mut self, class: &JobClass) -> Option<JobId> {
        let queue = self.queues.get_mut(class)?;
        let id = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(class);
        }
        id
    }

    /// Remove a specific waiting job. Returns false if it was not queued.
    pub fn remove(&mut self, class: &JobClass, id: JobId) -> bool {
        let Some(queue) = self.queues.get_mut(class) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|queued| *queued != id);
        let removed = queue.len() != before;
        if queue.is_empty() {
            self.queues.remove(class);
        }
        removed
    }
}
