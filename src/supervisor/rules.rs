// src/supervisor/rules.rs

//! Completion routing: declared rules and the callbacks attached to them.

use std::fmt;

use crate::job::{Completion, JobClass, JobStatus};

/// Which terminal statuses a rule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeFilter {
    Any,
    Succeeded,
    /// Failed, Errored or Cancelled.
    Unsuccessful,
}

impl OutcomeFilter {
    pub fn matches(&self, status: &JobStatus) -> bool {
        match self {
            OutcomeFilter::Any => true,
            OutcomeFilter::Succeeded => status.is_success(),
            OutcomeFilter::Unsuccessful => status.is_terminal() && !status.is_success(),
        }
    }
}

/// "class = X AND status matches Y". A rule without a class matches every
/// class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRule {
    class: Option<JobClass>,
    outcome: OutcomeFilter,
}

impl CompletionRule {
    pub fn any() -> Self {
        Self {
            class: None,
            outcome: OutcomeFilter::Any,
        }
    }

    pub fn for_class(class: JobClass) -> Self {
        Self {
            class: Some(class),
            outcome: OutcomeFilter::Any,
        }
    }

    pub fn succeeded(mut self) -> Self {
        self.outcome = OutcomeFilter::Succeeded;
        self
    }

    pub fn unsuccessful(mut self) -> Self {
        self.outcome = OutcomeFilter::Unsuccessful;
        self
    }

    pub fn matches(&self, completion: &Completion) -> bool {
        let class_ok = self
            .class
            .as_ref()
            .is_none_or(|class| *class == completion.class);
        class_ok && self.outcome.matches(&completion.status)
    }
}

impl fmt::Display for CompletionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class {
            Some(class) => write!(f, "class = {class}")?,
            None => write!(f, "class = *")?,
        }
        match self.outcome {
            OutcomeFilter::Any => write!(f, ", status = *"),
            OutcomeFilter::Succeeded => write!(f, ", status = succeeded"),
            OutcomeFilter::Unsuccessful => write!(f, ", status = unsuccessful"),
        }
    }
}

/// Hook run on the coordinating context for a matching completion.
pub type CompletionCallback = Box<dyn FnMut(&Completion) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(usize);

struct Registered {
    id: CallbackId,
    rule: CompletionRule,
    callback: CompletionCallback,
}

/// Callbacks in registration order.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: Vec<Registered>,
    next_id: usize,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.id, &e.rule)))
            .finish()
    }
}

impl CallbackRegistry {
    pub fn register(&mut self, rule: CompletionRule, callback: CompletionCallback) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.entries.push(Registered { id, rule, callback });
        id
    }

    pub fn unregister(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Run every matching callback once, in registration order. Returns how
    /// many ran.
    pub fn dispatch(&mut self, completion: &Completion) -> usize {
        let mut invoked = 0;
        for entry in self.entries.iter_mut() {
            if entry.rule.matches(completion) {
                (entry.callback)(completion);
                invoked += 1;
            }
        }
        invoked
    }
}
