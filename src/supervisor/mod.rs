// src/supervisor/mod.rs

//! Job supervision.
//!
//! The supervisor accepts job descriptors, starts them through a
//! [`JobLauncher`](crate::exec::JobLauncher), and routes each completion to
//! the callbacks whose rule matches it.
//!
//! The pure admission state machine lives in [`core`] (with the per-class
//! wait queues in [`queue`]); completion routing lives in [`rules`]; the
//! async shell that owns the job table is implemented in [`runtime`].

pub mod core;
pub mod queue;
pub mod rules;
pub mod runtime;

pub use self::core::{Admission, AdmissionCore, SupervisorPolicy};
pub use queue::ClassQueues;
pub use rules::{CallbackId, CompletionRule, OutcomeFilter};
pub use runtime::{JobSummary, Supervisor};
