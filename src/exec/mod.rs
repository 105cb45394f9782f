// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running job commands, using
//! `tokio::process::Command`, streaming their output into the log sink and
//! reporting back to the supervisor with a `Completion`.
//!
//! - [`lines`] turns raw output bytes into lines (lossy UTF-8, `\n`, `\r\n`
//!   and `\r` terminators).
//! - [`task_runner`] spawns one process and drives it to a terminal status.
//! - [`backend`] provides the `JobLauncher` trait and the concrete
//!   `ProcessLauncher` that the supervisor uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod lines;
pub mod task_runner;

pub use backend::{JobLauncher, ProcessLauncher};
pub use lines::{LineDecoder, split_lines};
pub use task_runner::{JobContext, RunnerOptions, SpawnedProcess, spawn_process, validate_descriptor};
