// src/errors.rs

//! Crate-wide error types.
//!
//! - [`LaunchError`] is what `Supervisor::submit` rejects with. No job exists
//!   when one of these is returned.
//! - [`FormError`] covers the pre-launch checks done by the console forms.
//! - [`JobdeckError`] wraps everything else (config, IO, TOML) for the binary.
//!
//! Failures of a job that did start are never errors here; they are terminal
//! statuses (`Failed` / `Errored`) reported through the log sink and the
//! completion event.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::job::JobClass;

#[derive(Error, Debug)]
pub enum JobdeckError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Synchronous rejection of a submission.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("working directory does not exist: {0:?}")]
    MissingWorkdir(PathBuf),

    #[error("working directory is not a directory: {0:?}")]
    WorkdirNotADirectory(PathBuf),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("a '{class}' job is already running (single-flight)")]
    Busy { class: JobClass },

    #[error("queue for '{class}' jobs is full")]
    QueueFull { class: JobClass },
}

impl LaunchError {
    /// True when the rejection came from the concurrency policy rather than
    /// from the command itself.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, LaunchError::Busy { .. } | LaunchError::QueueFull { .. })
    }
}

/// Problems found by the console before anything is submitted.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("script not found: {0:?} (run jobdeck from the project root or set console.project_root)")]
    MissingScript(PathBuf),

    #[error("no dataset selected; generate one first")]
    NoDatasetSelected,

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobdeckError>;
