// src/job/descriptor.rs

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

/// Caller-supplied tag used for completion routing and single-flight slots.
///
/// The class is declared at submission time; nothing ever infers it from the
/// command text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobClass(Cow<'static, str>);

impl JobClass {
    pub const DATASET: &'static str = "dataset";
    pub const TRAINING: &'static str = "training";

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn dataset_generation() -> Self {
        Self(Cow::Borrowed(Self::DATASET))
    }

    pub fn training() -> Self {
        Self(Cow::Borrowed(Self::TRAINING))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable description of one launch: class, argv, optional working
/// directory and extra environment variables.
///
/// The descriptor does not validate anything; `Supervisor::submit` rejects an
/// empty argv or a missing working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    class: JobClass,
    argv: Vec<String>,
    workdir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl JobDescriptor {
    pub fn new<I, S>(class: JobClass, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class,
            argv: argv.into_iter().map(Into::into).collect(),
            workdir: None,
            envs: Vec::new(),
        }
    }

    /// Run the command inside `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Set an environment variable for the process (on top of the inherited
    /// environment).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn class(&self) -> &JobClass {
        &self.class
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    /// Space-joined argv, for banners and logs.
    pub fn display_command(&self) -> String {
        self.argv.join(" ")
    }
}
