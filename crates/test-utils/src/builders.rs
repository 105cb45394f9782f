#![allow(dead_code)]

use std::path::{Path, PathBuf};

use jobdeck::config::{ConfigFile, RawConfigFile};
use jobdeck::job::{JobClass, JobDescriptor};
use jobdeck::types::{BusyBehaviour, ConcurrencyPolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn project_root(mut self, root: &Path) -> Self {
        self.config.console.project_root = root.to_path_buf();
        self
    }

    pub fn python(mut self, python: &str) -> Self {
        self.config.console.python = python.to_string();
        self
    }

    pub fn announce(mut self, val: bool) -> Self {
        self.config.console.announce = val;
        self
    }

    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.config.console.log_capacity = Some(capacity);
        self
    }

    pub fn single_flight(mut self, on_busy: BusyBehaviour) -> Self {
        self.config.supervisor.policy = ConcurrencyPolicy::SingleFlight;
        self.config.supervisor.on_busy = on_busy;
        self
    }

    pub fn queue_length(mut self, len: usize) -> Self {
        self.config.supervisor.queue_length = len;
        self
    }

    pub fn dataset_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.config.dataset.script = script.into();
        self
    }

    pub fn dataset_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.config.dataset.prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn training_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.config.training.script = script.into();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobDescriptor`.
pub struct DescriptorBuilder {
    class: JobClass,
    argv: Vec<String>,
    workdir: Option<PathBuf>,
}

impl DescriptorBuilder {
    pub fn new(class: JobClass) -> Self {
        Self {
            class,
            argv: Vec::new(),
            workdir: None,
        }
    }

    /// `sh -c <script>`.
    pub fn sh(class: JobClass, script: &str) -> Self {
        Self::new(class).arg("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.argv.push(arg.to_string());
        self
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.workdir = Some(dir.to_path_buf());
        self
    }

    pub fn build(self) -> JobDescriptor {
        let descriptor = JobDescriptor::new(self.class, self.argv);
        match self.workdir {
            Some(dir) => descriptor.in_dir(dir),
            None => descriptor,
        }
    }
}

/// `sh -c <script>` descriptor of class `class`.
pub fn sh_job(class: &str, script: &str) -> JobDescriptor {
    DescriptorBuilder::sh(JobClass::new(class), script).build()
}
