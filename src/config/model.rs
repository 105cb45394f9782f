// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::supervisor::SupervisorPolicy;
use crate::types::{Balance, BusyBehaviour, ConcurrencyPolicy, Distribution, LongtailType, Partition};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [console]
/// python = "python3"
/// project_root = "."
///
/// [supervisor]
/// policy = "single_flight"
/// on_busy = "queue"
///
/// [dataset]
/// partition = "pat"
/// num_clients = 10
///
/// [training]
/// algorithm = "FedAvg"
/// ```
///
/// Every section and every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub console: ConsoleSection,

    #[serde(default)]
    pub supervisor: SupervisorSection,

    #[serde(default)]
    pub dataset: DatasetSection,

    #[serde(default)]
    pub training: TrainingSection,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holding one means the invariants hold.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    console: ConsoleSection,
    supervisor: SupervisorSection,
    dataset: DatasetSection,
    training: TrainingSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            console: raw.console,
            supervisor: raw.supervisor,
            dataset: raw.dataset,
            training: raw.training,
        }
    }

    pub fn console(&self) -> &ConsoleSection {
        &self.console
    }

    pub fn supervisor(&self) -> &SupervisorSection {
        &self.supervisor
    }

    pub fn dataset(&self) -> &DatasetSection {
        &self.dataset
    }

    pub fn training(&self) -> &TrainingSection {
        &self.training
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[console]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleSection {
    /// Interpreter used for both scripts.
    #[serde(default = "default_python")]
    pub python: String,

    /// Directory the script paths are relative to.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Append `>>>` banner lines around each job's output.
    #[serde(default = "default_true")]
    pub announce: bool,

    /// Maximum number of retained log lines; unbounded when absent.
    #[serde(default)]
    pub log_capacity: Option<usize>,
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self {
            python: default_python(),
            project_root: default_project_root(),
            announce: true,
            log_capacity: None,
        }
    }
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    #[serde(default)]
    pub policy: ConcurrencyPolicy,

    #[serde(default)]
    pub on_busy: BusyBehaviour,

    /// Waiting jobs per class under `on_busy = "queue"`.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// How long a cancelled job's remaining output is still drained.
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
}

fn default_queue_length() -> usize {
    1
}

fn default_drain_grace_ms() -> u64 {
    2000
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            policy: ConcurrencyPolicy::default(),
            on_busy: BusyBehaviour::default(),
            queue_length: default_queue_length(),
            drain_grace_ms: default_drain_grace_ms(),
        }
    }
}

impl SupervisorSection {
    pub fn policy(&self) -> SupervisorPolicy {
        SupervisorPolicy {
            concurrency: self.policy,
            on_busy: self.on_busy,
            queue_length: self.queue_length,
        }
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

/// `[dataset]` section: where the generator lives, where its output is
/// scanned, and the initial values of the generation form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSection {
    #[serde(default = "default_dataset_script")]
    pub script: PathBuf,

    /// Directory scanned for generated datasets, relative to the project root.
    #[serde(default = "default_dataset_dir")]
    pub dir: PathBuf,

    /// Only subdirectories starting with one of these count as datasets.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    #[serde(default)]
    pub distribution: Distribution,

    #[serde(default)]
    pub balance: Balance,

    #[serde(default)]
    pub partition: Partition,

    #[serde(default = "default_true")]
    pub longtail: bool,

    #[serde(default)]
    pub longtail_type: LongtailType,

    #[serde(default = "default_imbalance_factor")]
    pub imbalance_factor: u32,

    #[serde(default = "default_alpha")]
    pub alpha: f64,

    #[serde(default = "default_num_clients")]
    pub num_clients: u32,
}

fn default_dataset_script() -> PathBuf {
    Path::new("dataset").join("generate_Cifar10.py")
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_prefixes() -> Vec<String> {
    vec!["Cifar".to_string(), "MNIST".to_string()]
}

fn default_imbalance_factor() -> u32 {
    50
}

fn default_alpha() -> f64 {
    0.5
}

fn default_num_clients() -> u32 {
    20
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            script: default_dataset_script(),
            dir: default_dataset_dir(),
            prefixes: default_prefixes(),
            distribution: Distribution::default(),
            balance: Balance::default(),
            partition: Partition::default(),
            longtail: true,
            longtail_type: LongtailType::default(),
            imbalance_factor: default_imbalance_factor(),
            alpha: default_alpha(),
            num_clients: default_num_clients(),
        }
    }
}

/// `[training]` section: the training entry point and the initial values of
/// the training form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingSection {
    /// Working directory of training jobs, relative to the project root.
    #[serde(default = "default_training_workdir")]
    pub workdir: PathBuf,

    /// Script path relative to `workdir`.
    #[serde(default = "default_training_script")]
    pub script: PathBuf,

    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_global_rounds")]
    pub global_rounds: u32,

    #[serde(default)]
    pub device_id: u32,
}

fn default_training_workdir() -> PathBuf {
    PathBuf::from("system")
}

fn default_training_script() -> PathBuf {
    PathBuf::from("main.py")
}

fn default_algorithm() -> String {
    "CReFF".to_string()
}

fn default_model() -> String {
    "ResNet8".to_string()
}

fn default_global_rounds() -> u32 {
    200
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            workdir: default_training_workdir(),
            script: default_training_script(),
            algorithm: default_algorithm(),
            model: default_model(),
            global_rounds: default_global_rounds(),
            device_id: 0,
        }
    }
}
