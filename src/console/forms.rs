// src/console/forms.rs

//! The two launch forms and the argv they build.
//!
//! A form holds the current field values (seeded from config, edited with
//! `key=value` assignments) and turns them into a [`JobDescriptor`] after the
//! pre-launch checks pass. Nothing here spawns anything.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{ConfigFile, DatasetSection, TrainingSection};
use crate::errors::FormError;
use crate::job::{JobClass, JobDescriptor};
use crate::types::{Balance, Distribution, LongtailType, Partition};

/// Algorithms the training entry point understands.
pub const ALGORITHMS: &[&str] = &[
    "CReFF", "CLIP2FL", "CCVR", "RUCR", "FedETF", "FedLoGe", "FedNH", "FedIC", "FedGraB", "FedAvg",
    "FedProx",
];

/// Suggested models. Other names are passed through as typed.
pub const MODELS: &[&str] = &["ResNet8", "ResNet18", "ResNet20", "ResNet34", "CNN", "MobileNet"];

/// Interpreter and script locations, resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolePaths {
    pub python: String,
    pub project_root: PathBuf,
    pub dataset_script: PathBuf,
    pub dataset_dir: PathBuf,
    pub training_workdir: PathBuf,
    pub training_script: PathBuf,
}

impl ConsolePaths {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let root = cfg.console().project_root.clone();
        Self {
            python: cfg.console().python.clone(),
            dataset_script: cfg.dataset().script.clone(),
            dataset_dir: root.join(&cfg.dataset().dir),
            training_workdir: root.join(&cfg.training().workdir),
            training_script: cfg.training().script.clone(),
            project_root: root,
        }
    }
}

/// Split `key=value` tokens. Keys are lowercased and `-` becomes `_`.
pub fn parse_assignments<'a, I>(tokens: I) -> Result<Vec<(String, String)>, FormError>
where
    I: IntoIterator<Item = &'a str>,
{
    tokens
        .into_iter()
        .map(|token| match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((
                key.trim().to_lowercase().replace('-', "_"),
                value.trim().to_string(),
            )),
            _ => Err(FormError::InvalidField {
                field: token.to_string(),
                reason: "expected key=value".to_string(),
            }),
        })
        .collect()
}

fn parse_field<T>(field: &str, value: &str) -> Result<T, FormError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| FormError::InvalidField {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

fn parse_positive<T>(field: &str, value: &str) -> Result<T, FormError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let parsed: T = parse_field(field, value)?;
    if parsed <= T::default() {
        return Err(FormError::InvalidField {
            field: field.to_string(),
            reason: format!("must be greater than zero (got {value})"),
        });
    }
    Ok(parsed)
}

fn parse_switch(field: &str, value: &str) -> Result<bool, FormError> {
    match value.to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" | "longtail" => Ok(true),
        "false" | "off" | "no" | "0" | "normal" => Ok(false),
        other => Err(FormError::InvalidField {
            field: field.to_string(),
            reason: format!("expected on/off (got {other})"),
        }),
    }
}

fn require_script(path: PathBuf) -> Result<PathBuf, FormError> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(FormError::MissingScript(path))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Parameters of the dataset generator.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetForm {
    pub distribution: Distribution,
    pub balance: Balance,
    pub partition: Partition,
    pub longtail: bool,
    pub longtail_type: LongtailType,
    pub imbalance_factor: u32,
    pub alpha: f64,
    pub num_clients: u32,
}

impl Default for DatasetForm {
    fn default() -> Self {
        Self::from_section(&DatasetSection::default())
    }
}

impl DatasetForm {
    pub fn from_section(section: &DatasetSection) -> Self {
        Self {
            distribution: section.distribution,
            balance: section.balance,
            partition: section.partition,
            longtail: section.longtail,
            longtail_type: section.longtail_type,
            imbalance_factor: section.imbalance_factor,
            alpha: section.alpha,
            num_clients: section.num_clients,
        }
    }

    /// Set one field. Short aliases (`dist`, `if`, `type`, `clients`) are
    /// accepted.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), FormError> {
        match key {
            "distribution" | "dist" => self.distribution = parse_field(key, value)?,
            "balance" => self.balance = parse_field(key, value)?,
            "partition" => self.partition = parse_field(key, value)?,
            "longtail" => self.longtail = parse_switch(key, value)?,
            "longtail_type" | "type" => self.longtail_type = parse_field(key, value)?,
            "imbalance_factor" | "if" => self.imbalance_factor = parse_positive(key, value)?,
            "alpha" => {
                let alpha: f64 = parse_positive(key, value)?;
                if !alpha.is_finite() {
                    return Err(FormError::InvalidField {
                        field: key.to_string(),
                        reason: format!("must be finite (got {value})"),
                    });
                }
                self.alpha = alpha;
            }
            "num_clients" | "clients" => self.num_clients = parse_positive(key, value)?,
            other => return Err(FormError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Positional arguments after the script path.
    ///
    /// The three long-tail values are present only when `longtail` is on.
    pub fn script_args(&self) -> Vec<String> {
        let mut args = vec![
            self.distribution.as_arg().to_string(),
            self.balance.as_arg().to_string(),
            self.partition.as_arg().to_string(),
        ];
        if self.longtail {
            args.push("longtail".to_string());
            args.push(self.longtail_type.as_arg().to_string());
            args.push(self.imbalance_factor.to_string());
        }
        args.push(self.alpha.to_string());
        args.push(self.num_clients.to_string());
        args
    }

    /// Descriptor without any filesystem check.
    pub fn descriptor(&self, paths: &ConsolePaths) -> JobDescriptor {
        let argv = [paths.python.clone(), path_arg(&paths.dataset_script)]
            .into_iter()
            .chain(self.script_args());
        JobDescriptor::new(JobClass::dataset_generation(), argv)
            .in_dir(&paths.project_root)
            .with_env("PYTHONUNBUFFERED", "1")
    }

    /// Check the generator script exists, then build the descriptor.
    pub fn build(&self, paths: &ConsolePaths) -> Result<JobDescriptor, FormError> {
        require_script(paths.project_root.join(&paths.dataset_script))?;
        Ok(self.descriptor(paths))
    }
}

impl fmt::Display for DatasetForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  distribution     = {}", self.distribution.as_arg())?;
        writeln!(f, "  balance          = {}", self.balance.as_arg())?;
        writeln!(f, "  partition        = {}", self.partition.as_arg())?;
        writeln!(f, "  longtail         = {}", if self.longtail { "on" } else { "off" })?;
        writeln!(f, "  longtail_type    = {}", self.longtail_type.as_arg())?;
        writeln!(f, "  imbalance_factor = {}", self.imbalance_factor)?;
        writeln!(f, "  alpha            = {}", self.alpha)?;
        write!(f, "  num_clients      = {}", self.num_clients)
    }
}

/// Parameters of a training run. The dataset comes from the catalog
/// selection, not from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingForm {
    pub algorithm: String,
    pub model: String,
    pub global_rounds: u32,
    pub device_id: u32,
}

impl Default for TrainingForm {
    fn default() -> Self {
        Self::from_section(&TrainingSection::default())
    }
}

impl TrainingForm {
    pub fn from_section(section: &TrainingSection) -> Self {
        Self {
            algorithm: section.algorithm.clone(),
            model: section.model.clone(),
            global_rounds: section.global_rounds,
            device_id: section.device_id,
        }
    }

    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), FormError> {
        match key {
            "algorithm" | "algo" => {
                let known = ALGORITHMS
                    .iter()
                    .find(|name| name.eq_ignore_ascii_case(value))
                    .ok_or_else(|| FormError::InvalidField {
                        field: key.to_string(),
                        reason: format!("unknown algorithm {value} (one of {})", ALGORITHMS.join(", ")),
                    })?;
                self.algorithm = (*known).to_string();
            }
            "model" | "m" => {
                if value.is_empty() {
                    return Err(FormError::InvalidField {
                        field: key.to_string(),
                        reason: "must not be empty".to_string(),
                    });
                }
                self.model = value.to_string();
            }
            "global_rounds" | "gr" => self.global_rounds = parse_positive(key, value)?,
            "device_id" | "did" => self.device_id = parse_field(key, value)?,
            other => return Err(FormError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Flag arguments after the script path.
    pub fn script_args(&self, dataset: &str) -> Vec<String> {
        vec![
            "-data".to_string(),
            dataset.to_string(),
            "-algo".to_string(),
            self.algorithm.clone(),
            "-m".to_string(),
            self.model.clone(),
            "-gr".to_string(),
            self.global_rounds.to_string(),
            "-did".to_string(),
            self.device_id.to_string(),
        ]
    }

    pub fn descriptor(&self, paths: &ConsolePaths, dataset: &str) -> JobDescriptor {
        let argv = [paths.python.clone(), path_arg(&paths.training_script)]
            .into_iter()
            .chain(self.script_args(dataset));
        JobDescriptor::new(JobClass::training(), argv)
            .in_dir(&paths.training_workdir)
            .with_env("PYTHONUNBUFFERED", "1")
    }

    /// Check the entry point exists and a dataset is selected, then build the
    /// descriptor.
    pub fn build(
        &self,
        paths: &ConsolePaths,
        dataset: Option<&str>,
    ) -> Result<JobDescriptor, FormError> {
        require_script(paths.training_workdir.join(&paths.training_script))?;
        let dataset = dataset
            .filter(|name| !name.is_empty())
            .ok_or(FormError::NoDatasetSelected)?;
        Ok(self.descriptor(paths, dataset))
    }
}

impl fmt::Display for TrainingForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  algorithm     = {}", self.algorithm)?;
        writeln!(f, "  model         = {}", self.model)?;
        writeln!(f, "  global_rounds = {}", self.global_rounds)?;
        write!(f, "  device_id     = {}", self.device_id)
    }
}
