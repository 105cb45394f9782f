// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::console::ALGORITHMS;
use crate::errors::{JobdeckError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JobdeckError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        raw.training.algorithm = canonical_algorithm(&raw.training.algorithm)?.to_string();
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_console(cfg)?;
    validate_supervisor(cfg)?;
    validate_dataset(cfg)?;
    validate_training(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> JobdeckError {
    JobdeckError::ConfigError(msg.into())
}

fn validate_console(cfg: &RawConfigFile) -> Result<()> {
    if cfg.console.python.trim().is_empty() {
        return Err(config_error("[console].python must not be empty"));
    }
    if cfg.console.log_capacity == Some(0) {
        return Err(config_error(
            "[console].log_capacity must be >= 1 (got 0); omit it for an unbounded log",
        ));
    }
    Ok(())
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<()> {
    // policy / on_busy are strongly typed and checked during deserialization.
    if cfg.supervisor.queue_length == 0 {
        return Err(config_error("[supervisor].queue_length must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_dataset(cfg: &RawConfigFile) -> Result<()> {
    let ds = &cfg.dataset;
    if ds.prefixes.is_empty() || ds.prefixes.iter().any(|p| p.is_empty()) {
        return Err(config_error(
            "[dataset].prefixes must contain at least one non-empty prefix",
        ));
    }
    if !(ds.alpha.is_finite() && ds.alpha > 0.0) {
        return Err(config_error(format!(
            "[dataset].alpha must be a positive number (got {})",
            ds.alpha
        )));
    }
    if ds.num_clients == 0 {
        return Err(config_error("[dataset].num_clients must be >= 1 (got 0)"));
    }
    if ds.imbalance_factor == 0 {
        return Err(config_error("[dataset].imbalance_factor must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_training(cfg: &RawConfigFile) -> Result<()> {
    if cfg.training.global_rounds == 0 {
        return Err(config_error("[training].global_rounds must be >= 1 (got 0)"));
    }
    if cfg.training.model.is_empty() {
        return Err(config_error("[training].model must not be empty"));
    }
    canonical_algorithm(&cfg.training.algorithm)?;
    Ok(())
}

/// Same lookup as the training form: case-insensitive, canonical spelling.
fn canonical_algorithm(name: &str) -> Result<&'static str> {
    ALGORITHMS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            config_error(format!(
                "[training].algorithm must be one of {} (got {name:?})",
                ALGORITHMS.join(", ")
            ))
        })
}
