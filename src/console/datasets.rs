// src/console/datasets.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::errors::FormError;

/// Result of scanning the dataset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetScan {
    /// Sorted dataset names (possibly empty).
    Listed(Vec<String>),
    /// The directory itself does not exist.
    MissingDir,
}

impl DatasetScan {
    pub fn names(&self) -> &[String] {
        match self {
            DatasetScan::Listed(names) => names,
            DatasetScan::MissingDir => &[],
        }
    }
}

/// Names of the subdirectories of `dir` that start with one of `prefixes`,
/// sorted.
pub fn scan_datasets(dir: &Path, prefixes: &[String]) -> io::Result<DatasetScan> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DatasetScan::MissingDir),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            names.push(name);
        }
    }
    names.sort();
    Ok(DatasetScan::Listed(names))
}

/// Last scan plus the current selection.
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    dir: PathBuf,
    prefixes: Vec<String>,
    scan: DatasetScan,
    selected: Option<String>,
}

impl DatasetCatalog {
    pub fn new(dir: impl Into<PathBuf>, prefixes: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            prefixes,
            scan: DatasetScan::Listed(Vec::new()),
            selected: None,
        }
    }

    /// Re-scan. The selection is kept if it still exists, otherwise the
    /// first dataset is selected.
    pub fn refresh(&mut self) -> io::Result<&DatasetScan> {
        self.scan = scan_datasets(&self.dir, &self.prefixes)?;
        let names = self.scan.names();
        let keep = self
            .selected
            .as_ref()
            .is_some_and(|current| names.contains(current));
        if !keep {
            self.selected = names.first().cloned();
        }
        info!(
            dir = %self.dir.display(),
            found = names.len(),
            selected = ?self.selected,
            "dataset list refreshed"
        );
        Ok(&self.scan)
    }

    pub fn select(&mut self, name: &str) -> Result<(), FormError> {
        if !self.scan.names().iter().any(|n| n == name) {
            return Err(FormError::InvalidField {
                field: "dataset".to_string(),
                reason: format!("{name} is not in {} (try `refresh`)", self.dir.display()),
            });
        }
        debug!(dataset = name, "dataset selected");
        self.selected = Some(name.to_string());
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn scan(&self) -> &DatasetScan {
        &self.scan
    }

    pub fn names(&self) -> &[String] {
        self.scan.names()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Catalog shared between the console and the refresh callback.
#[derive(Debug, Clone)]
pub struct SharedCatalog(Arc<Mutex<DatasetCatalog>>);

impl SharedCatalog {
    pub fn new(catalog: DatasetCatalog) -> Self {
        Self(Arc::new(Mutex::new(catalog)))
    }

    pub fn lock(&self) -> MutexGuard<'_, DatasetCatalog> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
