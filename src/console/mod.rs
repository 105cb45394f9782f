// src/console/mod.rs

//! Line-oriented console for the two experiment scripts.
//!
//! - [`forms`] holds the dataset-generation and training parameters and
//!   builds their job descriptors.
//! - [`datasets`] scans the dataset directory and tracks the selection.
//! - [`app`] is the interactive loop: it reads commands, renders the log and
//!   dispatches completions.

pub mod app;
pub mod datasets;
pub mod forms;

pub use app::{CancelTarget, Console, ConsoleCommand, Flow, run_console};
pub use datasets::{DatasetCatalog, DatasetScan, SharedCatalog, scan_datasets};
pub use forms::{ALGORITHMS, ConsolePaths, DatasetForm, MODELS, TrainingForm, parse_assignments};
