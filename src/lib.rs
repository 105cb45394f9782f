// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod errors;
pub mod exec;
pub mod job;
pub mod logging;
pub mod sink;
pub mod supervisor;
pub mod types;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_and_validate, load_or_default};
use crate::console::{Console, ConsolePaths, DatasetForm, TrainingForm, run_console};
use crate::exec::{ProcessLauncher, RunnerOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the process launcher and its runner options
/// - the console loop over stdin / stdout
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let path = default_config_path();
            load_or_default(&path)
                .with_context(|| format!("loading config {}", path.display()))?
        }
    };

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let launcher = ProcessLauncher::new(RunnerOptions {
        announce: cfg.console().announce,
        drain_grace: cfg.supervisor().drain_grace(),
    });
    let mut console = Console::new(&cfg, launcher);
    info!(policy = ?console.supervisor().policy(), "console starting");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_console(&mut console, stdin, &mut stdout).await
}

/// Print the resolved settings and the two commands the forms would run.
fn print_dry_run(cfg: &ConfigFile) {
    let paths = ConsolePaths::from_config(cfg);
    let sup = cfg.supervisor();

    println!("jobdeck dry-run");
    println!("  python       = {}", paths.python);
    println!("  project_root = {}", paths.project_root.display());
    println!(
        "  supervisor   = {} (on_busy = {}, queue_length = {})",
        sup.policy, sup.on_busy, sup.queue_length
    );
    match cfg.console().log_capacity {
        Some(cap) => println!("  log          = last {cap} lines"),
        None => println!("  log          = unbounded"),
    }
    println!();

    let dataset = DatasetForm::from_section(cfg.dataset()).descriptor(&paths);
    println!("dataset:");
    println!("  cwd: {}", paths.project_root.display());
    println!("  cmd: {}", dataset.display_command());

    let training = TrainingForm::from_section(cfg.training()).descriptor(&paths, "<dataset>");
    println!("training:");
    println!("  cwd: {}", paths.training_workdir.display());
    println!("  cmd: {}", training.display_command());

    debug!("dry-run complete (no execution)");
}
