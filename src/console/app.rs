// src/console/app.rs

use std::io::{self, Write};
use std::str::FromStr;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::exec::JobLauncher;
use crate::job::{Completion, JobClass, JobDescriptor, JobId};
use crate::sink::{LogCursor, LogSink};
use crate::supervisor::{CompletionRule, Supervisor};

use super::datasets::{DatasetCatalog, DatasetScan, SharedCatalog};
use super::forms::{ConsolePaths, DatasetForm, TrainingForm, parse_assignments};

const HELP: &str = "\
commands:
  generate [key=value ..]  generate a dataset (keys: distribution balance partition
                           longtail longtail_type imbalance_factor alpha num_clients)
  train [key=value ..]     start training on the selected dataset (keys: algorithm
                           model global_rounds device_id, dataset=<name> selects)
  show                     print both forms
  datasets                 list generated datasets (* = selected)
  select <name>            select the dataset used by `train`
  refresh                  re-scan the dataset directory
  jobs                     list jobs that have not finished
  cancel <id>|all          cancel a job
  clear                    clear the log
  help                     this text
  quit                     cancel everything and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTarget {
    Job(JobId),
    All,
}

/// One line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Empty,
    Generate(Vec<(String, String)>),
    Train(Vec<(String, String)>),
    Show,
    Datasets,
    Select(String),
    Refresh,
    Jobs,
    Cancel(CancelTarget),
    Clear,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(ConsoleCommand::Empty);
        };
        let rest: Vec<&str> = words.collect();

        let no_args = |cmd: ConsoleCommand| {
            if rest.is_empty() {
                Ok(cmd)
            } else {
                Err(format!("`{verb}` takes no arguments"))
            }
        };

        match verb.to_lowercase().as_str() {
            "generate" | "gen" => parse_assignments(rest.iter().copied())
                .map(ConsoleCommand::Generate)
                .map_err(|e| e.to_string()),
            "train" => parse_assignments(rest.iter().copied())
                .map(ConsoleCommand::Train)
                .map_err(|e| e.to_string()),
            "show" => no_args(ConsoleCommand::Show),
            "datasets" | "ls" => no_args(ConsoleCommand::Datasets),
            "select" => match rest.as_slice() {
                [name] => Ok(ConsoleCommand::Select((*name).to_string())),
                _ => Err("usage: select <name>".to_string()),
            },
            "refresh" => no_args(ConsoleCommand::Refresh),
            "jobs" => no_args(ConsoleCommand::Jobs),
            "cancel" => match rest.as_slice() {
                ["all"] => Ok(ConsoleCommand::Cancel(CancelTarget::All)),
                [id] => id
                    .trim_start_matches('#')
                    .parse::<u64>()
                    .map(|n| ConsoleCommand::Cancel(CancelTarget::Job(JobId(n))))
                    .map_err(|_| format!("not a job id: {id}")),
                _ => Err("usage: cancel <id>|all".to_string()),
            },
            "clear" => no_args(ConsoleCommand::Clear),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" => no_args(ConsoleCommand::Quit),
            other => Err(format!("unknown command: {other} (try `help`)")),
        }
    }
}

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interface layer state: the supervisor it drives, both forms and the
/// dataset catalog.
#[derive(Debug)]
pub struct Console<L: JobLauncher> {
    supervisor: Supervisor<L>,
    paths: ConsolePaths,
    dataset_form: DatasetForm,
    training_form: TrainingForm,
    catalog: SharedCatalog,
    cursor: LogCursor,
}

impl<L: JobLauncher> Console<L> {
    pub fn new(cfg: &ConfigFile, launcher: L) -> Self {
        let paths = ConsolePaths::from_config(cfg);
        let sink = LogSink::with_capacity(cfg.console().log_capacity);
        let mut supervisor = Supervisor::new(cfg.supervisor().policy(), launcher, sink);

        let catalog = SharedCatalog::new(DatasetCatalog::new(
            paths.dataset_dir.clone(),
            cfg.dataset().prefixes.clone(),
        ));
        if let Err(e) = catalog.lock().refresh() {
            warn!(error = %e, "initial dataset scan failed");
        }

        let refresh_target = catalog.clone();
        supervisor.register(
            CompletionRule::for_class(JobClass::dataset_generation()).succeeded(),
            move |completion: &Completion| {
                if let Err(e) = refresh_target.lock().refresh() {
                    warn!(job = %completion.id, error = %e, "dataset refresh failed");
                }
            },
        );

        Self {
            supervisor,
            paths,
            dataset_form: DatasetForm::from_section(cfg.dataset()),
            training_form: TrainingForm::from_section(cfg.training()),
            catalog,
            cursor: LogCursor::default(),
        }
    }

    pub fn supervisor(&self) -> &Supervisor<L> {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut Supervisor<L> {
        &mut self.supervisor
    }

    pub fn paths(&self) -> &ConsolePaths {
        &self.paths
    }

    pub fn dataset_form(&self) -> &DatasetForm {
        &self.dataset_form
    }

    pub fn training_form(&self) -> &TrainingForm {
        &self.training_form
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Write sink lines that were not rendered yet. Returns how many.
    ///
    /// Lines the bounded log evicted before they could be shown are reported
    /// with a single marker line.
    pub fn render(&mut self, out: &mut impl Write) -> io::Result<usize> {
        let read = self.supervisor.sink().read(&mut self.cursor);
        if read.dropped > 0 {
            writeln!(out, "... {} line(s) dropped (log_capacity)", read.dropped)?;
        }
        for line in &read.lines {
            writeln!(out, "[{}] {}", line.job, line.text)?;
        }
        out.flush()?;
        Ok(read.lines.len())
    }

    /// Parse and run one input line.
    pub fn execute_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        match line.parse::<ConsoleCommand>() {
            Ok(cmd) => self.execute(cmd, out),
            Err(msg) => {
                writeln!(out, "error: {msg}")?;
                Ok(Flow::Continue)
            }
        }
    }

    pub fn execute(&mut self, cmd: ConsoleCommand, out: &mut impl Write) -> io::Result<Flow> {
        debug!(?cmd, "console command");
        match cmd {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Generate(fields) => self.generate(&fields, out)?,
            ConsoleCommand::Train(fields) => self.train(&fields, out)?,
            ConsoleCommand::Show => {
                writeln!(out, "dataset form:\n{}", self.dataset_form)?;
                writeln!(out, "training form:\n{}", self.training_form)?;
                let catalog = self.catalog.lock();
                writeln!(out, "  dataset       = {}", catalog.selected().unwrap_or("-"))?;
            }
            ConsoleCommand::Datasets => self.print_datasets(out)?,
            ConsoleCommand::Select(name) => {
                let result = self.catalog.lock().select(&name);
                match result {
                    Ok(()) => writeln!(out, "selected {name}")?,
                    Err(e) => writeln!(out, "error: {e}")?,
                }
            }
            ConsoleCommand::Refresh => {
                let result = self.catalog.lock().refresh().map(|_| ());
                match result {
                    Ok(()) => self.print_datasets(out)?,
                    Err(e) => writeln!(out, "error: scanning datasets: {e}")?,
                }
            }
            ConsoleCommand::Jobs => {
                let jobs = self.supervisor.active();
                if jobs.is_empty() {
                    writeln!(out, "no active jobs")?;
                }
                for job in jobs {
                    writeln!(out, "{} [{}] {}: {}", job.id, job.class, job.status, job.command)?;
                }
            }
            ConsoleCommand::Cancel(CancelTarget::Job(id)) => {
                if self.supervisor.cancel(id) {
                    writeln!(out, "cancelling {id}")?;
                } else {
                    writeln!(out, "no cancellable job {id}")?;
                }
            }
            ConsoleCommand::Cancel(CancelTarget::All) => {
                let n = self.supervisor.cancel_all();
                writeln!(out, "cancelling {n} job(s)")?;
            }
            ConsoleCommand::Clear => {
                self.supervisor.sink().clear();
                writeln!(out, "log cleared")?;
            }
            ConsoleCommand::Help => writeln!(out, "{HELP}")?,
            ConsoleCommand::Quit => {
                let n = self.supervisor.cancel_all();
                info!(cancelled = n, "quit requested");
                if n > 0 {
                    writeln!(out, "cancelling {n} job(s) before exit")?;
                }
                return Ok(Flow::Quit);
            }
        }
        out.flush()?;
        Ok(Flow::Continue)
    }

    fn generate(&mut self, fields: &[(String, String)], out: &mut impl Write) -> io::Result<()> {
        for (key, value) in fields {
            if let Err(e) = self.dataset_form.apply(key, value) {
                return writeln!(out, "error: {e}");
            }
        }
        let descriptor = match self.dataset_form.build(&self.paths) {
            Ok(d) => d,
            Err(e) => return writeln!(out, "error: {e}"),
        };
        self.submit(descriptor, out)
    }

    fn train(&mut self, fields: &[(String, String)], out: &mut impl Write) -> io::Result<()> {
        for (key, value) in fields {
            let result = match key.as_str() {
                "dataset" | "data" => self.catalog.lock().select(value),
                _ => self.training_form.apply(key, value),
            };
            if let Err(e) = result {
                return writeln!(out, "error: {e}");
            }
        }
        let selected = self.catalog.lock().selected().map(str::to_string);
        let descriptor = match self.training_form.build(&self.paths, selected.as_deref()) {
            Ok(d) => d,
            Err(e) => return writeln!(out, "error: {e}"),
        };
        self.submit(descriptor, out)
    }

    fn submit(&mut self, descriptor: JobDescriptor, out: &mut impl Write) -> io::Result<()> {
        let command = descriptor.display_command();
        match self.supervisor.submit(descriptor) {
            Ok(handle) => writeln!(
                out,
                "{} [{}] {}: {}",
                handle.id(),
                handle.class(),
                handle.status(),
                command
            ),
            Err(e) => writeln!(out, "error: {e}"),
        }
    }

    fn print_datasets(&self, out: &mut impl Write) -> io::Result<()> {
        let catalog = self.catalog.lock();
        match catalog.scan() {
            DatasetScan::MissingDir => {
                writeln!(out, "dataset directory {} does not exist", catalog.dir().display())
            }
            DatasetScan::Listed(names) if names.is_empty() => {
                writeln!(out, "no datasets found; generate one first")
            }
            DatasetScan::Listed(names) => {
                for name in names {
                    let mark = if catalog.selected() == Some(name.as_str()) { '*' } else { ' ' };
                    writeln!(out, "{mark} {name}")?;
                }
                Ok(())
            }
        }
    }

    /// Render the job's remaining output, then its outcome.
    pub fn report_completion(&mut self, completion: &Completion, out: &mut impl Write) -> io::Result<()> {
        self.render(out)?;
        writeln!(
            out,
            "{} [{}] {}",
            completion.id, completion.class, completion.status
        )?;
        if completion.class == JobClass::dataset_generation() && completion.status.is_success() {
            self.print_datasets(out)?;
        }
        out.flush()
    }
}

/// Drive the console until `quit` (or end of input) and every job was
/// dispatched.
///
/// This is the coordinating context: commands, rendering of new output and
/// completion callbacks all run here, one at a time.
pub async fn run_console<L, R, W>(console: &mut Console<L>, input: R, out: &mut W) -> Result<()>
where
    L: JobLauncher,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut seq_rx = console.supervisor().sink().subscribe();
    let mut input_open = true;

    writeln!(out, "jobdeck ready; type `help` for commands")?;
    out.flush()?;

    loop {
        console.render(out)?;
        if !input_open && console.supervisor().is_idle() {
            break;
        }

        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line.context("reading console input")? {
                    Some(line) => {
                        if console.execute_line(&line, out)? == Flow::Quit {
                            input_open = false;
                        }
                    }
                    None => {
                        debug!("console input closed; waiting for running jobs");
                        input_open = false;
                    }
                }
            }
            changed = seq_rx.changed() => {
                if changed.is_err() {
                    debug!("log sink closed");
                }
            }
            Some(completion) = console.supervisor_mut().dispatch_next() => {
                console.report_completion(&completion, out)?;
            }
        }
    }

    info!("console loop finished");
    Ok(())
}
