//! Main test harness orchestrating one invocation
//!
//! Every run walks the same phases: discover the cases, build and execute the
//! program, then compare, record, delete or print, and finally report. A
//! build failure aborts immediately and skips cleanup; any other failure
//! still cleans up the build artifacts.

use log::{debug, info, warn};
use std::cell::Cell;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::baseline::{BaselineStore, Label};
use crate::config::{Action, LineLimit, RunConfig, Strategy};
use crate::discovery::{discover, CasePattern, TestCase};
use crate::execution::{
    execute_cases, BuildInvoker, ExecutionResult, ExecutionStrategy, MakeInvoker, PerCaseBuild,
    ProcessRunner, ProgramRunner, SharedExecutable,
};
use crate::reporting::{render_output, RenderOptions, Report, DIVIDER};
use crate::HarnessError;

/// Phase of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Discovering,
    Building,
    Executing,
    Comparing,
    Recording,
    Deleting,
    Printing,
    Reporting,
    Done,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a finished run produced
#[derive(Debug)]
pub enum RunOutcome {
    /// Baseline files written
    Generated(Vec<PathBuf>),
    /// Comparison report
    Compared(Report),
    /// Baseline files deleted
    Removed(Vec<String>),
    /// Outputs that were printed
    Printed(Vec<ExecutionResult>),
}

/// Main harness for running the program under test
pub struct RegressHarness {
    config: RunConfig,
    store: BaselineStore,
    builder: Box<dyn BuildInvoker>,
    runner: Box<dyn ProgramRunner>,
    phase: Cell<Phase>,
}

impl RegressHarness {
    /// Create a harness using `make` and real processes
    pub fn new(config: RunConfig) -> Self {
        let builder = MakeInvoker::new(
            config.workdir.clone(),
            config.build_command.clone(),
            config.clean_target.clone(),
        );
        let runner = ProcessRunner::new(config.workdir.clone());
        Self::with_toolchain(config, Box::new(builder), Box::new(runner))
    }

    /// Create a harness with a custom build invoker and program runner
    pub fn with_toolchain(
        config: RunConfig,
        builder: Box<dyn BuildInvoker>,
        runner: Box<dyn ProgramRunner>,
    ) -> Self {
        let store = BaselineStore::new(config.workdir.clone());
        Self { config, store, builder, runner, phase: Cell::new(Phase::Idle) }
    }

    /// Phase the harness is in, or ended in
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    fn enter(&self, phase: Phase) {
        debug!("{} -> {}", self.phase.get(), phase);
        self.phase.set(phase);
    }

    /// Run the configured action, writing user-facing text to `out`
    pub fn run(&self, out: &mut dyn Write) -> Result<RunOutcome, HarnessError> {
        info!("Starting {} in {}", self.config.action, self.config.workdir.path().display());

        let result = match &self.config.action {
            Action::Remove { label } => self.remove(label, out).map(RunOutcome::Removed),
            Action::Generate { strategy, label } => self.with_cleanup(out, |out| {
                self.generate(strategy, label, out).map(RunOutcome::Generated)
            }),
            Action::Compare { strategy, label, show_diff } => self.with_cleanup(out, |out| {
                self.compare(strategy, label, *show_diff, out).map(RunOutcome::Compared)
            }),
            Action::Print { strategy } => self.with_cleanup(out, |out| {
                self.print(strategy, out).map(RunOutcome::Printed)
            }),
        };

        match &result {
            Ok(_) => self.enter(Phase::Done),
            Err(e) => {
                warn!("Run aborted: {}", e);
                self.enter(Phase::Aborted);
            }
        }

        result
    }

    /// Run `body`, then clean build artifacts unless the build itself failed
    fn with_cleanup<T>(
        &self,
        out: &mut dyn Write,
        body: impl FnOnce(&mut dyn Write) -> Result<T, HarnessError>,
    ) -> Result<T, HarnessError> {
        let result = body(&mut *out);
        if matches!(result, Err(HarnessError::Build { .. })) {
            return result;
        }

        let cleaned = self.clean(out);
        let value = result?;
        cleaned?;
        Ok(value)
    }

    fn clean(&self, out: &mut dyn Write) -> Result<(), HarnessError> {
        writeln!(out, "Cleaning up:")?;
        writeln!(out, "{}", self.builder.describe(Some(&self.config.clean_target)))?;

        let cleaned = self.builder.clean()?;
        if !cleaned.output.is_empty() {
            writeln!(out, "{}", cleaned.output.trim_end())?;
        }
        if !cleaned.success {
            warn!("Cleanup exited unsuccessfully; stale build artifacts may remain");
        }
        Ok(())
    }

    fn discover(&self, executor: &dyn ExecutionStrategy) -> Result<Vec<TestCase>, HarnessError> {
        self.enter(Phase::Discovering);
        let mut cases = discover(&self.config.workdir, &CasePattern::default())?;
        cases.retain(|case| executor.selects(case));
        if cases.is_empty() {
            warn!("No test cases found in {}", self.config.workdir.path().display());
        }
        Ok(cases)
    }

    fn strategy<'a>(&'a self, strategy: &Strategy) -> Box<dyn ExecutionStrategy + 'a> {
        let args = self.config.program_args.clone();
        match strategy {
            Strategy::SharedExecutable { executable } => Box::new(SharedExecutable::new(
                executable.as_str(),
                args,
                &self.config.workdir,
                self.builder.as_ref(),
                self.runner.as_ref(),
            )),
            Strategy::PerCaseBuild { source_extension } => Box::new(PerCaseBuild::new(
                args,
                source_extension.as_str(),
                &self.config.workdir,
                self.builder.as_ref(),
                self.runner.as_ref(),
            )),
        }
    }

    fn execute(
        &self,
        strategy: &dyn ExecutionStrategy,
        cases: &[TestCase],
        out: &mut dyn Write,
    ) -> Result<Vec<ExecutionResult>, HarnessError> {
        self.enter(Phase::Building);
        strategy.prepare(out)?;
        self.enter(Phase::Executing);
        execute_cases(strategy, cases, out)
    }

    fn generate(
        &self,
        strategy: &Strategy,
        label: &Label,
        out: &mut dyn Write,
    ) -> Result<Vec<PathBuf>, HarnessError> {
        let executor = self.strategy(strategy);
        let cases = self.discover(executor.as_ref())?;
        let results = self.execute(executor.as_ref(), &cases, out)?;

        self.enter(Phase::Recording);
        writeln!(out, "Generating \"test-*{}\" files...", label.file_suffix())?;

        let mut written = Vec::new();
        for result in &results {
            if let Some(error) = &result.error {
                writeln!(out, "Skipping {}: program did not run: {}", result.case, error)?;
                continue;
            }
            let path = self.store.write(&result.case, label, &result.output)?;
            writeln!(out, "{}", display_name(&path))?;
            written.push(path);
        }

        Ok(written)
    }

    fn compare(
        &self,
        strategy: &Strategy,
        label: &Label,
        show_diff: bool,
        out: &mut dyn Write,
    ) -> Result<Report, HarnessError> {
        let executor = self.strategy(strategy);
        let cases = self.discover(executor.as_ref())?;
        writeln!(out, "Testing {}...", executor.describe())?;
        let results = self.execute(executor.as_ref(), &cases, out)?;

        self.enter(Phase::Comparing);
        writeln!(out, "Comparing output...")?;

        let report = self.write_scratch(&results).and_then(|()| {
            Report::aggregate(&cases, &results, &self.store, label)
        });

        // Scratch outputs go away whatever the comparison did
        let scratch = self.remove(&Label::tmp(), out);
        let report = report?;
        scratch?;

        self.enter(Phase::Reporting);
        info!("Compared {} test cases against {}", report.total(), label.file_suffix());
        let options =
            RenderOptions { show_diff, limit: self.config.limit, color: self.config.color };
        write!(out, "{}", report.render(&options))?;
        writeln!(out, "{}", report.summary())?;

        Ok(report)
    }

    /// Save current outputs as `<case>_tmp.txt` for inspection while comparing
    fn write_scratch(&self, results: &[ExecutionResult]) -> Result<(), HarnessError> {
        let tmp = Label::tmp();
        for result in results.iter().filter(|r| !r.is_error()) {
            self.store.write(&result.case, &tmp, &result.output)?;
        }
        Ok(())
    }

    fn remove(&self, label: &Label, out: &mut dyn Write) -> Result<Vec<String>, HarnessError> {
        self.enter(Phase::Deleting);
        writeln!(out, "Removing {} files:", label.file_suffix())?;

        let removed = self.store.delete_all(label)?;
        for name in &removed {
            writeln!(out, "rm {}", name)?;
        }
        writeln!(out)?;

        Ok(removed)
    }

    fn print(
        &self,
        strategy: &Strategy,
        out: &mut dyn Write,
    ) -> Result<Vec<ExecutionResult>, HarnessError> {
        let executor = self.strategy(strategy);
        let cases = self.discover(executor.as_ref())?;
        writeln!(out, "Running {}...", executor.describe())?;
        let results = self.execute(executor.as_ref(), &cases, out)?;

        self.enter(Phase::Printing);
        for result in &results {
            write!(out, "{}", render_output(&result.case, result, self.config.limit))?;
        }
        writeln!(out, "{}", DIVIDER)?;

        Ok(results)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Builder pattern for creating run configurations and harnesses
pub struct HarnessBuilder {
    config: RunConfig,
}

impl HarnessBuilder {
    /// Start building a harness for a working directory and action
    pub fn new(workdir: impl AsRef<Path>, action: Action) -> Self {
        Self { config: RunConfig::new(workdir.as_ref().to_path_buf(), action) }
    }

    /// Set the program's command line arguments
    pub fn program_args(mut self, args: Vec<String>) -> Self {
        self.config.program_args = args;
        self
    }

    /// Set the output line limit
    pub fn limit(mut self, limit: LineLimit) -> Self {
        self.config.limit = limit;
        self
    }

    /// Build the harness with a custom toolchain
    pub fn build_with(
        self,
        builder: Box<dyn BuildInvoker>,
        runner: Box<dyn ProgramRunner>,
    ) -> RegressHarness {
        RegressHarness::with_toolchain(self.config, builder, runner)
    }
}
