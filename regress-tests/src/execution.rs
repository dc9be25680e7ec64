//! Test execution functionality
//!
//! Running a case is split across two collaborators: a [`BuildInvoker`] that
//! prepares the program (normally `make`) and a [`ProgramRunner`] that runs it
//! and captures stdout. An [`ExecutionStrategy`] combines them into "build as
//! needed, then run this case". Everything here is synchronous and strictly
//! sequential; a hanging program hangs the run.

use log::{debug, info, warn};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use crate::discovery::{TestCase, WorkDir};
use crate::HarnessError;

/// Text in build output that older makefiles used to signal failure
const LEGACY_FAILURE_MARKER: &str = "Error";

/// Captured output of a build or clean step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Whether the build command exited successfully
    pub success: bool,
    /// Combined stdout and stderr text
    pub output: String,
}

/// External build tool
pub trait BuildInvoker {
    /// Build a target, or the default target when `target` is `None`
    fn build(&self, target: Option<&str>) -> Result<BuildOutput, HarnessError>;

    /// Remove build artifacts
    fn clean(&self) -> Result<BuildOutput, HarnessError>;

    /// Command line shown to the user for a target
    fn describe(&self, target: Option<&str>) -> String;
}

/// Captured result of one program run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Raw stdout bytes, never decoded
    pub stdout: Vec<u8>,
    pub exit_code: Option<i32>,
}

/// Runs the program under test
pub trait ProgramRunner {
    /// Run `program` with `args`, reading `stdin` from a file when given
    fn run(&self, program: &str, args: &[String], stdin: Option<&Path>) -> io::Result<RunOutput>;
}

/// Build invoker shelling out to `make` (or a configured replacement)
#[derive(Debug, Clone)]
pub struct MakeInvoker {
    workdir: WorkDir,
    command: Vec<String>,
    clean_target: String,
}

impl MakeInvoker {
    pub fn new(workdir: WorkDir, command: Vec<String>, clean_target: impl Into<String>) -> Self {
        Self { workdir, command, clean_target: clean_target.into() }
    }

    fn invoke(&self, target: Option<&str>) -> Result<BuildOutput, HarnessError> {
        let (program, base_args) = self.command.split_first().ok_or_else(|| {
            HarnessError::Config("Build command must not be empty".to_string())
        })?;

        debug!("Running build command: {}", self.describe(target));

        let output = Command::new(program)
            .args(base_args)
            .args(target)
            .current_dir(self.workdir.path())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HarnessError::Build {
                target: target.map(str::to_string),
                output: format!("Failed to run {}: {}", program, e),
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(BuildOutput { success: output.status.success(), output: text })
    }
}

impl BuildInvoker for MakeInvoker {
    fn build(&self, target: Option<&str>) -> Result<BuildOutput, HarnessError> {
        self.invoke(target)
    }

    fn clean(&self) -> Result<BuildOutput, HarnessError> {
        self.invoke(Some(&self.clean_target))
    }

    fn describe(&self, target: Option<&str>) -> String {
        let mut words = self.command.clone();
        words.extend(target.map(str::to_string));
        words.join(" ")
    }
}

/// Program runner spawning `./<program>` inside the working directory
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    workdir: WorkDir,
}

impl ProcessRunner {
    pub fn new(workdir: WorkDir) -> Self {
        Self { workdir }
    }
}

impl ProgramRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String], stdin: Option<&Path>) -> io::Result<RunOutput> {
        let input = match stdin {
            Some(path) => Stdio::from(File::open(path)?),
            None => Stdio::null(),
        };

        let output = Command::new(self.workdir.join(program))
            .args(args)
            .current_dir(self.workdir.path())
            .stdin(input)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()?;

        Ok(RunOutput { stdout: output.stdout, exit_code: output.status.code() })
    }
}

/// Output of running one test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub case: TestCase,
    /// Captured stdout bytes, empty when the program could not run
    pub output: Vec<u8>,
    pub exit_code: Option<i32>,
    /// Why the program could not be run
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(case: TestCase, run: RunOutput) -> Self {
        Self { case, output: run.stdout, exit_code: run.exit_code, error: None }
    }

    pub fn error(case: TestCase, error_message: String) -> Self {
        Self { case, output: Vec::new(), exit_code: None, error: Some(error_message) }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Output decoded for display; invalid UTF-8 becomes U+FFFD
    pub fn output_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

/// Strategy for producing the output of each test case
pub trait ExecutionStrategy {
    /// Whether a discovered case can be run by this strategy at all
    fn selects(&self, _case: &TestCase) -> bool {
        true
    }

    /// Build whatever is shared by every case
    fn prepare(&self, out: &mut dyn Write) -> Result<(), HarnessError>;

    /// Run one case; build failures abort, run failures are recorded in the result
    fn run_case(
        &self,
        case: &TestCase,
        out: &mut dyn Write,
    ) -> Result<ExecutionResult, HarnessError>;

    /// Command line shown in progress messages
    fn describe(&self) -> String;
}

/// Build a target, echoing the command and its output, and fail on a bad exit status
pub fn build_checked(
    builder: &dyn BuildInvoker,
    target: Option<&str>,
    out: &mut dyn Write,
) -> Result<(), HarnessError> {
    writeln!(out, "Building the executable:")?;
    writeln!(out, "{}", builder.describe(target))?;

    let build = builder.build(target)?;
    writeln!(out, "{}", build.output.trim_end())?;
    writeln!(out)?;

    if !build.success {
        writeln!(out, "Error: Build was not successful.")?;
        writeln!(out)?;
        return Err(HarnessError::Build {
            target: target.map(str::to_string),
            output: build.output,
        });
    }

    if build.output.contains(LEGACY_FAILURE_MARKER) {
        warn!("Build output mentions \"{}\" but exited successfully", LEGACY_FAILURE_MARKER);
        writeln!(
            out,
            "Note: build output mentions \"{}\" but the build exited successfully; \
             builds are judged by exit status only.",
            LEGACY_FAILURE_MARKER
        )?;
    }

    writeln!(out, "Build successful.")?;
    Ok(())
}

fn run_program(
    runner: &dyn ProgramRunner,
    case: &TestCase,
    program: &str,
    args: &[String],
    stdin: Option<&Path>,
) -> ExecutionResult {
    debug!("Running {} for {}", program, case);

    match runner.run(program, args, stdin) {
        Ok(run) => {
            if let Some(code) = run.exit_code.filter(|code| *code != 0) {
                debug!("{} exited with status {} on {}", program, code, case);
            }
            ExecutionResult::success(case.clone(), run)
        }
        Err(e) => {
            warn!("Could not run {} for {}: {}", program, case, e);
            ExecutionResult::error(case.clone(), format!("./{}: {}", program, e))
        }
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    let mut line = format!("./{}", program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// One prebuilt executable, fed each case file on stdin
pub struct SharedExecutable<'a> {
    executable: String,
    args: Vec<String>,
    workdir: &'a WorkDir,
    builder: &'a dyn BuildInvoker,
    runner: &'a dyn ProgramRunner,
}

impl<'a> SharedExecutable<'a> {
    pub fn new(
        executable: impl Into<String>,
        args: Vec<String>,
        workdir: &'a WorkDir,
        builder: &'a dyn BuildInvoker,
        runner: &'a dyn ProgramRunner,
    ) -> Self {
        Self { executable: executable.into(), args, workdir, builder, runner }
    }
}

impl ExecutionStrategy for SharedExecutable<'_> {
    fn prepare(&self, out: &mut dyn Write) -> Result<(), HarnessError> {
        build_checked(self.builder, None, out)
    }

    fn run_case(
        &self,
        case: &TestCase,
        _out: &mut dyn Write,
    ) -> Result<ExecutionResult, HarnessError> {
        let input = case.path_in(self.workdir.path());
        Ok(run_program(self.runner, case, &self.executable, &self.args, Some(&input)))
    }

    fn describe(&self) -> String {
        command_line(&self.executable, &self.args)
    }
}

/// Each `test-<name>.txt` case with a `test-<name>.<ext>` source is its own
/// make target, rebuilt right before it runs
pub struct PerCaseBuild<'a> {
    args: Vec<String>,
    source_extension: String,
    workdir: &'a WorkDir,
    builder: &'a dyn BuildInvoker,
    runner: &'a dyn ProgramRunner,
}

impl<'a> PerCaseBuild<'a> {
    pub fn new(
        args: Vec<String>,
        source_extension: impl Into<String>,
        workdir: &'a WorkDir,
        builder: &'a dyn BuildInvoker,
        runner: &'a dyn ProgramRunner,
    ) -> Self {
        Self { args, source_extension: source_extension.into(), workdir, builder, runner }
    }

    fn source_name(&self, case: &TestCase) -> String {
        format!("{}.{}", case.stem(), self.source_extension)
    }
}

impl ExecutionStrategy for PerCaseBuild<'_> {
    fn selects(&self, case: &TestCase) -> bool {
        let found = self.workdir.join(&self.source_name(case)).is_file();
        if !found {
            debug!("Skipping {}: no {}", case, self.source_name(case));
        }
        found
    }

    fn prepare(&self, _out: &mut dyn Write) -> Result<(), HarnessError> {
        Ok(())
    }

    fn run_case(
        &self,
        case: &TestCase,
        out: &mut dyn Write,
    ) -> Result<ExecutionResult, HarnessError> {
        // TODO: mark the case as errored and continue instead of aborting the run
        build_checked(self.builder, Some(case.stem()), out)?;
        Ok(run_program(self.runner, case, case.stem(), &self.args, None))
    }

    fn describe(&self) -> String {
        command_line("test-*", &self.args)
    }
}

/// Run every case in order, stopping at the first build failure
pub fn execute_cases(
    strategy: &dyn ExecutionStrategy,
    cases: &[TestCase],
    out: &mut dyn Write,
) -> Result<Vec<ExecutionResult>, HarnessError> {
    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        results.push(strategy.run_case(case, out)?);
    }

    info!("Executed {} test cases", results.len());
    Ok(results)
}
