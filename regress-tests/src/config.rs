//! Configuration and settings for the test harness

use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

use crate::baseline::{Label, TMP_LABEL};
use crate::discovery::WorkDir;
use crate::HarnessError;

/// How the program under test is built and run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildMode {
    /// One executable already built, each test case is a text file read to stdin
    Txt,
    /// Each test case is a source file with its own make target
    Make,
}

/// What to do with the captured output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Generate test-*_[suffix].txt using current program output
    Gen,
    /// Test current output against test-*_[suffix].txt outputs
    Test,
    /// Remove test-*_[suffix].txt files
    Rm,
    /// Print current program output for each test case
    Print,
}

/// Command-line flags of the `regress` binary
#[derive(Debug, Clone, Parser)]
#[command(name = "regress")]
#[command(version, about = "Regression test suite for programs driven by test-*.txt inputs")]
#[command(after_help = "Examples:\n  \
    regress -o gen -s old -e exchange -a \"-v -m -t\"\n  \
    regress -o test -s old -e exchange -a \"-v -m -t\" -d")]
pub struct Args {
    /// Name of the program executable when using a single executable build mode
    #[arg(short, long)]
    pub exe: Option<String>,

    /// All of the program's command line arguments, as one string
    #[arg(short, long, default_value = "", allow_hyphen_values = true)]
    pub args: String,

    /// Build and execution mode
    #[arg(short, long, value_enum, default_value_t = BuildMode::Txt)]
    pub build: BuildMode,

    /// Number of lines to output for each test case (-1 = unlimited)
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub num: i64,

    /// Print the diff output if a test case did not pass, in test mode
    #[arg(short, long)]
    pub diff: bool,

    /// Suffix (label) of the baseline files
    #[arg(short, long)]
    pub suffix: Option<String>,

    /// Output mode
    #[arg(short, long, value_enum)]
    pub out: Option<OutputMode>,

    /// Directory holding the test cases and the program
    #[arg(short = 'C', long, default_value = ".")]
    pub dir: PathBuf,

    /// Build command; a make target is appended when one is needed
    #[arg(long, default_value = "make")]
    pub make: String,

    /// Target passed to the build command to remove build artifacts
    #[arg(long, default_value = "clean")]
    pub clean_target: String,

    /// Source file extension of test cases in make mode
    #[arg(long, default_value = "cpp")]
    pub source_ext: String,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Maximum number of lines shown per output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineLimit {
    #[default]
    Unlimited,
    /// Show lines `0..=n`, i.e. `n + 1` lines
    Lines(usize),
}

impl LineLimit {
    /// Sentinel meaning "no limit" on the command line
    pub const UNLIMITED: i64 = -1;

    pub fn from_raw(raw: i64) -> Result<Self, HarnessError> {
        match raw {
            Self::UNLIMITED => Ok(Self::Unlimited),
            n if n >= 0 => usize::try_from(n)
                .map(Self::Lines)
                .map_err(|_| HarnessError::Config(format!("Line limit too large: {}", n))),
            n => Err(HarnessError::Config(format!(
                "Invalid line limit {} (use -1 for unlimited)",
                n
            ))),
        }
    }
}

/// Execution strategy for the program under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// A single executable fed every case on stdin
    SharedExecutable { executable: String },
    /// Every case with a `test-<name>.<source_extension>` source builds and
    /// runs its own make target
    PerCaseBuild { source_extension: String },
}

/// Selected action of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Record current output as baselines
    Generate { strategy: Strategy, label: Label },
    /// Compare current output against baselines
    Compare { strategy: Strategy, label: Label, show_diff: bool },
    /// Delete every baseline under a label
    Remove { label: Label },
    /// Print current output
    Print { strategy: Strategy },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate { label, .. } => write!(f, "generate _{}", label),
            Self::Compare { label, .. } => write!(f, "test against _{}", label),
            Self::Remove { label } => write!(f, "remove _{}", label),
            Self::Print { .. } => f.write_str("print"),
        }
    }
}

/// Validated configuration of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub workdir: WorkDir,
    pub action: Action,
    pub program_args: Vec<String>,
    pub limit: LineLimit,
    pub build_command: Vec<String>,
    pub clean_target: String,
    pub color: bool,
}

impl RunConfig {
    /// Create a configuration with the default toolchain (`make`, `make clean`)
    ///
    /// A relative `workdir` is resolved against the current directory.
    pub fn new(workdir: impl Into<PathBuf>, action: Action) -> Self {
        Self {
            workdir: WorkDir::new(workdir),
            action,
            program_args: Vec::new(),
            limit: LineLimit::Unlimited,
            build_command: vec!["make".to_string()],
            clean_target: "clean".to_string(),
            color: false,
        }
    }

    /// Validate command-line flags into a run configuration
    pub fn from_args(args: Args) -> Result<Self, HarnessError> {
        let mode = args
            .out
            .ok_or_else(|| HarnessError::Config("No valid output mode specified.".to_string()))?;

        let limit = LineLimit::from_raw(args.num)?;
        let program_args = split_words(&args.args, "--args")?;
        let build_command = split_words(&args.make, "--make")?;
        if build_command.is_empty() {
            return Err(HarnessError::Config("Build command must not be empty".to_string()));
        }

        let workdir = args.dir.canonicalize().map_err(|e| {
            HarnessError::Config(format!("Working directory {}: {}", args.dir.display(), e))
        })?;

        let action = match mode {
            OutputMode::Gen => Action::Generate {
                strategy: strategy(&args)?,
                label: output_label(&args)?,
            },
            OutputMode::Test => Action::Compare {
                strategy: strategy(&args)?,
                label: output_label(&args)?,
                show_diff: args.diff,
            },
            OutputMode::Rm => Action::Remove { label: required_label(&args)? },
            OutputMode::Print => Action::Print { strategy: strategy(&args)? },
        };

        Ok(Self {
            workdir: WorkDir::new(workdir),
            action,
            program_args,
            limit,
            build_command,
            clean_target: args.clean_target,
            color: !args.no_color,
        })
    }
}

fn split_words(raw: &str, flag: &str) -> Result<Vec<String>, HarnessError> {
    shlex::split(raw)
        .ok_or_else(|| HarnessError::Config(format!("Unbalanced quoting in {}: {}", flag, raw)))
}

fn strategy(args: &Args) -> Result<Strategy, HarnessError> {
    match args.build {
        BuildMode::Txt => match args.exe.as_deref() {
            Some(exe) if !exe.is_empty() => {
                Ok(Strategy::SharedExecutable { executable: exe.to_string() })
            }
            _ => Err(HarnessError::Config(
                "An executable name (-e) is required in txt build mode".to_string(),
            )),
        },
        BuildMode::Make => {
            Ok(Strategy::PerCaseBuild { source_extension: args.source_ext.clone() })
        }
    }
}

fn required_label(args: &Args) -> Result<Label, HarnessError> {
    match args.suffix.as_deref() {
        Some(suffix) if !suffix.is_empty() => Ok(Label::new(suffix)),
        _ => Err(HarnessError::Config(
            "A suffix (-s) is required for this output mode".to_string(),
        )),
    }
}

/// Label for modes that write or compare outputs; `tmp` belongs to the comparer
fn output_label(args: &Args) -> Result<Label, HarnessError> {
    let label = required_label(args)?;
    if label.as_str() == TMP_LABEL {
        return Err(HarnessError::Config(format!(
            "The suffix `{}` is reserved for temporary comparison output",
            TMP_LABEL
        )));
    }
    Ok(label)
}
