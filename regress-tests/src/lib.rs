//! # Regression Test Harness
//!
//! Builds a program under test, feeds it every `test-*.txt` case in a
//! directory and records, compares, removes or prints the captured output.
//!
//! ## Architecture
//!
//! The framework is organized into several modules:
//! - `discovery`: Test case discovery from a directory listing
//! - `execution`: Build invoker, program runner and execution strategies
//! - `baseline`: Saved `<case>_<label>.txt` outputs
//! - `comparison`: Exact output comparison and diff generation
//! - `reporting`: Passed / failed / no-baseline report and truncation
//! - `harness`: Orchestration of a single invocation
//! - `config`: Command-line flags and validated run configuration

pub mod baseline;
pub mod comparison;
pub mod config;
pub mod discovery;
pub mod execution;
pub mod harness;
pub mod reporting;

// Re-exports for easier access
pub use baseline::{BaselineLookup, BaselineStore, Label};
pub use comparison::{ComparisonOutcome, Mismatch, OutputComparator};
pub use config::{Action, Args, LineLimit, RunConfig, Strategy};
pub use discovery::{CasePattern, DirectoryLister, TestCase, WorkDir};
pub use execution::{BuildInvoker, ExecutionResult, ExecutionStrategy, ProgramRunner};
pub use harness::{HarnessBuilder, RegressHarness};
pub use reporting::Report;

/// Test framework errors
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Build was not successful{}", target_suffix(.target))]
    Build { target: Option<String>, output: String },

    #[error("Test execution failed: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn target_suffix(target: &Option<String>) -> String {
    match target {
        Some(target) => format!(" for target `{}`", target),
        None => String::new(),
    }
}

impl HarnessError {
    /// Process exit status for this error.
    ///
    /// Usage problems exit with 2 and build failures with 3; anything else is
    /// a plain failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Build { .. } => 3,
            Self::Execution(_) | Self::Io(_) => 1,
        }
    }
}
