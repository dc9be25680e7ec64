//! Test reporting: aggregation into passed / failed / no-baseline buckets

use console::style;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::baseline::{baseline_file_name, BaselineLookup, Label};
use crate::comparison::{ComparisonOutcome, Mismatch, OutputComparator};
use crate::config::LineLimit;
use crate::discovery::TestCase;
use crate::execution::ExecutionResult;
use crate::HarnessError;

/// Separator printed around diffs and program output
pub const DIVIDER: &str = "----------------------------------------------------------";

/// Keep the first lines of `text` according to the limit
///
/// `Lines(n)` keeps lines `0..=n`, so `n + 1` lines survive.
pub fn truncate_lines(text: &str, limit: LineLimit) -> String {
    match limit {
        LineLimit::Unlimited => text.to_string(),
        LineLimit::Lines(n) => {
            text.split('\n').take(n.saturating_add(1)).collect::<Vec<_>>().join("\n")
        }
    }
}

/// Text as printed, without the final newline a line-oriented printer adds back
fn display_text(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

/// How a report is rendered
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub show_diff: bool,
    pub limit: LineLimit,
    pub color: bool,
}

/// Outcome of comparing every discovered case against its baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub label: Label,
    pub passed: Vec<TestCase>,
    pub failed: Vec<(TestCase, Mismatch)>,
    pub no_baseline: Vec<TestCase>,
}

impl Report {
    /// Classify every case; each one lands in exactly one bucket
    pub fn aggregate<B>(
        cases: &[TestCase],
        results: &[ExecutionResult],
        baselines: &B,
        label: &Label,
    ) -> Result<Self, HarnessError>
    where
        B: BaselineLookup + ?Sized,
    {
        let by_case: HashMap<&TestCase, &ExecutionResult> =
            results.iter().map(|result| (&result.case, result)).collect();

        let mut report = Self {
            label: label.clone(),
            passed: Vec::new(),
            failed: Vec::new(),
            no_baseline: Vec::new(),
        };

        for case in cases {
            let outcome = match baselines.baseline(case, label)? {
                None => ComparisonOutcome::NoBaseline,
                Some(baseline) => match by_case.get(case) {
                    Some(result) => match &result.error {
                        Some(error) => ComparisonOutcome::Failed(Mismatch::run_error(error)),
                        None => OutputComparator::with_names(
                            baseline_file_name(case, label),
                            baseline_file_name(case, &Label::tmp()),
                        )
                        .compare(&result.output, &baseline),
                    },
                    None => {
                        ComparisonOutcome::Failed(Mismatch::run_error("no output was captured"))
                    }
                },
            };
            report.record(case.clone(), outcome);
        }

        report.passed.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        report.no_baseline.sort();

        Ok(report)
    }

    fn record(&mut self, case: TestCase, outcome: ComparisonOutcome) {
        match outcome {
            ComparisonOutcome::Passed => self.passed.push(case),
            ComparisonOutcome::Failed(mismatch) => self.failed.push((case, mismatch)),
            ComparisonOutcome::NoBaseline => self.no_baseline.push(case),
        }
    }

    /// Number of classified cases
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len() + self.no_baseline.len()
    }

    /// One-line count of each bucket
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} without baseline",
            self.passed.len(),
            self.failed.len(),
            self.no_baseline.len()
        )
    }

    /// Render the plain-text report
    pub fn render(&self, options: &RenderOptions) -> String {
        let mut text = String::new();

        self.render_section(&mut text, "Tests Passed:", &self.passed, options);
        let missing = format!("Tests with no {}:", self.label.file_suffix());
        self.render_section(&mut text, &missing, &self.no_baseline, options);

        let _ = writeln!(text, "\n{}", header("Tests Failed:", options.color));
        if self.failed.is_empty() {
            let _ = writeln!(text, "None");
        }
        for (case, mismatch) in &self.failed {
            let _ = writeln!(text, "{}", case);
            if options.show_diff {
                let _ = writeln!(text, "{}", DIVIDER);
                let diff = truncate_lines(mismatch.diff(), options.limit);
                for line in display_text(&diff).split('\n') {
                    let _ = writeln!(text, "{}", diff_line(line, options.color));
                }
                let _ = writeln!(text, "{}", DIVIDER);
            }
        }
        text.push('\n');

        text
    }

    fn render_section(
        &self,
        text: &mut String,
        title: &str,
        cases: &[TestCase],
        options: &RenderOptions,
    ) {
        let _ = writeln!(text, "\n{}", header(title, options.color));
        if cases.is_empty() {
            let _ = writeln!(text, "None");
        }
        for case in cases {
            let _ = writeln!(text, "{}", case);
        }
    }
}

fn header(title: &str, color: bool) -> String {
    if color {
        style(title).bold().to_string()
    } else {
        title.to_string()
    }
}

fn diff_line(line: &str, color: bool) -> String {
    if !color {
        return line.to_string();
    }
    if line.starts_with("+++") || line.starts_with("---") {
        style(line).bold().to_string()
    } else if line.starts_with('+') {
        style(line).green().to_string()
    } else if line.starts_with('-') {
        style(line).red().to_string()
    } else if line.starts_with("@@") {
        style(line).cyan().to_string()
    } else {
        line.to_string()
    }
}

/// Render the output of one case for print mode
pub fn render_output(case: &TestCase, result: &ExecutionResult, limit: LineLimit) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", DIVIDER);
    let _ = writeln!(text, "Output for {}:", case);
    match &result.error {
        Some(error) => {
            let _ = writeln!(text, "program did not run: {}", error);
        }
        None => {
            let shown = truncate_lines(&result.output_text(), limit);
            let _ = writeln!(text, "{}", display_text(&shown));
        }
    }
    text
}
