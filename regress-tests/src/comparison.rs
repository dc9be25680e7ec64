//! Output comparison and diff generation functionality

use similar::{ChangeTag, TextDiff};

/// Lines of unchanged context around each diff hunk
const CONTEXT_LINES: usize = 3;

/// Classification of one test case against its baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// Current output is identical to the baseline
    Passed,
    /// Current output differs from the baseline
    Failed(Mismatch),
    /// No baseline exists for the active label
    NoBaseline,
}

/// Details of a failed comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Unified diff from baseline to current output
    pub diff: String,
    /// Number of lines only present in the current output
    pub added_lines: usize,
    /// Number of lines only present in the baseline
    pub removed_lines: usize,
}

impl Mismatch {
    /// A mismatch for a case whose program never produced output
    pub fn run_error(message: &str) -> Self {
        Self { diff: format!("program did not run: {}", message), added_lines: 0, removed_lines: 0 }
    }

    /// Get the diff string
    pub fn diff(&self) -> &str {
        &self.diff
    }
}

/// Output comparison engine
///
/// Equality is exact over raw bytes: trailing whitespace, line endings, the
/// final newline and invalid UTF-8 all count. Text is decoded only to render
/// the diff.
#[derive(Debug, Clone)]
pub struct OutputComparator {
    baseline_name: String,
    current_name: String,
}

impl OutputComparator {
    /// Create a comparator labelling the diff sides
    pub fn with_names(baseline_name: impl Into<String>, current_name: impl Into<String>) -> Self {
        Self { baseline_name: baseline_name.into(), current_name: current_name.into() }
    }

    /// Compare current output with the saved baseline
    pub fn compare(
        &self,
        current: impl AsRef<[u8]>,
        baseline: impl AsRef<[u8]>,
    ) -> ComparisonOutcome {
        let (current, baseline) = (current.as_ref(), baseline.as_ref());
        if current == baseline {
            return ComparisonOutcome::Passed;
        }

        ComparisonOutcome::Failed(self.generate_diff(baseline, current))
    }

    /// Generate a unified diff between baseline and current output
    fn generate_diff(&self, baseline: &[u8], current: &[u8]) -> Mismatch {
        let diff = TextDiff::from_lines(baseline, current);

        let mut diff_output = String::new();
        let mut added_lines = 0;
        let mut removed_lines = 0;

        diff_output.push_str(&format!("--- {}\n", self.baseline_name));
        diff_output.push_str(&format!("+++ {}\n", self.current_name));

        for group in diff.grouped_ops(CONTEXT_LINES) {
            if let Some((first, last)) = group.first().zip(group.last()) {
                let old_start = first.old_range().start;
                let new_start = first.new_range().start;
                diff_output.push_str(&format!(
                    "@@ -{} +{} @@\n",
                    hunk_range(old_start, last.old_range().end - old_start),
                    hunk_range(new_start, last.new_range().end - new_start),
                ));
            }

            for op in group {
                for change in diff.iter_changes(&op) {
                    let prefix = match change.tag() {
                        ChangeTag::Delete => {
                            removed_lines += 1;
                            "-"
                        }
                        ChangeTag::Insert => {
                            added_lines += 1;
                            "+"
                        }
                        ChangeTag::Equal => " ",
                    };

                    diff_output.push_str(prefix);
                    diff_output.push_str(&change.to_string_lossy());
                    if change.missing_newline() {
                        diff_output.push_str("\n\\ No newline at end of file\n");
                    }
                }
            }
        }

        Mismatch { diff: diff_output, added_lines, removed_lines }
    }
}

/// Format a hunk range the way `diff -u` does
fn hunk_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{},0", start),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, len),
    }
}
