//! Pass/fail oracle for a single fixture

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::execution::{ExecutionMode, ExecutionResult};
use crate::normalize::OutputNormalizer;

/// Represents the result of comparing reference vs produced output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputComparison {
    /// Whether the normalized outputs are identical
    pub matches: bool,
    /// Unified diff of the normalized outputs (empty when they match)
    pub diff: String,
    /// Number of added lines
    pub added_lines: usize,
    /// Number of removed lines
    pub removed_lines: usize,
}

impl OutputComparison {
    pub fn identical() -> Self {
        Self { matches: true, diff: String::new(), added_lines: 0, removed_lines: 0 }
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }
}

/// The two independent checks that decide a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub output_correct: bool,
    pub memory_safe: bool,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.output_correct && self.memory_safe
    }
}

/// Output comparison engine
#[derive(Debug, Clone, Default)]
pub struct OutputComparator {
    normalizer: OutputNormalizer,
}

impl OutputComparator {
    pub fn new(normalizer: OutputNormalizer) -> Self {
        Self { normalizer }
    }

    /// Exact equality of both texts after normalization
    pub fn outputs_match(&self, reference: &str, current: &str) -> bool {
        self.normalizer.normalize(reference) == self.normalizer.normalize(current)
    }

    /// Compare normalized outputs and describe the differences
    pub fn compare_output(&self, reference: &str, current: &str) -> OutputComparison {
        let expected = self.normalizer.normalize(reference);
        let actual = self.normalizer.normalize(current);

        if expected == actual {
            return OutputComparison::identical();
        }

        generate_diff(&expected, &actual)
    }

    /// Decide both verdicts for one execution.
    ///
    /// Memory safety is the detector's zero exit status when the detector ran,
    /// and holds trivially otherwise.
    pub fn evaluate(&self, reference: &str, result: &ExecutionResult) -> Verdict {
        let output_correct = self.outputs_match(reference, &result.stdout);
        let memory_safe = match result.mode {
            ExecutionMode::Detector => result.exit_code == 0,
            ExecutionMode::Plain => true,
        };

        Verdict { output_correct, memory_safe }
    }
}

/// Generate a unified diff between expected and actual text
fn generate_diff(expected: &str, actual: &str) -> OutputComparison {
    let diff = TextDiff::from_lines(expected, actual);

    let mut diff_output = String::new();
    let mut added_lines = 0;
    let mut removed_lines = 0;

    diff_output.push_str("--- expected\n");
    diff_output.push_str("+++ actual\n");

    for group in diff.grouped_ops(3) {
        if let Some((first, last)) = group.first().zip(group.last()) {
            let old_start = first.old_range().start;
            let new_start = first.new_range().start;
            diff_output.push_str(&format!(
                "@@ -{},{} +{},{} @@\n",
                old_start + 1,
                last.old_range().end - old_start,
                new_start + 1,
                last.new_range().end - new_start,
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
                diff_output.push_str(change.as_str().unwrap_or_default());
                if change.missing_newline() {
                    diff_output.push('\n');
                }
            }
        }
    }

    OutputComparison { matches: false, diff: diff_output, added_lines, removed_lines }
}
