//! Output canonicalization for delimiter-bounded token groups
//!
//! Programs under test print some results as groups like `_b_a_`, where the
//! order of tokens inside a group carries no meaning. Normalization sorts the
//! tokens of such lines so two outputs compare equal regardless of that order,
//! while every other line is compared verbatim.

/// Canonicalizes program output line by line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputNormalizer {
    delimiter: char,
}

impl OutputNormalizer {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Normalize a whole output text.
    ///
    /// Surrounding whitespace of the text and of each line is dropped; line
    /// order is preserved. The result is a fixed point: normalizing it again
    /// returns the same text.
    pub fn normalize(&self, output: &str) -> String {
        let output = output.trim();
        if output.is_empty() {
            return String::new();
        }

        output.split('\n').map(|line| self.normalize_line(line)).collect::<Vec<_>>().join("\n")
    }

    /// Normalize a single line
    pub fn normalize_line(&self, line: &str) -> String {
        let line = line.trim();
        if !line.contains(self.delimiter) {
            return line.to_string();
        }

        let mut tokens: Vec<&str> = line
            .trim_matches(self.delimiter)
            .split(self.delimiter)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();

        if tokens.is_empty() {
            return line.to_string();
        }

        tokens.sort_unstable();

        let delimiter = self.delimiter.to_string();
        let mut normalized = tokens.join(delimiter.as_str());
        normalized.push(self.delimiter);
        normalized
    }
}

impl Default for OutputNormalizer {
    fn default() -> Self {
        Self::new('_')
    }
}
