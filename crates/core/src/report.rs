//! Aggregated outcome of a run over many files and languages.
//! Each worker produces its own results; they are merged at the end.

use crate::validate::ValidationResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A file/language pair that could not be validated at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub filename: String,
    pub target_language: String,
    pub message: String,
}

/// Validation results plus the pairs that never produced one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub results: Vec<ValidationResult>,
    pub failures: Vec<Failure>,
}

/// Headline numbers for a [`Report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub issues_by_type: BTreeMap<String, usize>,
    pub average_match_rate: f64,
}

impl Report {
    /// Record the verdict for one file/language pair.
    pub fn push_result(&mut self, result: ValidationResult) {
        self.results.push(result);
    }

    /// Record a pair that could not be translated or read.
    pub fn push_failure(
        &mut self,
        filename: &str,
        target_language: &str,
        message: impl Into<String>,
    ) {
        self.failures.push(Failure {
            filename: filename.to_string(),
            target_language: target_language.to_string(),
            message: message.into(),
        });
    }

    /// Append another report's results and failures, keeping their order.
    pub fn merge(&mut self, other: Report) {
        self.results.extend(other.results);
        self.failures.extend(other.failures);
    }

    /// True when every result passed and nothing failed outright.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.results.iter().all(|r| r.passed)
    }

    /// Every failing `(filename, language)` pair, results first.
    pub fn failed_pairs(&self) -> Vec<(String, String)> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| (r.filename.clone(), r.target_language.clone()))
            .chain(
                self.failures
                    .iter()
                    .map(|f| (f.filename.clone(), f.target_language.clone())),
            )
            .collect()
    }

    /// Pass/fail counts, issue counts by type and mean match rate.
    /// Failures count as failed files; the mean covers results only.
    pub fn summary(&self) -> Summary {
        let mut issues_by_type = BTreeMap::new();
        for issue in self.results.iter().flat_map(|r| &r.issues) {
            *issues_by_type.entry(issue.issue_type.to_string()).or_insert(0) += 1;
        }
        let passed = self.results.iter().filter(|r| r.passed).count();
        let average_match_rate = if self.results.is_empty() {
            0.0
        } else {
            self.results.iter().map(|r| r.match_rate).sum::<f64>() / self.results.len() as f64
        };
        Summary {
            files_checked: self.results.len(),
            passed,
            failed: self.results.len() - passed + self.failures.len(),
            issues_by_type,
            average_match_rate,
        }
    }
}

impl FromIterator<Report> for Report {
    fn from_iter<I: IntoIterator<Item = Report>>(iter: I) -> Self {
        let mut out = Report::default();
        for r in iter {
            out.merge(r);
        }
        out
    }
}
