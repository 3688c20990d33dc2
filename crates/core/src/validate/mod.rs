//! Structural validation of a translated subtitle file against its source.
//!
//! Blocks are aligned by position only. The validator never fails: every
//! discrepancy is reported as a [`ValidationIssue`] inside the returned
//! [`ValidationResult`].

use crate::srt::{self, SubtitleBlock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, trace};

/// Closed set of structural problems the validator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    EmptyFile,
    BlockCountMismatch,
    TimestampMismatch,
    MissingDialogue,
}

impl IssueType {
    /// Snake-case name, as serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::EmptyFile => "empty_file",
            IssueType::BlockCountMismatch => "block_count_mismatch",
            IssueType::TimestampMismatch => "timestamp_mismatch",
            IssueType::MissingDialogue => "missing_dialogue",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity. Current rules only emit `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// One detected discrepancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub issue_type: IssueType,
    pub severity: Severity,
    /// 1-based block position, `None` for file-level issues.
    pub block_index: Option<usize>,
    pub message: String,
    /// Free-form payload, never interpreted by the validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ValidationIssue {
    fn error(
        issue_type: IssueType,
        block_index: Option<usize>,
        message: String,
        details: Option<Value>,
    ) -> Self {
        Self {
            issue_type,
            severity: Severity::Error,
            block_index,
            message,
            details,
        }
    }
}

/// Verdict for one translated file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub filename: String,
    pub target_language: String,
    pub passed: bool,
    pub issues: Vec<ValidationIssue>,
    pub en_block_count: usize,
    pub target_block_count: usize,
    /// Percentage in `[0, 100]` of checked blocks without an error.
    pub match_rate: f64,
}

impl ValidationResult {
    /// Issues with [`Severity::Error`].
    pub fn error_count(&self) -> usize {
        self.count_severity(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count_severity(Severity::Warning)
    }

    fn count_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Validate `candidate` against `reference`, aligning blocks by position.
pub fn validate(
    reference: &[SubtitleBlock],
    candidate: &[SubtitleBlock],
    filename: &str,
    target_language: &str,
) -> ValidationResult {
    trace!(
        "validate filename={} lang={} reference={} candidate={}",
        filename,
        target_language,
        reference.len(),
        candidate.len()
    );
    let short_circuit = |issue: ValidationIssue| ValidationResult {
        filename: filename.to_string(),
        target_language: target_language.to_string(),
        passed: false,
        issues: vec![issue],
        en_block_count: reference.len(),
        target_block_count: candidate.len(),
        match_rate: 0.0,
    };

    if candidate.is_empty() {
        debug!("{filename} [{target_language}]: candidate has no blocks");
        return short_circuit(ValidationIssue::error(
            IssueType::EmptyFile,
            None,
            "Target subtitle file is empty".to_string(),
            None,
        ));
    }

    // Positional pairing is meaningless once the counts diverge.
    if reference.len() != candidate.len() {
        debug!(
            "{filename} [{target_language}]: block count {} vs {}",
            reference.len(),
            candidate.len()
        );
        return short_circuit(ValidationIssue::error(
            IssueType::BlockCountMismatch,
            None,
            format!(
                "Block count mismatch: {} vs {}",
                reference.len(),
                candidate.len()
            ),
            Some(json!({
                "en_count": reference.len(),
                "target_count": candidate.len(),
                "difference": reference.len().abs_diff(candidate.len()),
            })),
        ));
    }

    let mut issues = Vec::new();
    let mut checked_blocks = 0usize;
    let mut error_count = 0usize;

    for (i, (en, tg)) in reference.iter().zip(candidate).enumerate() {
        if !en.has_text() {
            continue;
        }
        checked_blocks += 1;
        let position = i + 1;

        if en.start_time != tg.start_time || en.end_time != tg.end_time {
            issues.push(ValidationIssue::error(
                IssueType::TimestampMismatch,
                Some(position),
                format!("Timestamp mismatch at block {position}"),
                Some(json!({
                    "en_start": en.start_time,
                    "target_start": tg.start_time,
                })),
            ));
            error_count += 1;
            continue;
        }

        if !tg.has_text() {
            issues.push(ValidationIssue::error(
                IssueType::MissingDialogue,
                Some(position),
                format!("Missing translation in block {position}"),
                Some(json!({ "en_text": en.text_preview() })),
            ));
            error_count += 1;
        }
    }

    let match_rate = if checked_blocks > 0 {
        (checked_blocks - error_count) as f64 / checked_blocks as f64 * 100.0
    } else {
        100.0
    };
    debug!(
        "{filename} [{target_language}]: checked={checked_blocks} errors={error_count} \
         match_rate={match_rate:.1}"
    );

    ValidationResult {
        filename: filename.to_string(),
        target_language: target_language.to_string(),
        passed: error_count == 0 && issues.is_empty(),
        issues,
        en_block_count: reference.len(),
        target_block_count: candidate.len(),
        match_rate,
    }
}

/// Parse both texts and validate the candidate against the reference.
pub fn validate_texts(
    reference: &str,
    candidate: &str,
    filename: &str,
    target_language: &str,
) -> ValidationResult {
    validate(
        &srt::parse(reference),
        &srt::parse(candidate),
        filename,
        target_language,
    )
}
