//! This module is responsible for SRT parsing and rendering.
//! Parsing is total: malformed segments are skipped, never reported.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::trace;

/// Maximum number of characters kept by [`SubtitleBlock::text_preview`].
pub const PREVIEW_CHARS: usize = 80;

static TIMESTAMP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})$")
        .expect("timestamp pattern is valid")
});

static DECIMAL_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("digit pattern is valid"));

/// Represents a single SRT block (optional index, time range, text lines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleBlock {
    /// Ordinal as written in the file. Advisory only, never an alignment key.
    pub index: Option<u32>,
    pub start_time: String,
    pub end_time: String,
    pub text_lines: Vec<String>,
    /// 1-based line where the block began, for diagnostics.
    pub line_number: usize,
}

impl SubtitleBlock {
    /// True when at least one text line is non-blank.
    pub fn has_text(&self) -> bool {
        self.text_lines.iter().any(|l| !l.trim().is_empty())
    }

    /// First text line, trimmed and cut to [`PREVIEW_CHARS`] characters.
    pub fn text_preview(&self) -> String {
        self.text_lines
            .first()
            .map(|l| l.trim().chars().take(PREVIEW_CHARS).collect())
            .unwrap_or_default()
    }
}

/// Parse a `HH:MM:SS,mmm --> HH:MM:SS,mmm` line into its start and end stamps.
pub fn parse_timestamp_line(line: &str) -> Option<(String, String)> {
    let caps = TIMESTAMP_LINE.captures(line.trim())?;
    let start = format!("{}:{}:{},{}", &caps[1], &caps[2], &caps[3], &caps[4]);
    let end = format!("{}:{}:{},{}", &caps[5], &caps[6], &caps[7], &caps[8]);
    Some((start, end))
}

/// Purely numeric in any script: every char is a Unicode decimal digit.
fn is_numeric(line: &str) -> bool {
    DECIMAL_DIGITS.is_match(line.trim())
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0u8; 4];
    DECIMAL_DIGITS.is_match(c.encode_utf8(&mut buf))
}

/// Value of a decimal digit. Every script's digits are a contiguous run of
/// ten starting at its zero, and adjacent runs start on a zero too.
fn digit_value(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    if !is_decimal_digit(c) {
        return None;
    }
    let mut offset = 0;
    while let Some(prev) = char::from_u32(c as u32 - offset - 1) {
        if !is_decimal_digit(prev) {
            break;
        }
        offset += 1;
    }
    Some(offset % 10)
}

/// Parse a numeric line as an index; `None` when it overflows `u32`.
fn parse_index(line: &str) -> Option<u32> {
    line.trim().chars().try_fold(0u32, |acc, c| {
        acc.checked_mul(10)?.checked_add(digit_value(c)?)
    })
}

/// Decide whether `line` opens the next block rather than being dialogue.
///
/// A purely numeric line is only a caption number when the line after it is
/// a timestamp line; otherwise it is dialogue that happens to be a number.
pub fn looks_like_block_boundary(line: &str, next_line: Option<&str>) -> bool {
    is_numeric(line) && next_line.is_some_and(|n| parse_timestamp_line(n).is_some())
}

/// Count raw lines matching the timestamp pattern, independent of block parsing.
pub fn count_timestamp_lines(input: &str) -> usize {
    normalize_newlines(input)
        .split('\n')
        .filter(|l| parse_timestamp_line(l).is_some())
        .count()
}

fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Parse SRT text into a list of blocks, preserving order.
pub fn parse(input: &str) -> Vec<SubtitleBlock> {
    let text = normalize_newlines(input);
    let lines: Vec<&str> = text.split('\n').collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        while i < lines.len() && lines[i].trim().is_empty() {
            i += 1;
        }
        if i >= lines.len() {
            break;
        }

        let line_number = i + 1;
        let mut index = None;
        let mut current = lines[i].trim();
        if is_numeric(current) {
            index = parse_index(current);
            i += 1;
            if i >= lines.len() {
                break;
            }
            current = lines[i].trim();
        }

        let Some((start_time, end_time)) = parse_timestamp_line(current) else {
            trace!("skipping unparseable line {}", i + 1);
            i += 1;
            continue;
        };
        i += 1;

        let mut text_lines = Vec::new();
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty()
                || looks_like_block_boundary(line, lines.get(i + 1).copied())
                || parse_timestamp_line(line).is_some()
            {
                break;
            }
            text_lines.push(line.trim_end().to_string());
            i += 1;
        }

        blocks.push(SubtitleBlock {
            index,
            start_time,
            end_time,
            text_lines,
            line_number,
        });
    }
    trace!("parsed {} blocks from {} lines", blocks.len(), lines.len());
    blocks
}

/// Format SRT blocks back to text.
/// Blocks without an index are numbered by their 1-based position.
pub fn format(blocks: &[SubtitleBlock]) -> String {
    let mut out = String::new();
    for (pos, block) in blocks.iter().enumerate() {
        let index = block.index.map_or(pos + 1, |i| i as usize);
        out.push_str(&format!(
            "{}\n{} --> {}\n",
            index, block.start_time, block.end_time
        ));
        for line in &block.text_lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_block_without_index() {
        let blocks = parse("00:00:01,000 --> 00:00:02,000\nHello\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, None);
        assert_eq!(blocks[0].text_lines, vec!["Hello".to_string()]);
        assert_eq!(blocks[0].line_number, 1);
    }

    #[test]
    fn keeps_silent_blocks() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\n\n2\n00:00:03,000 --> 00:00:04,000\nText\n";
        let blocks = parse(input);
        assert_eq!(blocks.len(), 2);
        assert!(!blocks[0].has_text());
        assert!(blocks[1].has_text());
        assert_eq!(blocks[1].index, Some(2));
        assert_eq!(blocks[1].start_time, "00:00:03,000");
        assert_eq!(blocks[1].end_time, "00:00:04,000");
    }

    #[test]
    fn normalizes_crlf_and_ignores_surrounding_blank_lines() {
        let input = concat!(
            "\r\n\r\n1\r\n00:00:00,000 --> 00:00:05,000\r\nHello\r\n\r\n",
            "2\r00:00:05,000 --> 00:00:10,000\rWorld\r\n\r\n\r\n",
        );
        let blocks = parse(input);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text_lines, vec!["Hello".to_string()]);
        assert_eq!(blocks[1].text_lines, vec!["World".to_string()]);
        assert_eq!(blocks[0].line_number, 3);
    }

    #[test]
    fn collects_multiline_text_right_trimmed() {
        let input = concat!(
            "1\n00:00:00,000 --> 00:00:05,000\n  Line 1  \nLine 2\nLine 3\n\n",
            "2\n00:00:05,000 --> 00:00:10,000\nAnother block\n",
        );
        let blocks = parse(input);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text_lines, vec!["  Line 1", "Line 2", "Line 3"]);
        assert_eq!(blocks[0].text_preview(), "Line 1");
    }

    #[test]
    fn numeric_dialogue_is_text_unless_followed_by_timestamp() {
        let input = concat!(
            "1\n00:00:01,000 --> 00:00:02,000\nHow many?\n42\n",
            "2\n00:00:03,000 --> 00:00:04,000\nNext\n",
        );
        let blocks = parse(input);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text_lines, vec!["How many?", "42"]);
        assert_eq!(blocks[1].index, Some(2));
    }

    #[test]
    fn non_ascii_digit_line_before_timestamp_is_an_index() {
        let input = concat!(
            "00:00:01,000 --> 00:00:02,000\n\u{0662}\n",
            "00:00:03,000 --> 00:00:04,000\nHi\n",
        );
        let blocks = parse(input);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].text_lines.is_empty());
        assert!(!blocks[0].has_text());
        assert_eq!(blocks[1].index, Some(2));
        assert_eq!(blocks[1].text_lines, vec!["Hi"]);
    }

    #[test]
    fn parses_indices_in_other_scripts() {
        assert_eq!(parse_index("\u{0661}\u{0660}"), Some(10));
        assert_eq!(parse_index("\u{0969}7"), Some(37));
        assert_eq!(parse_index("99999999999"), None);
        assert!(is_numeric(" \u{0662}\u{0663} "));
        assert!(!is_numeric("\u{00bd}"));
        assert!(!is_numeric(""));
    }

    #[test]
    fn recovers_from_missing_blank_separator() {
        let input = "00:00:01,000 --> 00:00:02,000\nFirst\n00:00:03,000 --> 00:00:04,000\nSecond\n";
        let blocks = parse(input);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text_lines, vec!["First"]);
        assert_eq!(blocks[1].text_lines, vec!["Second"]);
    }

    #[test]
    fn skips_malformed_segments() {
        let input = concat!(
            "1\n00:00:00,000 --> 00:01:00,000\nLine 1\n\n",
            "2\nINVALID TIMESTAMP\nThis is broken\n\n",
            "3\n00:02:00,000 --> 00:03:00,000\nLine 3\n",
        );
        let blocks = parse(input);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].index, Some(3));
        assert_eq!(count_timestamp_lines(input), 2);
    }

    #[test]
    fn accepts_loose_arrow_spacing_but_not_short_fields() {
        assert_eq!(
            parse_timestamp_line("  00:00:01,000-->00:00:02,500 "),
            Some(("00:00:01,000".to_string(), "00:00:02,500".to_string()))
        );
        assert_eq!(parse_timestamp_line("0:00:01,000 --> 00:00:02,000"), None);
        assert_eq!(parse_timestamp_line("00:00:01.000 --> 00:00:02,000"), None);
    }

    #[test]
    fn boundary_predicate_needs_timestamp_lookahead() {
        assert!(looks_like_block_boundary("12", Some("00:00:01,000 --> 00:00:02,000")));
        assert!(!looks_like_block_boundary("12", Some("twelve")));
        assert!(!looks_like_block_boundary("12", None));
        assert!(!looks_like_block_boundary("12a", Some("00:00:01,000 --> 00:00:02,000")));
    }

    #[test]
    fn empty_and_garbage_inputs_yield_no_blocks() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n  \n").is_empty());
        assert!(parse("just some words\n7\n").is_empty());
    }

    #[test]
    fn preview_is_bounded() {
        let long = "x".repeat(200);
        let blocks = parse(&format!("00:00:01,000 --> 00:00:02,000\n{long}\n"));
        assert_eq!(blocks[0].text_preview().chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn formats_back_to_srt() {
        let input = "1\n00:00:00,000 --> 00:00:01,000\nHello\n\n";
        let blocks = parse(input);
        assert_eq!(format(&blocks), input);

        let unnumbered = parse("00:00:00,000 --> 00:00:01,000\nHi\n");
        assert_eq!(format(&unnumbered), "1\n00:00:00,000 --> 00:00:01,000\nHi\n\n");
    }
}
