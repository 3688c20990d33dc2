//! Rough token and price estimate for translating a set of files.

use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{trace, warn};

/// Tokens charged per file for the system prompt.
pub const SYSTEM_PROMPT_TOKENS: u64 = 9;
/// Output tokens expected per input token.
pub const OUTPUT_RATIO: f64 = 1.2;
/// Margin applied to both token totals.
pub const SAFETY_BUFFER: f64 = 1.15;
pub const USD_TO_INR: f64 = 83.0;

/// Price per token in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
    pub confidence: &'static str,
}

/// Per-token prices for the models with a known rate.
pub fn model_price(model: &str) -> Option<ModelPrice> {
    let (input, output) = match model {
        "gpt-4o-mini" => (0.000_000_15, 0.000_000_6),
        "gpt-5-mini" => (0.000_000_075, 0.000_000_3),
        "gpt-4o" => (0.000_002_5, 0.000_01),
        "gpt-5" => (0.000_003, 0.000_012),
        _ => return None,
    };
    Some(ModelPrice {
        input,
        output,
        confidence: "high",
    })
}

/// Totals reported by `analyze`, serialized with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub files: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
    #[serde(rename = "costINR")]
    pub cost_inr: f64,
    pub confidence: String,
    pub file_names: Vec<String>,
}

/// About four characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Only the lines a translator would actually see.
fn dialogue(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains("-->"))
        .filter(|l| !l.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Estimate tokens and cost of translating `files` with `model`.
/// Unreadable files are skipped with a warning.
pub fn estimate(files: &[PathBuf], model: &str) -> Result<CostEstimate> {
    trace!("estimate files={} model={}", files.len(), model);
    let mut input = 0u64;
    let mut output = 0u64;
    for path in files {
        let content = match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(err) => {
                warn!("skipping {}: {err}", path.display());
                continue;
            }
        };
        let tokens = estimate_tokens(&dialogue(&content));
        input += tokens + SYSTEM_PROMPT_TOKENS;
        output += (tokens as f64 * OUTPUT_RATIO) as u64;
    }
    let input = (input as f64 * SAFETY_BUFFER) as u64;
    let output = (output as f64 * SAFETY_BUFFER) as u64;

    let (cost_usd, confidence) = match model_price(model) {
        Some(p) => (input as f64 * p.input + output as f64 * p.output, p.confidence),
        None => (0.0, "unknown"),
    };
    Ok(CostEstimate {
        files: files.len(),
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
        cost_usd,
        cost_inr: cost_usd * USD_TO_INR,
        confidence: confidence.to_string(),
        file_names: files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counts_only_dialogue() {
        let text = dialogue(concat!(
            "1\n00:00:01,000 --> 00:00:02,000\nHello there\n\n",
            "2\n00:00:03,000 --> 00:00:04,000\n42 apples\n",
        ));
        assert_eq!(text, "Hello there\n42 apples");
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn estimates_known_and_unknown_models() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ep1.srt");
        // 40 characters of dialogue -> 10 tokens
        let dialogue_line = "a".repeat(40);
        fs::write(&path, format!("1\n00:00:01,000 --> 00:00:02,000\n{dialogue_line}\n")).unwrap();
        let files = vec![path];

        let est = estimate(&files, "gpt-4o").unwrap();
        assert_eq!(est.files, 1);
        assert_eq!(est.input_tokens, 21); // (10 + 9) * 1.15
        assert_eq!(est.output_tokens, 13); // 12 * 1.15
        assert_eq!(est.total_tokens, 34);
        assert!((est.cost_usd - (21.0 * 0.0000025 + 13.0 * 0.00001)).abs() < 1e-12);
        assert!((est.cost_inr - est.cost_usd * 83.0).abs() < 1e-12);
        assert_eq!(est.file_names, vec!["ep1.srt".to_string()]);

        let unknown = estimate(&files, "mystery").unwrap();
        assert_eq!(unknown.cost_usd, 0.0);
        assert_eq!(unknown.confidence, "unknown");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let est = estimate(&[], "gpt-4o-mini").unwrap();
        let json = serde_json::to_value(&est).unwrap();
        assert_eq!(json["totalTokens"], 0);
        assert_eq!(json["costUSD"], 0.0);
        assert!(json.get("fileNames").is_some());
    }
}
