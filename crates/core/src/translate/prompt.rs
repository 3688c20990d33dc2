//! Prompt construction and parsing of the labelled `[L<n>]` line protocol.

use super::IndexedLine;
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::trace;

/// Maximum number of glossary terms rendered into a prompt.
pub const MAX_GLOSSARY_TERMS: usize = 20;

const BASE_SYSTEM_PROMPT: &str = "You are a professional subtitle localization expert.
Translate the dialogue into natural, contemporary {lang} while keeping the tone of each scene.

Rules:
1. Never translate or alter character names, place names, honorifics or company names.
2. The output MUST have exactly the same number of lines as the input. Never merge or add lines.
3. Output only the translated dialogue. No timestamps, numbers or commentary.
4. Keep every line short enough to read comfortably as a subtitle.";

/// User-supplied instructions and terminology appended to the system prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptContext {
    pub instructions: String,
    /// Lower-cased source term to its fixed translation.
    pub glossary: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct GlossaryEntry {
    #[serde(default)]
    source: String,
    #[serde(default)]
    target: String,
}

impl PromptContext {
    /// Context with trimmed `instructions` and an empty glossary.
    pub fn new(instructions: &str) -> Self {
        Self {
            instructions: instructions.trim().to_string(),
            glossary: BTreeMap::new(),
        }
    }

    /// Add a term; entries with an empty side are ignored.
    pub fn add_term(&mut self, source: &str, target: &str) {
        let (source, target) = (source.trim(), target.trim());
        if !source.is_empty() && !target.is_empty() {
            self.glossary.insert(source.to_lowercase(), target.to_string());
        }
    }

    /// Load glossary terms from a JSON array of `{"source": .., "target": ..}`.
    pub fn load_glossary(&mut self, path: &Path) -> Result<()> {
        trace!("load_glossary path={}", path.display());
        let text = std::fs::read_to_string(path)?;
        let entries: Vec<GlossaryEntry> = serde_json::from_str(&text)?;
        for e in entries {
            self.add_term(&e.source, &e.target);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty() && self.glossary.is_empty()
    }

    /// Render the glossary and instructions as prompt text.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if !self.glossary.is_empty() {
            let terms: Vec<String> = self
                .glossary
                .iter()
                .take(MAX_GLOSSARY_TERMS)
                .map(|(k, v)| format!("'{k}' → '{v}'"))
                .collect();
            parts.push(format!(
                "Important terminology to maintain consistency: {}",
                terms.join(", ")
            ));
        }
        if !self.instructions.is_empty() {
            parts.push(format!("Additional Instructions: {}", self.instructions));
        }
        parts.join("\n")
    }
}

/// Base instructions for `language`, followed by the rendered context if any.
pub fn system_prompt(language: &str, context: &PromptContext) -> String {
    let base = BASE_SYSTEM_PROMPT.replace("{lang}", language);
    if context.is_empty() {
        base
    } else {
        format!("{base}\n\n{}", context.render())
    }
}

/// Request body text: the protocol rules, then one `[L<n>] text` per line.
pub fn user_prompt(lines: &[IndexedLine]) -> String {
    let labelled: Vec<String> = lines
        .iter()
        .map(|l| format!("[L{}] {}", l.index, l.text))
        .collect();
    format!(
        "You will receive several subtitle lines in English.\n\
         For EACH line:\n\
         - Translate it separately into the requested language.\n\
         - KEEP the same label, like [L1], [L2], etc.\n\
         - Do NOT merge multiple source lines into one.\n\
         - Do NOT skip any line.\n\
         - Output MUST contain all labels in order.\n\n\
         Lines:\n{}",
        labelled.join("\n")
    )
}

/// Place each `[L<n>] text` line at position `n`; anything else is dropped.
///
/// Always returns exactly `expected` lines, with empty text where the model
/// skipped a label.
pub fn parse_labeled_output(raw: &str, expected: usize) -> Vec<IndexedLine> {
    let mut out: Vec<IndexedLine> = (1..=expected)
        .map(|index| IndexedLine {
            index,
            text: String::new(),
        })
        .collect();
    for line in raw.lines().map(str::trim) {
        let Some(rest) = line.strip_prefix("[L") else {
            continue;
        };
        let Some((label, text)) = rest.split_once(']') else {
            continue;
        };
        match label.parse::<usize>() {
            Ok(n) if (1..=expected).contains(&n) => out[n - 1].text = text.trim().to_string(),
            _ => trace!("ignoring output line with label {label:?}"),
        }
    }
    out
}
