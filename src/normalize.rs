//! Text normalizer: raw OCR output -> canonical line-oriented form.

use serde::{Deserialize, Serialize};

/// Cleaned OCR text. `lines` gives extractors line boundaries; `text` is
/// the same lines re-joined with newlines for multi-line regex patterns
/// ("value on the line after a label" and block captures).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub lines: Vec<String>,
    pub text: String,
}

impl NormalizedDocument {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Map common typographic OCR artifacts to ASCII.
fn ascii_fold(c: char) -> char {
    match c {
        '\u{2013}' | '\u{2014}' => '-',         // en/em dash
        '\u{2018}' | '\u{2019}' | '\u{2032}' => '\'', // curly/prime apostrophes
        '\u{201C}' | '\u{201D}' => '"',          // curly double quotes
        other => other,
    }
}

/// Collapse internal runs of spaces/tabs and trim the ends.
fn collapse_ws(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize raw OCR text. Total: never fails, and an empty input yields
/// an empty document. Idempotent: normalizing `doc.text` reproduces `doc`.
pub fn normalize(raw: &str) -> NormalizedDocument {
    let folded: String = raw.chars().filter(|c| *c != '\r').map(ascii_fold).collect();

    let lines: Vec<String> = folded
        .split('\n')
        .map(collapse_ws)
        .filter(|l| !l.is_empty())
        .collect();

    let text = lines.join("\n");
    NormalizedDocument { lines, text }
}
