//! Word-bounded, case-insensitive phrase search reporting char offsets.

use regex::{Regex, RegexBuilder};

use crate::normalize::Normalized;
use crate::{Result, Span};

/// Compiled search pattern for one phrase.
#[derive(Debug, Clone)]
pub struct PhrasePattern {
    regex: Regex,
}

impl PhrasePattern {
    pub fn new(phrase: &str) -> Result<Self> {
        let regex = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
            .case_insensitive(true)
            .build()?;
        Ok(Self { regex })
    }

    /// Non-overlapping matches in `text`, as char offsets, left to right.
    pub fn find(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut byte_cursor = 0usize;
        let mut char_cursor = 0usize;
        for m in self.regex.find_iter(text) {
            char_cursor += text[byte_cursor..m.start()].chars().count();
            let start = char_cursor;
            char_cursor += m.as_str().chars().count();
            byte_cursor = m.end();
            spans.push(Span::new(start, char_cursor));
        }
        spans
    }

    /// Matches in the cleaned text, mapped back to raw-text coordinates.
    pub fn find_remapped(&self, normalized: &Normalized) -> Vec<Span> {
        self.find(&normalized.text)
            .into_iter()
            .map(|span| normalized.offsets.remap(span))
            .collect()
    }
}

/// One-shot search for `phrase` in `text`.
pub fn locate(phrase: &str, text: &str) -> Result<Vec<Span>> {
    Ok(PhrasePattern::new(phrase)?.find(text))
}
