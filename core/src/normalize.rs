//! Markup stripping with a reversible offset table.
//!
//! Every masking pass overwrites matched characters with [`SENTINEL`] one for
//! one, so absolute positions stay valid until the final compaction. Passes
//! run in a fixed order: later patterns see the sentinels left by earlier ones.

use once_cell::sync::Lazy;
use regex::{Captures, Match, Regex};

use crate::Span;

/// Placeholder for masked characters. Private use, never a word character.
pub const SENTINEL: char = '\u{E000}';

static EMPHASIS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_([^_]+)_").expect("valid emphasis regex"));

static FRONT_MATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^---[\s\S]+?---").expect("valid front matter regex"));
static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%%[\s\S]+?%%").expect("valid comment regex"));
static CODE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^```[\s\S]+?```").expect("valid code fence regex"));
static BASE64_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[.*?\]\(data:image/[a-zA-Z]+;base64,[^)]+\)").expect("valid image regex")
});
static DISPLAY_MATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$[^$]+?\$\$").expect("valid display math regex"));
static INLINE_MATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[^$]+?\$").expect("valid inline math regex"));
static BACKTICK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`").expect("valid backtick regex"));
static HASH_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\S+").expect("valid tag regex"));
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#+\s+").expect("valid heading regex"));
static FOOTNOTE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\^\d+\]").expect("valid footnote regex"));
static FOOTNOTE_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\[\^\d+\]:\s*\[\[.*\]\]\s*$").expect("valid footnote definition regex")
});
static LONG_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{5,}(_\d+)*\b").expect("valid id regex"));
static SHORT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}\b").expect("valid number regex"));

static PIPED_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^|\]]+)\|([^\]]+)\]\]").expect("valid piped link regex"));
static BARE_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^|\]]+)\]\]").expect("valid link regex"));

static PLURAL_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z]\(s\)").expect("valid plural regex"));
static BLOCKQUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^>").expect("valid blockquote regex"));

/// Cleaned text plus the table mapping it back to the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub offsets: OffsetTable,
}

/// `entries[i]` is the raw char offset of cleaned char `i`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OffsetTable {
    entries: Vec<usize>,
    raw_len: usize,
}

impl OffsetTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.entries.get(index).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.entries
    }

    /// Maps a cleaned-text span to raw-text coordinates.
    ///
    /// The start is pulled left over any masked run directly before it. The
    /// end lands on the next surviving raw character (so masked characters
    /// glued to the right edge are covered) and is pushed further when the
    /// entry after that jumps too. Both corpus scans and live decoration
    /// use this rule.
    pub fn remap(&self, span: Span) -> Span {
        let table = &self.entries;
        let mut start = table.get(span.start).copied().unwrap_or(self.raw_len);
        if let Some(&prev) = span.start.checked_sub(1).and_then(|i| table.get(i)) {
            if prev + 1 < start {
                start = prev + 1;
            }
        }

        let mut end = table.get(span.end).copied().unwrap_or(self.raw_len);
        if let Some(&next) = table.get(span.end + 1) {
            if next > end + 1 {
                end = next - 1;
            }
        }

        Span::new(start, end.max(start))
    }
}

/// Strips non-prose markup from `raw`.
pub fn normalize(raw: &str) -> Normalized {
    let mut masker = Masker::new(raw);

    masker.mask_captures(&EMPHASIS_RE, |_, whole, _| {
        vec![
            (whole.start(), whole.start() + 1),
            (whole.end() - 1, whole.end()),
        ]
    });

    for re in [
        &*FRONT_MATTER_RE,
        &*COMMENT_RE,
        &*CODE_FENCE_RE,
        &*BASE64_IMAGE_RE,
        &*DISPLAY_MATH_RE,
        &*INLINE_MATH_RE,
        &*BACKTICK_RE,
        &*HASH_TAG_RE,
        &*HEADING_RE,
    ] {
        masker.mask_all(re);
    }

    // `[^1]` only counts as a marker when followed by whitespace, `]` or the end.
    masker.mask_captures(&FOOTNOTE_MARKER_RE, |_, whole, text| {
        match text[whole.end()..].chars().next() {
            None => vec![(whole.start(), whole.end())],
            Some(c) if c.is_whitespace() || c == ']' => vec![(whole.start(), whole.end())],
            Some(_) => Vec::new(),
        }
    });

    for re in [&*FOOTNOTE_DEF_RE, &*LONG_ID_RE, &*SHORT_NUMBER_RE] {
        masker.mask_all(re);
    }

    masker.mask_captures(&PIPED_LINK_RE, |caps, whole, _| match caps.get(2) {
        Some(label) => vec![(whole.start(), label.start()), (label.end(), whole.end())],
        None => Vec::new(),
    });
    masker.mask_captures(&BARE_LINK_RE, |_, whole, _| {
        vec![
            (whole.start(), whole.start() + 2),
            (whole.end() - 2, whole.end()),
        ]
    });

    if masker.chars.first() == Some(&'\n') {
        masker.chars[0] = SENTINEL;
    }
    masker.mask_captures(&PLURAL_SUFFIX_RE, |_, whole, _| {
        vec![(whole.start() + 1, whole.end())]
    });
    masker.mask_all(&BLOCKQUOTE_RE);

    masker.finish()
}

struct Masker {
    chars: Vec<char>,
}

impl Masker {
    fn new(raw: &str) -> Self {
        Self {
            chars: raw.chars().collect(),
        }
    }

    /// Current text and a byte-offset to char-offset lookup for it.
    fn render(&self) -> (String, Vec<usize>) {
        let text: String = self.chars.iter().collect();
        let mut lookup = vec![0usize; text.len() + 1];
        for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
            for slot in &mut lookup[byte_idx..byte_idx + ch.len_utf8()] {
                *slot = char_idx;
            }
        }
        lookup[text.len()] = self.chars.len();
        (text, lookup)
    }

    fn mask_all(&mut self, re: &Regex) {
        let (text, lookup) = self.render();
        let ranges: Vec<(usize, usize)> = re
            .find_iter(&text)
            .map(|m| (lookup[m.start()], lookup[m.end()]))
            .collect();
        for (start, end) in ranges {
            self.mask(start, end);
        }
    }

    /// Masks the byte ranges `pick` selects from each match.
    fn mask_captures<F>(&mut self, re: &Regex, pick: F)
    where
        F: Fn(&Captures<'_>, Match<'_>, &str) -> Vec<(usize, usize)>,
    {
        let (text, lookup) = self.render();
        let mut ranges = Vec::new();
        for caps in re.captures_iter(&text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            for (start, end) in pick(&caps, whole, &text) {
                ranges.push((lookup[start], lookup[end]));
            }
        }
        for (start, end) in ranges {
            self.mask(start, end);
        }
    }

    fn mask(&mut self, start: usize, end: usize) {
        let end = end.min(self.chars.len());
        for ch in &mut self.chars[start.min(end)..end] {
            *ch = SENTINEL;
        }
    }

    fn finish(self) -> Normalized {
        let raw_len = self.chars.len();
        let mut entries = Vec::with_capacity(raw_len);
        let mut text = String::with_capacity(raw_len);
        for (idx, ch) in self.chars.into_iter().enumerate() {
            if ch != SENTINEL {
                entries.push(idx);
                text.push(ch);
            }
        }
        Normalized {
            text,
            offsets: OffsetTable { entries, raw_len },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaned(raw: &str) -> String {
        normalize(raw).text
    }

    fn assert_table_consistent(raw: &str) {
        let Normalized { text, offsets } = normalize(raw);
        let raw_chars: Vec<char> = raw.chars().collect();
        assert_eq!(offsets.len(), text.chars().count(), "length mismatch for {raw:?}");
        assert!(offsets.as_slice().windows(2).all(|w| w[0] <= w[1]));
        for (i, ch) in text.chars().enumerate() {
            let original = offsets.get(i).unwrap();
            assert_eq!(raw_chars[original], ch, "char {i} of {raw:?} maps to the wrong offset");
        }
    }

    #[test]
    fn table_matches_cleaned_text() {
        for raw in [
            "",
            "plain prose only",
            "---\ntitle: x\n---\nHello _world_ and [[Target|label]] #tag",
            "## Heading\n> quote with item(s) and 123456 ids\n```\ncode\n```\n",
            "naïve café $x^2$ résumé [^1] end",
        ] {
            assert_table_consistent(raw);
        }
    }

    #[test]
    fn strips_front_matter() {
        assert_eq!(cleaned("---\ntitle: x\n---\nHello world"), "\nHello world");
    }

    #[test]
    fn strips_code_fences_and_backticks() {
        assert_eq!(cleaned("```rust\nfn main() {}\n```\nafter"), "\nafter");
        assert_eq!(cleaned("code `x` here"), "code x here");
    }

    #[test]
    fn strips_math_comments_and_images() {
        assert_eq!(cleaned("math $x+y$ done"), "math  done");
        assert_eq!(cleaned("a $$\\sum$$ b"), "a  b");
        assert_eq!(cleaned("keep %%hidden%% this"), "keep  this");
        assert_eq!(
            cleaned("see ![img](data:image/png;base64,AAAA) now"),
            "see  now"
        );
    }

    #[test]
    fn strips_headings_and_tags() {
        assert_eq!(cleaned("# Heading\nText"), "Heading\nText");
        assert_eq!(cleaned("#tag words"), " words");
    }

    #[test]
    fn strips_numbers_and_footnotes() {
        assert_eq!(cleaned("id 123456 and 7 apples"), "id  and  apples");
        assert_eq!(cleaned("claim[^1] more"), "claim more");
    }

    #[test]
    fn rewrites_links() {
        assert_eq!(cleaned("See [[Target note|the label]] here"), "See the label here");
        assert_eq!(cleaned("Link [[Other]] ok"), "Link Other ok");
    }

    #[test]
    fn strips_plural_suffix_quote_and_leading_newline() {
        assert_eq!(cleaned("item(s) here"), "item here");
        assert_eq!(cleaned("> quoted"), " quoted");
        assert_eq!(cleaned("\nbody"), "body");
    }

    #[test]
    fn emphasis_keeps_inner_text() {
        let normalized = normalize("a _b_ c");
        assert_eq!(normalized.text, "a b c");
        assert_eq!(normalized.offsets.as_slice(), &[0, 1, 3, 5, 6]);
    }

    #[test]
    fn remap_covers_emphasis_delimiters() {
        let normalized = normalize("a _b_ c");
        assert_eq!(normalized.offsets.remap(Span::new(2, 3)), Span::new(2, 5));
    }

    #[test]
    fn remap_extends_left_over_masked_prefix() {
        // "[[" before the match is masked, so the span starts at the bracket.
        let raw = "see [[Note]] now";
        let normalized = normalize(raw);
        assert_eq!(normalized.text, "see Note now");
        let span = normalized.offsets.remap(Span::new(4, 8));
        assert_eq!(&raw[span.start..span.end], "[[Note]]");
    }

    #[test]
    fn remap_at_text_end_reaches_raw_end() {
        let raw = "see [[Note]]";
        let normalized = normalize(raw);
        let span = normalized.offsets.remap(Span::new(4, 8));
        assert_eq!(span, Span::new(4, raw.chars().count()));
    }

    #[test]
    fn remap_pushes_end_when_the_following_entry_jumps() {
        // cleaned "ab c", table [0, 1, 3, 7]: the entry after the end jumps.
        let table = OffsetTable {
            entries: vec![0, 1, 3, 7],
            raw_len: 8,
        };
        assert_eq!(table.remap(Span::new(0, 2)), Span::new(0, 6));
    }

    #[test]
    fn remap_end_push_can_take_a_trailing_space() {
        // The space after "network" survives, but the entry after it jumps
        // over the opening "_", so the end is pushed one past the space.
        let raw = "network _b_";
        let normalized = normalize(raw);
        assert_eq!(normalized.text, "network b");
        let span = normalized.offsets.remap(Span::new(0, 7));
        assert_eq!(span, Span::new(0, 8));
        assert_eq!(&raw[span.start..span.end], "network ");
    }
}
