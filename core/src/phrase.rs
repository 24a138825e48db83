//! Phrase cleanup and the stopword / ignore filter applied to extractor output.

use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "either",
    "etc", "even", "ever", "every", "few", "for", "from", "further", "get", "got", "had", "has",
    "have", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
    "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "let", "like", "may",
    "me", "might", "more", "most", "much", "must", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "one", "only", "or", "other", "others", "our", "ours", "ourselves",
    "out", "over", "own", "per", "quite", "rather", "same", "she", "should", "so", "some",
    "something", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "thing", "things", "this", "those", "through", "thus", "to", "too",
    "under", "until", "up", "upon", "us", "very", "was", "way", "we", "were", "what", "when",
    "where", "whether", "which", "while", "who", "whom", "whose", "why", "will", "with", "within",
    "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

const IGNORE_STRINGS: &[&str] = &[".", "-", "'s", "_"];

/// Decides which extractor phrases are worth indexing.
#[derive(Debug, Clone)]
pub struct PhraseFilter {
    min_length: usize,
    ignored: HashSet<String>,
}

impl Default for PhraseFilter {
    fn default() -> Self {
        Self::new(3, &[])
    }
}

impl PhraseFilter {
    pub fn new(min_length: usize, extra_ignored: &[String]) -> Self {
        let mut ignored: HashSet<String> = STOP_WORDS
            .iter()
            .chain(IGNORE_STRINGS)
            .map(|s| s.to_string())
            .collect();
        ignored.extend(extra_ignored.iter().map(|s| s.trim().to_lowercase()));
        Self {
            min_length,
            ignored,
        }
    }

    /// Normalized phrase, or `None` when it should not be indexed.
    pub fn accept(&self, raw: &str) -> Option<String> {
        if self.ignored.contains(&raw.trim().to_lowercase()) {
            return None;
        }
        let phrase = normalize_phrase(raw);
        if phrase.is_empty()
            || phrase.chars().all(|c| !c.is_alphanumeric())
            || phrase.chars().count() < self.min_length
            || self.ignored.contains(&phrase)
        {
            return None;
        }
        Some(phrase)
    }

    /// Accepted phrases in first-seen order, without duplicates.
    pub fn accept_all<I, S>(&self, raw: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        raw.into_iter()
            .filter_map(|p| self.accept(p.as_ref()))
            .filter(|p| seen.insert(p.clone()))
            .collect()
    }
}

/// Trims list bullets, stray leading quotes/brackets and edge punctuation,
/// then lowercases.
pub fn normalize_phrase(raw: &str) -> String {
    let mut s = raw;
    s = s.strip_prefix("- ").unwrap_or(s);
    s = s.trim_start_matches('\n');
    for prefix in ['"', '{', '(', '-'] {
        s = s.strip_prefix(prefix).unwrap_or(s);
    }
    s.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bullets_and_punctuation() {
        assert_eq!(normalize_phrase("- Neural Network"), "neural network");
        assert_eq!(normalize_phrase("\n\n\"Graph Theory,"), "graph theory");
        assert_eq!(normalize_phrase("(attention heads)"), "attention heads");
        assert_eq!(normalize_phrase("  spaced  "), "spaced");
    }

    #[test]
    fn rejects_stopwords_punctuation_and_short_phrases() {
        let filter = PhraseFilter::default();
        assert_eq!(filter.accept("The"), None);
        assert_eq!(filter.accept("'s"), None);
        assert_eq!(filter.accept("..."), None);
        assert_eq!(filter.accept("AI"), None);
        assert_eq!(filter.accept("Transformer"), Some("transformer".into()));
    }

    #[test]
    fn honours_extra_ignore_list() {
        let filter = PhraseFilter::new(1, &["Today".into()]);
        assert_eq!(filter.accept("today"), None);
        assert_eq!(filter.accept("AI"), Some("ai".into()));
    }

    #[test]
    fn accept_all_dedups_in_order() {
        let filter = PhraseFilter::default();
        let out = filter.accept_all(["Graph", "the", "graph", "Tree"]);
        assert_eq!(out, vec!["graph".to_string(), "tree".to_string()]);
    }
}
