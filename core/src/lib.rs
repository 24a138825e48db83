//! maxlink core engine.
//! Finds noun phrases that recur across a collection of Markdown notes,
//! keeps a persistent phrase index, and computes which spans of the note
//! being edited should be highlighted and how strongly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod corpus;
pub mod decorate;
pub mod error;
pub mod extract;
pub mod index;
pub mod locate;
pub mod normalize;
pub mod phrase;
pub mod rank;
pub mod shared;
pub mod store;
pub mod weight;

pub use corpus::{collect_markdown, load_corpus};
pub use decorate::{compose, decorate, fresh_occurrences, Decoration};
pub use error::{Error, Result};
pub use extract::{ExtractorResponse, HttpExtractor, PhraseExtractor};
pub use index::{Document, PhraseIndex, PhraseOccurrences, RebuildStats};
pub use locate::{locate, PhrasePattern};
pub use normalize::{normalize, Normalized, OffsetTable, SENTINEL};
pub use phrase::PhraseFilter;
pub use rank::{flatten, rank, Candidate, RankedPhrase};
pub use shared::{IndexEvent, LoadOutcome, SharedIndex};
pub use store::{IndexSnapshot, JsonFileStore, SnapshotStore};
pub use weight::{gradient_color, weight, Rgb, Theme};

/// Half-open range of char offsets into a document's original text.
///
/// Serialized as a two-element array so snapshots stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when `self` lies entirely inside `outer`.
    pub fn nested_in(&self, outer: &Span) -> bool {
        self.start >= outer.start && self.end <= outer.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

impl From<Span> for (usize, usize) {
    fn from(span: Span) -> Self {
        (span.start, span.end)
    }
}

/// Location of the phrase extraction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            protocol: "http".into(),
            host: "127.0.0.1".into(),
            port: 5000,
            path: "/extract_noun_phrases".into(),
            timeout_secs: 30,
        }
    }
}

impl ExtractorConfig {
    pub fn endpoint(&self) -> String {
        let path = self.path.trim_start_matches('/');
        format!("{}://{}:{}/{}", self.protocol, self.host, self.port, path)
    }
}

/// Where the phrase index snapshot lives, relative to the workspace root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".maxlink"),
            file_name: "phrase-index.json".into(),
        }
    }
}

/// Top-level configuration shared by the CLI and the language server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extractor: ExtractorConfig,
    pub database: DatabaseConfig,
    /// Documents whose path contains any of these substrings are not indexed.
    pub exclude_folders: Vec<String>,
    pub min_phrase_length: usize,
    pub max_highlight_count: usize,
    pub ignore_phrases: Vec<String>,
    /// Glob patterns skipped while walking the workspace.
    pub ignore_globs: Vec<String>,
    pub debounce_ms: u64,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            database: DatabaseConfig::default(),
            exclude_folders: vec![".maxlink".into(), ".obsidian".into(), ".trash".into()],
            min_phrase_length: 3,
            max_highlight_count: 10,
            ignore_phrases: Vec::new(),
            ignore_globs: vec![
                "**/.git/**".into(),
                "**/node_modules/**".into(),
                "**/target/**".into(),
            ],
            debounce_ms: 1000,
            theme: Theme::Dark,
        }
    }
}

impl Config {
    /// Parses a `maxlink.yml` document. Missing keys take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn exclusions(&self) -> ExclusionRules {
        ExclusionRules::new(self.exclude_folders.clone())
    }

    pub fn phrase_filter(&self) -> PhraseFilter {
        PhraseFilter::new(self.min_phrase_length, &self.ignore_phrases)
    }
}

/// Folder-substring rules that keep documents out of the index.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    folders: Vec<String>,
}

impl ExclusionRules {
    pub fn new(folders: Vec<String>) -> Self {
        let folders = folders
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        Self { folders }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.folders.iter().any(|folder| path.contains(folder.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_nesting_is_inclusive_on_both_edges() {
        let outer = Span::new(3, 17);
        assert!(Span::new(10, 17).nested_in(&outer));
        assert!(Span::new(3, 17).nested_in(&outer));
        assert!(!Span::new(2, 5).nested_in(&outer));
    }

    #[test]
    fn span_serializes_as_pair() {
        let json = serde_json::to_string(&Span::new(4, 9)).unwrap();
        assert_eq!(json, "[4,9]");
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Span::new(4, 9));
    }

    #[test]
    fn endpoint_joins_parts() {
        let cfg = ExtractorConfig::default();
        assert_eq!(cfg.endpoint(), "http://127.0.0.1:5000/extract_noun_phrases");
    }

    #[test]
    fn exclusion_matches_substrings_and_ignores_blank_rules() {
        let rules = ExclusionRules::new(vec!["archive/".into(), "  ".into()]);
        assert!(rules.is_excluded("notes/archive/old.md"));
        assert!(!rules.is_excluded("notes/current.md"));
    }

    #[test]
    fn config_parses_partial_yaml() {
        let cfg = Config::from_yaml("max_highlight_count: 20\nextractor:\n  port: 8080\n").unwrap();
        assert_eq!(cfg.max_highlight_count, 20);
        assert_eq!(cfg.extractor.port, 8080);
        assert_eq!(cfg.extractor.host, "127.0.0.1");
        assert_eq!(cfg.min_phrase_length, 3);
    }

    #[test]
    fn config_rejects_bad_yaml_and_accepts_empty() {
        assert!(matches!(Config::from_yaml("theme: purple"), Err(Error::Config(_))));
        assert_eq!(Config::from_yaml("").unwrap().debounce_ms, 1000);
    }
}
