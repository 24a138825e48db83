//! Persistent inverted index: phrase -> document path -> occurrence spans.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::extract::PhraseExtractor;
use crate::locate::PhrasePattern;
use crate::normalize::{normalize, Normalized};
use crate::phrase::PhraseFilter;
use crate::store::{IndexSnapshot, SNAPSHOT_VERSION};
use crate::{Error, ExclusionRules, Result, Span};

/// Phrases paired with their spans, in encounter order.
pub type PhraseOccurrences = Vec<(String, Vec<Span>)>;

type DocumentSpans = BTreeMap<String, Vec<Span>>;

/// A document handed to [`PhraseIndex::rebuild`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: String,
    pub text: String,
}

impl Document {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Counters reported after a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    pub documents: usize,
    pub excluded: usize,
    pub failed_extractions: usize,
    pub phrases: usize,
    pub spans: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseIndex {
    entries: BTreeMap<String, DocumentSpans>,
}

impl PhraseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phrase_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.entries.contains_key(phrase)
    }

    pub fn spans(&self, phrase: &str, path: &str) -> Option<&[Span]> {
        self.entries
            .get(phrase)
            .and_then(|docs| docs.get(path))
            .map(Vec::as_slice)
    }

    /// Stored phrases that occur in `path`, with their spans there.
    pub fn phrases_in<'a>(&'a self, path: &'a str) -> impl Iterator<Item = (&'a str, &'a [Span])> {
        self.entries.iter().filter_map(move |(phrase, docs)| {
            docs.get(path).map(|spans| (phrase.as_str(), spans.as_slice()))
        })
    }

    /// Merges `spans` into the stored list for (`phrase`, `path`), keeping it
    /// sorted and free of duplicate pairs.
    pub fn insert_spans(&mut self, phrase: &str, path: &str, spans: impl IntoIterator<Item = Span>) {
        let mut incoming = spans.into_iter().filter(|s| !s.is_empty()).peekable();
        if incoming.peek().is_none() {
            return;
        }
        let stored = self
            .entries
            .entry(phrase.to_string())
            .or_default()
            .entry(path.to_string())
            .or_default();
        stored.extend(incoming);
        stored.sort_unstable();
        stored.dedup();
    }

    /// Drops every span recorded for `path`.
    pub fn remove_document(&mut self, path: &str) {
        self.entries.retain(|_, docs| {
            docs.remove(path);
            !docs.is_empty()
        });
    }

    /// Occurrences of `phrase` across all documents except `excluding`.
    pub fn prevalence(&self, phrase: &str, excluding: Option<&str>) -> usize {
        self.entries.get(phrase).map_or(0, |docs| {
            docs.iter()
                .filter(|(path, _)| Some(path.as_str()) != excluding)
                .map(|(_, spans)| spans.len())
                .sum()
        })
    }

    /// Documents containing `phrase`, most occurrences first.
    pub fn related_documents(&self, phrase: &str, excluding: Option<&str>) -> Vec<(String, usize)> {
        let mut related: Vec<(String, usize)> = self
            .entries
            .get(phrase)
            .map(|docs| {
                docs.iter()
                    .filter(|(path, _)| Some(path.as_str()) != excluding)
                    .map(|(path, spans)| (path.clone(), spans.len()))
                    .collect()
            })
            .unwrap_or_default();
        related.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        related
    }

    /// Unions freshly located spans with the stored spans for `path`.
    ///
    /// Fresh phrases keep their order; phrases only known to the index for this
    /// document follow in index order. Each list is sorted by start offset with
    /// duplicate pairs removed. The index itself is not modified.
    pub fn merge_transient(&self, fresh: &[(String, Vec<Span>)], path: &str) -> PhraseOccurrences {
        let mut merged: PhraseOccurrences = Vec::with_capacity(fresh.len());
        let mut seen = HashSet::new();

        for (phrase, spans) in fresh {
            if !seen.insert(phrase.as_str()) {
                if let Some((_, existing)) = merged.iter_mut().find(|(p, _)| p == phrase) {
                    existing.extend(spans.iter().copied());
                }
                continue;
            }
            let mut combined = spans.clone();
            if let Some(stored) = self.spans(phrase, path) {
                combined.extend_from_slice(stored);
            }
            merged.push((phrase.clone(), combined));
        }

        for (phrase, stored) in self.phrases_in(path) {
            if seen.contains(phrase) {
                continue;
            }
            merged.push((phrase.to_string(), stored.to_vec()));
        }

        for (_, spans) in &mut merged {
            spans.sort_by_key(|s| (s.start, s.end));
            spans.dedup();
        }
        merged
    }

    /// Replaces the index with a fresh scan of `corpus`.
    ///
    /// Every non-excluded document is normalized and sent to `extractor` once.
    /// The union of accepted phrases is then searched in every document, so a
    /// phrase proposed by one note is counted in all of them. Documents are
    /// processed one at a time.
    pub async fn rebuild<E>(
        &mut self,
        corpus: impl IntoIterator<Item = Document>,
        extractor: &E,
        filter: &PhraseFilter,
        exclusions: &ExclusionRules,
    ) -> RebuildStats
    where
        E: PhraseExtractor + ?Sized,
    {
        self.entries.clear();
        let mut stats = RebuildStats::default();
        let mut candidates = BTreeSet::new();
        let mut prepared: Vec<(String, Normalized)> = Vec::new();

        for doc in corpus {
            if exclusions.is_excluded(&doc.path) {
                debug!(path = %doc.path, "excluded from index");
                stats.excluded += 1;
                continue;
            }
            let normalized = normalize(&doc.text);
            match extractor.extract(&normalized.text.to_lowercase()).await {
                Ok(raw) => {
                    let accepted = filter.accept_all(raw);
                    debug!(path = %doc.path, phrases = accepted.len(), "extracted candidates");
                    candidates.extend(accepted);
                }
                Err(err) => {
                    warn!(path = %doc.path, "phrase extraction failed: {err}");
                    stats.failed_extractions += 1;
                }
            }
            prepared.push((doc.path, normalized));
        }
        stats.documents = prepared.len();

        for phrase in &candidates {
            let pattern = match PhrasePattern::new(phrase) {
                Ok(pattern) => pattern,
                Err(err) => {
                    warn!(phrase = %phrase, "skipping phrase: {err}");
                    continue;
                }
            };
            for (path, normalized) in &prepared {
                let spans = pattern.find_remapped(normalized);
                stats.spans += spans.len();
                self.insert_spans(phrase, path, spans);
            }
        }
        stats.phrases = self.entries.len();

        info!(
            documents = stats.documents,
            excluded = stats.excluded,
            phrases = stats.phrases,
            spans = stats.spans,
            "phrase index rebuilt"
        );
        stats
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            version: SNAPSHOT_VERSION,
            phrases: self.entries.clone(),
        }
    }

    /// Restores an index, rejecting snapshots with an unknown version or
    /// malformed spans.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        let mut index = PhraseIndex::new();
        for (phrase, docs) in snapshot.phrases {
            if phrase.trim().is_empty() {
                return Err(Error::InvalidSnapshot("empty phrase key".into()));
            }
            for (path, spans) in docs {
                if let Some(bad) = spans.iter().find(|s| s.is_empty()) {
                    return Err(Error::InvalidSnapshot(format!(
                        "span [{}, {}) for `{phrase}` in {path} is empty",
                        bad.start, bad.end
                    )));
                }
                index.insert_spans(&phrase, &path, spans);
            }
        }
        Ok(index)
    }
}
