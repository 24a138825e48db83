//! Computes the highlight set for the document being edited.

use serde::Serialize;
use tracing::{debug, warn};

use crate::extract::PhraseExtractor;
use crate::index::{PhraseIndex, PhraseOccurrences};
use crate::locate::PhrasePattern;
use crate::normalize::normalize;
use crate::phrase::PhraseFilter;
use crate::rank::{flatten, rank, Candidate};
use crate::weight::{gradient_color, weight, Rgb, Theme};
use crate::{Result, Span};

/// One highlighted range, in raw-text char offsets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoration {
    pub start: usize,
    pub end: usize,
    pub phrase: String,
    /// Occurrences in other documents.
    pub total: usize,
    pub intensity: f64,
}

impl Decoration {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn color(&self, theme: Theme) -> Rgb {
        gradient_color(self.intensity, theme)
    }
}

/// Extracts phrases from `text` and locates them in raw-text coordinates.
pub async fn fresh_occurrences<E>(
    text: &str,
    extractor: &E,
    filter: &PhraseFilter,
) -> Result<PhraseOccurrences>
where
    E: PhraseExtractor + ?Sized,
{
    let normalized = normalize(text);
    let raw = extractor.extract(&normalized.text.to_lowercase()).await?;
    let mut occurrences = Vec::new();
    for phrase in filter.accept_all(raw) {
        let spans = PhrasePattern::new(&phrase)?.find_remapped(&normalized);
        if !spans.is_empty() {
            occurrences.push((phrase, spans));
        }
    }
    Ok(occurrences)
}

/// Merges fresh occurrences with the index, ranks them and flattens the
/// result into decorations sorted by (start, end).
pub fn compose(
    index: &PhraseIndex,
    path: &str,
    fresh: &[(String, Vec<Span>)],
    max_count: usize,
) -> Vec<Decoration> {
    let candidates: Vec<Candidate> = index
        .merge_transient(fresh, path)
        .into_iter()
        .map(|(phrase, spans)| Candidate {
            total: index.prevalence(&phrase, Some(path)),
            phrase,
            spans,
        })
        .collect();
    let ranked = rank(candidates);
    let decorations: Vec<Decoration> = flatten(&ranked)
        .into_iter()
        .map(|(span, phrase)| Decoration {
            start: span.start,
            end: span.end,
            phrase: phrase.phrase.clone(),
            total: phrase.total,
            intensity: weight(phrase.total, max_count),
        })
        .collect();
    debug!(path, phrases = ranked.len(), decorations = decorations.len(), "composed decorations");
    decorations
}

/// Full decoration pass. Extraction failures fall back to indexed spans.
pub async fn decorate<E>(
    text: &str,
    path: &str,
    index: &PhraseIndex,
    extractor: &E,
    filter: &PhraseFilter,
    max_count: usize,
) -> Vec<Decoration>
where
    E: PhraseExtractor + ?Sized,
{
    let fresh = match fresh_occurrences(text, extractor, filter).await {
        Ok(fresh) => fresh,
        Err(err) => {
            warn!(path, "no fresh phrases this pass: {err}");
            Vec::new()
        }
    };
    compose(index, path, &fresh, max_count)
}
