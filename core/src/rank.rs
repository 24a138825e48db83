//! Prevalence ranking and nested-span suppression.

use serde::Serialize;

use crate::Span;

/// A phrase seen in the current document together with its prevalence elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub phrase: String,
    pub spans: Vec<Span>,
    pub total: usize,
}

/// A phrase chosen for highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedPhrase {
    pub phrase: String,
    pub spans: Vec<Span>,
    pub total: usize,
}

/// Orders candidates by descending `total` and drops the ones not worth
/// highlighting.
///
/// Ties keep their input order. Zero-total candidates are dropped. A candidate
/// is suppressed when every one of its spans nests inside a span of a phrase
/// already accepted, so a head noun does not compete with the compound term
/// that contains it.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<RankedPhrase> {
    candidates.sort_by(|a, b| b.total.cmp(&a.total));

    let mut accepted: Vec<RankedPhrase> = Vec::new();
    for candidate in candidates {
        if candidate.total == 0 {
            continue;
        }
        let shadowed = candidate.spans.iter().all(|span| {
            accepted
                .iter()
                .flat_map(|a| a.spans.iter())
                .any(|outer| span.nested_in(outer))
        });
        if shadowed {
            continue;
        }
        accepted.push(RankedPhrase {
            phrase: candidate.phrase,
            spans: candidate.spans,
            total: candidate.total,
        });
    }
    accepted
}

/// Every span of every accepted phrase, sorted by (start, end).
pub fn flatten(ranked: &[RankedPhrase]) -> Vec<(Span, &RankedPhrase)> {
    let mut flat: Vec<(Span, &RankedPhrase)> = ranked
        .iter()
        .flat_map(|phrase| phrase.spans.iter().map(move |span| (*span, phrase)))
        .collect();
    flat.sort_by_key(|(span, _)| (span.start, span.end));
    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(phrase: &str, spans: &[(usize, usize)], total: usize) -> Candidate {
        Candidate {
            phrase: phrase.to_string(),
            spans: spans.iter().map(|&s| s.into()).collect(),
            total,
        }
    }

    fn names(ranked: &[RankedPhrase]) -> Vec<&str> {
        ranked.iter().map(|r| r.phrase.as_str()).collect()
    }

    #[test]
    fn compound_term_suppresses_nested_head_noun() {
        let ranked = rank(vec![
            candidate("network", &[(10, 17)], 5),
            candidate("neural network", &[(3, 17)], 8),
        ]);
        assert_eq!(names(&ranked), vec!["neural network"]);
    }

    #[test]
    fn phrase_survives_when_any_span_is_free() {
        let ranked = rank(vec![
            candidate("neural network", &[(3, 17)], 8),
            candidate("network", &[(10, 17), (40, 47)], 5),
        ]);
        assert_eq!(names(&ranked), vec!["neural network", "network"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank(vec![
            candidate("beta", &[(0, 4)], 2),
            candidate("alpha", &[(10, 15)], 2),
            candidate("gamma", &[(20, 25)], 3),
            candidate("delta", &[(30, 35)], 2),
        ]);
        assert_eq!(names(&ranked), vec!["gamma", "beta", "alpha", "delta"]);
    }

    #[test]
    fn zero_prevalence_is_dropped() {
        let ranked = rank(vec![
            candidate("lonely", &[(0, 6)], 0),
            candidate("shared", &[(7, 13)], 1),
        ]);
        assert_eq!(names(&ranked), vec!["shared"]);
    }

    #[test]
    fn lower_ranked_superstring_is_still_accepted() {
        // "network" wins first; "neural network" is not nested inside it.
        let ranked = rank(vec![
            candidate("network", &[(10, 17)], 9),
            candidate("neural network", &[(3, 17)], 2),
        ]);
        assert_eq!(names(&ranked), vec!["network", "neural network"]);
    }

    #[test]
    fn flatten_orders_spans_left_to_right() {
        let ranked = rank(vec![
            candidate("network", &[(10, 17), (40, 47)], 9),
            candidate("neural network", &[(3, 17)], 2),
        ]);
        let flat: Vec<(usize, usize, &str)> = flatten(&ranked)
            .into_iter()
            .map(|(s, p)| (s.start, s.end, p.phrase.as_str()))
            .collect();
        assert_eq!(
            flat,
            vec![
                (3, 17, "neural network"),
                (10, 17, "network"),
                (40, 47, "network"),
            ]
        );
    }
}
