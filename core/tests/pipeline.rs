use std::collections::HashMap;
use std::fs;

use async_trait::async_trait;
use maxlink_core::{
    collect_markdown, decorate, load_corpus, normalize, Config, Document, JsonFileStore,
    LoadOutcome, PhraseExtractor, PhraseIndex, Result, SharedIndex, SnapshotStore, Span,
};

/// Stands in for the NLP service: proposes known terms present in the text.
struct GlossaryExtractor {
    glossary: Vec<&'static str>,
}

#[async_trait]
impl PhraseExtractor for GlossaryExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .glossary
            .iter()
            .filter(|term| text.contains(*term))
            .map(|term| format!("- {term}"))
            .collect())
    }
}

fn glossary() -> GlossaryExtractor {
    GlossaryExtractor {
        glossary: vec!["neural network", "network", "gradient descent", "the"],
    }
}

fn notes() -> Vec<Document> {
    vec![
        Document::new(
            "notes/training.md",
            "---\ntags: ml\n---\n# Training\nA neural network learns by gradient descent.\n",
        ),
        Document::new(
            "notes/graphs.md",
            "Every [[Neural Network|neural network]] is a network of 12 layers.",
        ),
        Document::new(
            "notes/archive/old.md",
            "neural network neural network gradient descent",
        ),
    ]
}

fn char_slice(text: &str, span: Span) -> String {
    text.chars().skip(span.start).take(span.len()).collect()
}

#[tokio::test]
async fn rebuild_then_decorate() {
    let mut cfg = Config::default();
    cfg.exclude_folders.push("archive/".into());

    let mut index = PhraseIndex::new();
    let stats = index
        .rebuild(notes(), &glossary(), &cfg.phrase_filter(), &cfg.exclusions())
        .await;
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.excluded, 1);
    assert!(!index.contains("the"));
    assert_eq!(index.prevalence("neural network", None), 2);

    // The piped link is covered up to and including its brackets.
    let graphs = &notes()[1].text;
    let link_span = index.spans("neural network", "notes/graphs.md").unwrap()[0];
    assert_eq!(
        char_slice(graphs, link_span),
        "[[Neural Network|neural network]]"
    );

    let current = "Gradient descent tunes a neural network.";
    let decorations = decorate(
        current,
        "notes/draft.md",
        &index,
        &glossary(),
        &cfg.phrase_filter(),
        cfg.max_highlight_count,
    )
    .await;

    let shown: Vec<(String, String)> = decorations
        .iter()
        .map(|d| (d.phrase.clone(), char_slice(current, d.span())))
        .collect();
    // "network" is more common elsewhere, so it ranks first and the longer
    // phrase around it is still shown.
    assert_eq!(
        shown,
        vec![
            ("gradient descent".to_string(), "Gradient descent".to_string()),
            ("neural network".to_string(), "neural network".to_string()),
            ("network".to_string(), "network".to_string()),
        ]
    );
    assert_eq!(decorations[2].total, 3);
    assert!(decorations.windows(2).all(|w| w[0].start <= w[1].start));
    assert!(decorations.iter().all(|d| d.intensity > 0.0 && d.intensity <= 1.0));
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("notes")).unwrap();
    for doc in notes() {
        let path = root.join(&doc.path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, doc.text).unwrap();
    }

    let cfg = Config::default();
    let files = collect_markdown(&[root.to_path_buf()], &cfg.ignore_globs).unwrap();
    let corpus = load_corpus(root, &files);
    assert_eq!(corpus.len(), 3);

    let store = JsonFileStore::from_config(root, &cfg.database);
    let shared = SharedIndex::default();
    assert_eq!(shared.load(&store).await, LoadOutcome::Missing);

    shared
        .rebuild(corpus, &glossary(), &cfg.phrase_filter(), &cfg.exclusions())
        .await;
    shared.save(&store).await.unwrap();
    assert!(store.path().starts_with(root.join(".maxlink")));

    let restarted = SharedIndex::default();
    let outcome = restarted.load(&store).await;
    assert!(!outcome.needs_rebuild());
    assert_eq!(*restarted.read().await, *shared.read().await);
    assert!(store.load().unwrap().is_some());
}

#[test]
fn offset_table_invariants_hold_for_mixed_markup() {
    let samples = [
        "plain",
        "> quote [[a|b]] _x_ `y` $z$ #tag 1234567 item(s)\n## head\n%%c%%",
        "```\nfenced\n```\n[^1]: [[ref]]\ntext[^1] here",
        "émigré _naïve_ [[Ünïcode]]",
    ];
    for raw in samples {
        let normalized = normalize(raw);
        let offsets = normalized.offsets.as_slice();
        assert_eq!(offsets.len(), normalized.text.chars().count());
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        let raw_chars: Vec<char> = raw.chars().collect();
        let by_offset: HashMap<usize, char> = normalized
            .text
            .chars()
            .enumerate()
            .map(|(i, c)| (offsets[i], c))
            .collect();
        for (offset, ch) in by_offset {
            assert_eq!(raw_chars[offset], ch);
        }
    }
}
