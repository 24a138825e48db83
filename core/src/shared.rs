//! Index handle shared between the editor integration and background work.
//!
//! Readers take a read lock only for the synchronous compose step. Rebuilds
//! are single-flight: a second request waits for the running one, then runs.
//! The new index is built off to the side and swapped in when complete.

use tokio::sync::{broadcast, Mutex, RwLock, RwLockReadGuard};
use tracing::{info, warn};

use crate::extract::PhraseExtractor;
use crate::index::{Document, PhraseIndex, RebuildStats};
use crate::phrase::PhraseFilter;
use crate::store::SnapshotStore;
use crate::{ExclusionRules, Result};

/// Notifications sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Rebuilt(RebuildStats),
    Loaded { phrases: usize },
    /// Documents were dropped from the index without a rebuild.
    Removed { paths: Vec<String> },
}

/// Result of [`SharedIndex::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { phrases: usize },
    /// Nothing saved yet; callers should rebuild.
    Missing,
    /// The snapshot could not be used; callers should rebuild.
    Corrupt(String),
}

impl LoadOutcome {
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, LoadOutcome::Loaded { .. })
    }
}

pub struct SharedIndex {
    index: RwLock<PhraseIndex>,
    rebuild_lock: Mutex<()>,
    events: broadcast::Sender<IndexEvent>,
}

impl Default for SharedIndex {
    fn default() -> Self {
        Self::new(PhraseIndex::new())
    }
}

impl SharedIndex {
    pub fn new(index: PhraseIndex) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            index: RwLock::new(index),
            rebuild_lock: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, PhraseIndex> {
        self.index.read().await
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuild_lock.try_lock().is_err()
    }

    /// Replaces the in-memory index from `store`. A corrupt snapshot leaves
    /// the current index untouched.
    pub async fn load(&self, store: &(dyn SnapshotStore + Sync)) -> LoadOutcome {
        let snapshot = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return LoadOutcome::Missing,
            Err(err) => {
                warn!("phrase index snapshot unreadable: {err}");
                return LoadOutcome::Corrupt(err.to_string());
            }
        };
        match PhraseIndex::from_snapshot(snapshot) {
            Ok(index) => {
                let phrases = index.phrase_count();
                *self.index.write().await = index;
                info!(phrases, "phrase index loaded");
                let _ = self.events.send(IndexEvent::Loaded { phrases });
                LoadOutcome::Loaded { phrases }
            }
            Err(err) => {
                warn!("phrase index snapshot rejected: {err}");
                LoadOutcome::Corrupt(err.to_string())
            }
        }
    }

    pub async fn save(&self, store: &(dyn SnapshotStore + Sync)) -> Result<()> {
        let snapshot = self.index.read().await.snapshot();
        store.save(&snapshot)
    }

    /// Drops every span recorded for `paths`. Waits for a running rebuild so
    /// its result cannot bring the documents back.
    pub async fn remove_documents(&self, paths: Vec<String>) {
        if paths.is_empty() {
            return;
        }
        {
            let _flight = self.rebuild_lock.lock().await;
            let mut index = self.index.write().await;
            for path in &paths {
                index.remove_document(path);
            }
        }
        info!(documents = paths.len(), "removed documents from phrase index");
        let _ = self.events.send(IndexEvent::Removed { paths });
    }

    pub async fn rebuild<E>(
        &self,
        corpus: Vec<Document>,
        extractor: &E,
        filter: &PhraseFilter,
        exclusions: &ExclusionRules,
    ) -> RebuildStats
    where
        E: PhraseExtractor + ?Sized,
    {
        let stats = {
            let _flight = self.rebuild_lock.lock().await;
            let mut fresh = PhraseIndex::new();
            let stats = fresh.rebuild(corpus, extractor, filter, exclusions).await;
            *self.index.write().await = fresh;
            stats
        };
        // Sent after the guard drops so subscribers see the rebuild finished.
        let _ = self.events.send(IndexEvent::Rebuilt(stats));
        stats
    }
}
