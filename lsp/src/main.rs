//! maxlink Language Server Protocol implementation.
//!
//! Keeps the phrase index hot in memory, pushes highlight decorations for open
//! notes through the `maxlink/decorations` notification and offers links to
//! related notes as code actions.

mod debounce;
mod position;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dashmap::DashMap;
use maxlink_core::corpus::{document_key, is_markdown};
use maxlink_core::{
    collect_markdown, compose, fresh_occurrences, load_corpus, Config, Decoration, Document,
    HttpExtractor, IndexEvent, JsonFileStore, LoadOutcome, RebuildStats, SharedIndex,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{self, Result};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::debounce::Debouncer;
use crate::position::LineIndex;

const CONFIG_FILE: &str = "maxlink.yml";
const OPEN_DOCUMENT_COMMAND: &str = "maxlink.openDocument";
const REBUILD_COMMAND: &str = "maxlink.rebuildIndex";

/// Server -> client push of the highlight set for one document.
enum DecorationsNotification {}

impl Notification for DecorationsNotification {
    type Params = DecorationsParams;
    const METHOD: &'static str = "maxlink/decorations";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecorationsParams {
    uri: Url,
    version: i32,
    decorations: Vec<LspDecoration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LspDecoration {
    range: Range,
    phrase: String,
    intensity: f64,
    /// Hex color for the configured theme.
    color: String,
}

/// Document state cached by the server.
struct DocumentState {
    content: String,
    version: i32,
    /// Result of the last published pass, used for code actions.
    decorations: Vec<Decoration>,
}

/// Config-derived state, swapped as a whole on reload.
struct Workspace {
    root: PathBuf,
    config_path: PathBuf,
    cfg: Config,
    store: JsonFileStore,
    extractor: HttpExtractor,
}

impl Workspace {
    fn load(root: PathBuf, config_path: PathBuf) -> anyhow::Result<Self> {
        let cfg = if config_path.exists() {
            let text = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Config::from_yaml(&text)
                .with_context(|| format!("Invalid config structure in {}", config_path.display()))?
        } else {
            Config::default()
        };
        let store = JsonFileStore::from_config(&root, &cfg.database);
        let extractor =
            HttpExtractor::new(&cfg.extractor).context("failed to create extractor client")?;
        Ok(Self {
            root,
            config_path,
            cfg,
            store,
            extractor,
        })
    }

    fn key_for(&self, uri: &Url) -> String {
        match uri.to_file_path() {
            Ok(path) => document_key(&self.root, &path),
            Err(()) => uri.path().to_string(),
        }
    }

    fn uri_for(&self, key: &str) -> Option<Url> {
        Url::from_file_path(self.root.join(key)).ok()
    }

    fn debounce(&self) -> Duration {
        Duration::from_millis(self.cfg.debounce_ms)
    }
}

struct Inner {
    client: Client,
    documents: DashMap<Url, DocumentState>,
    index: SharedIndex,
    workspace: RwLock<Option<Arc<Workspace>>>,
    workspace_root: RwLock<Option<PathBuf>>,
    config_path: RwLock<Option<PathBuf>>,
    debouncer: Debouncer<Url>,
}

/// maxlink Language Server backend.
struct Backend {
    inner: Arc<Inner>,
}

impl Backend {
    fn new(client: Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                documents: DashMap::new(),
                index: SharedIndex::default(),
                workspace: RwLock::new(None),
                workspace_root: RwLock::new(None),
                config_path: RwLock::new(None),
                debouncer: Debouncer::default(),
            }),
        }
    }
}

impl Inner {
    async fn workspace(&self) -> Option<Arc<Workspace>> {
        self.workspace.read().await.clone()
    }

    async fn set_config_path(&self, configured: &str) {
        if configured.trim().is_empty() {
            *self.config_path.write().await = None;
            return;
        }
        let configured = PathBuf::from(configured);
        if configured.is_absolute() {
            *self.config_path.write().await = Some(configured);
        } else if let Some(root) = self.workspace_root.read().await.clone() {
            *self.config_path.write().await = Some(root.join(configured));
        }
    }

    async fn reload_workspace(&self) -> anyhow::Result<()> {
        let root = match self.workspace_root.read().await.clone() {
            Some(root) => root,
            None => std::env::current_dir()?,
        };
        let configured = self.config_path.read().await.clone();
        let resolved = configured.unwrap_or_else(|| root.join(CONFIG_FILE));

        let workspace = Workspace::load(root, resolved.clone())?;
        *self.workspace.write().await = Some(Arc::new(workspace));

        self.client
            .log_message(
                MessageType::INFO,
                format!("maxlink config loaded: {}", resolved.display()),
            )
            .await;
        Ok(())
    }

    async fn reload_and_redecorate(self: &Arc<Self>) {
        if let Err(err) = self.reload_workspace().await {
            self.client
                .log_message(
                    MessageType::ERROR,
                    format!("Failed to reload config: {err:#}"),
                )
                .await;
        }
        self.redecorate_all().await;
    }

    /// Starts a new generation for `uri` and runs a pass for it, right away
    /// or after the debounce delay.
    async fn schedule_pass(self: &Arc<Self>, uri: Url, immediate: bool) {
        let generation = self.debouncer.bump(&uri);
        let delay = match self.workspace().await {
            Some(ws) if !immediate => ws.debounce(),
            _ => Duration::ZERO,
        };
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if inner.debouncer.settle(&uri, generation, delay).await {
                inner.decorate_document(uri, generation).await;
            }
        });
    }

    async fn redecorate_all(self: &Arc<Self>) {
        let uris: Vec<Url> = self.documents.iter().map(|e| e.key().clone()).collect();
        for uri in uris {
            self.schedule_pass(uri, true).await;
        }
    }

    /// Computes and publishes decorations unless a newer edit arrived meanwhile.
    async fn decorate_document(&self, uri: Url, generation: u64) {
        let Some(ws) = self.workspace().await else {
            return;
        };
        let Some((text, version)) = self
            .documents
            .get(&uri)
            .map(|doc| (doc.content.clone(), doc.version))
        else {
            return;
        };
        let key = ws.key_for(&uri);

        let fresh = match fresh_occurrences(&text, &ws.extractor, &ws.cfg.phrase_filter()).await {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(path = %key, "showing indexed phrases only: {err}");
                Vec::new()
            }
        };
        let decorations = {
            let index = self.index.read().await;
            compose(&index, &key, &fresh, ws.cfg.max_highlight_count)
        };

        if !self.debouncer.is_current(&uri, generation) {
            debug!(path = %key, generation, "dropping stale decoration pass");
            return;
        }
        let lines = LineIndex::new(&text);
        let params = DecorationsParams {
            uri: uri.clone(),
            version,
            decorations: decorations
                .iter()
                .map(|d| LspDecoration {
                    range: lines.range(d.span()),
                    phrase: d.phrase.clone(),
                    intensity: d.intensity,
                    color: d.color(ws.cfg.theme).to_hex(),
                })
                .collect(),
        };
        {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                return;
            };
            if doc.version != version {
                debug!(path = %key, version, "document changed during pass");
                return;
            }
            doc.decorations = decorations;
        }
        self.client
            .send_notification::<DecorationsNotification>(params)
            .await;
    }

    async fn rebuild_index(&self) -> anyhow::Result<RebuildStats> {
        let ws = self
            .workspace()
            .await
            .context("workspace is not initialized")?;
        let root = ws.root.clone();
        let ignore_globs = ws.cfg.ignore_globs.clone();
        let corpus = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Document>> {
            let files = collect_markdown(&[root.clone()], &ignore_globs)?;
            Ok(load_corpus(&root, &files))
        })
        .await??;
        let stats = self
            .index
            .rebuild(
                corpus,
                &ws.extractor,
                &ws.cfg.phrase_filter(),
                &ws.cfg.exclusions(),
            )
            .await;
        Ok(stats)
    }

    fn spawn_rebuild(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = inner.rebuild_index().await {
                inner
                    .client
                    .log_message(
                        MessageType::ERROR,
                        format!("Phrase index rebuild failed: {err:#}"),
                    )
                    .await;
            }
        });
    }

    async fn save_index(&self) {
        let Some(ws) = self.workspace().await else {
            return;
        };
        // An empty index mid-rebuild would hide the missing snapshot on restart.
        if self.index.is_rebuilding() || self.index.read().await.is_empty() {
            return;
        }
        if let Err(err) = self.index.save(&ws.store).await {
            warn!(path = %ws.store.path().display(), "could not save phrase index: {err}");
        }
    }

    /// Re-decorates open documents whenever the index changes.
    fn listen_for_index_events(self: &Arc<Self>) {
        let mut events = self.index.subscribe();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(IndexEvent::Rebuilt(stats)) => {
                        inner
                            .client
                            .log_message(
                                MessageType::INFO,
                                format!(
                                    "Phrase index rebuilt: {} phrases across {} notes",
                                    stats.phrases, stats.documents
                                ),
                            )
                            .await;
                        inner.save_index().await;
                        inner.redecorate_all().await;
                    }
                    Ok(IndexEvent::Removed { paths }) => {
                        debug!(?paths, "documents removed from index");
                        inner.save_index().await;
                        inner.redecorate_all().await;
                    }
                    Ok(IndexEvent::Loaded { phrases }) => {
                        info!(phrases, "phrase index ready");
                        inner.redecorate_all().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed index events");
                        inner.redecorate_all().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    async fn register_watchers(&self) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: vec![
                FileSystemWatcher {
                    glob_pattern: GlobPattern::String("**/*.{md,markdown,mdx}".to_string()),
                    kind: None,
                },
                FileSystemWatcher {
                    glob_pattern: GlobPattern::String(format!("**/{CONFIG_FILE}")),
                    kind: None,
                },
            ],
        };
        let registration = Registration {
            id: "maxlink-watched-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(options).ok(),
        };
        if let Err(err) = self.client.register_capability(vec![registration]).await {
            debug!("client declined file watching: {err}");
        }
    }

    async fn is_config(&self, path: &Path) -> bool {
        self.workspace()
            .await
            .is_some_and(|ws| ws.config_path == path)
    }
}

/// Decorations under the requested range, with their editor ranges and text.
fn decorations_at<'a>(
    decorations: &'a [Decoration],
    lines: &LineIndex,
    text: &str,
    start: usize,
    end: usize,
) -> Vec<(&'a Decoration, Range, String)> {
    decorations
        .iter()
        .filter(|d| d.span().contains(start) && end <= d.end)
        .map(|d| {
            let covered: String = text.chars().skip(d.start).take(d.span().len()).collect();
            (d, lines.range(d.span()), covered)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkdownChange {
    /// Drop the document's spans in place.
    Removed,
    Rebuild,
    /// Saves of open documents already went through did_save.
    Skip,
}

fn markdown_change(typ: FileChangeType, open: bool) -> MarkdownChange {
    match typ {
        FileChangeType::DELETED => MarkdownChange::Removed,
        FileChangeType::CHANGED if open => MarkdownChange::Skip,
        _ => MarkdownChange::Rebuild,
    }
}

/// Kinds of every action this server returns.
fn advertised_action_kinds() -> Vec<CodeActionKind> {
    vec![CodeActionKind::REFACTOR_REWRITE, CodeActionKind::QUICKFIX]
}

fn replace_action(uri: &Url, range: Range, phrase: &str) -> CodeAction {
    let edit = TextEdit {
        range,
        new_text: format!("[[{phrase}]]"),
    };
    let mut changes = HashMap::new();
    changes.insert(uri.clone(), vec![edit]);
    CodeAction {
        title: format!("Replace with [[{phrase}]]"),
        kind: Some(CodeActionKind::REFACTOR_REWRITE),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            ..Default::default()
        }),
        is_preferred: Some(true),
        ..Default::default()
    }
}

fn goto_action(path: &str, count: usize) -> CodeAction {
    let title = format!("Go to: {path} ({count})");
    CodeAction {
        title: title.clone(),
        kind: Some(CodeActionKind::QUICKFIX),
        command: Some(Command {
            title,
            command: OPEN_DOCUMENT_COMMAND.to_string(),
            arguments: Some(vec![Value::String(path.to_string())]),
        }),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        if let Some(root_uri) = params.root_uri.or_else(|| {
            params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first().map(|f| f.uri.clone()))
        }) {
            if let Ok(path) = root_uri.to_file_path() {
                *self.inner.workspace_root.write().await = Some(path);
            }
        }

        if let Some(Value::Object(map)) = params.initialization_options {
            if let Some(Value::String(config_path)) = map.get("configPath") {
                self.inner.set_config_path(config_path).await;
            }
        }

        if let Err(err) = self.inner.reload_workspace().await {
            self.inner
                .client
                .log_message(
                    MessageType::ERROR,
                    format!("Failed to load config: {err:#}"),
                )
                .await;
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(advertised_action_kinds()),
                        work_done_progress_options: WorkDoneProgressOptions {
                            work_done_progress: None,
                        },
                        resolve_provider: Some(false),
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![
                        OPEN_DOCUMENT_COMMAND.to_string(),
                        REBUILD_COMMAND.to_string(),
                    ],
                    work_done_progress_options: WorkDoneProgressOptions {
                        work_done_progress: None,
                    },
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "maxlink Language Server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.inner.listen_for_index_events();
        self.inner.register_watchers().await;

        let Some(ws) = self.inner.workspace().await else {
            return;
        };
        match self.inner.index.load(&ws.store).await {
            LoadOutcome::Loaded { phrases } => {
                self.inner
                    .client
                    .log_message(
                        MessageType::INFO,
                        format!("maxlink index loaded: {phrases} phrases"),
                    )
                    .await;
            }
            outcome => {
                let reason = match outcome {
                    LoadOutcome::Corrupt(reason) => reason,
                    _ => "no saved index".to_string(),
                };
                self.inner
                    .client
                    .log_message(
                        MessageType::INFO,
                        format!("Building maxlink index ({reason})"),
                    )
                    .await;
                self.inner.spawn_rebuild();
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.inner.save_index().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.inner.documents.insert(
            uri.clone(),
            DocumentState {
                content: params.text_document.text,
                version: params.text_document.version,
                decorations: Vec::new(),
            },
        );
        self.inner.schedule_pass(uri, true).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // With FULL sync, we get the complete new content
        if let Some(change) = params.content_changes.into_iter().last() {
            match self.inner.documents.get_mut(&uri) {
                Some(mut doc) => {
                    doc.content = change.text;
                    doc.version = version;
                }
                None => {
                    self.inner.documents.insert(
                        uri.clone(),
                        DocumentState {
                            content: change.text,
                            version,
                            decorations: Vec::new(),
                        },
                    );
                }
            }
        }

        self.inner.schedule_pass(uri, false).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let Ok(path) = params.text_document.uri.to_file_path() else {
            return;
        };
        if self.inner.is_config(&path).await {
            self.inner.reload_and_redecorate().await;
        } else if is_markdown(&path) {
            self.inner.spawn_rebuild();
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if let Value::Object(map) = params.settings {
            if let Some(Value::String(config_path)) = map.get("configPath") {
                self.inner.set_config_path(config_path).await;
            }
        }
        self.inner.reload_and_redecorate().await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let mut reload = false;
        let mut rebuild = false;
        let mut deleted = Vec::new();
        let ws = self.inner.workspace().await;
        for change in &params.changes {
            let Ok(path) = change.uri.to_file_path() else {
                continue;
            };
            if self.inner.is_config(&path).await {
                reload = true;
            } else if is_markdown(&path) {
                let open = self.inner.documents.contains_key(&change.uri);
                match (markdown_change(change.typ, open), &ws) {
                    (MarkdownChange::Removed, Some(ws)) => deleted.push(ws.key_for(&change.uri)),
                    (MarkdownChange::Skip, _) => {}
                    _ => rebuild = true,
                }
            }
        }

        if reload {
            self.inner.reload_and_redecorate().await;
        }
        if rebuild {
            self.inner.spawn_rebuild();
        } else if !deleted.is_empty() {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.index.remove_documents(deleted).await });
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.inner.documents.remove(&uri);
        self.inner.debouncer.forget(&uri);
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = &params.text_document.uri;
        let Some(ws) = self.inner.workspace().await else {
            return Ok(None);
        };
        let hits: Vec<(Decoration, Range, String)> = {
            let Some(doc) = self.inner.documents.get(uri) else {
                return Ok(None);
            };
            let lines = LineIndex::new(&doc.content);
            let start = lines.offset(params.range.start);
            let end = lines.offset(params.range.end);
            decorations_at(&doc.decorations, &lines, &doc.content, start, end)
                .into_iter()
                .map(|(d, range, covered)| (d.clone(), range, covered))
                .collect()
        };
        if hits.is_empty() {
            return Ok(None);
        }

        let key = ws.key_for(uri);
        let index = self.inner.index.read().await;
        let mut actions = Vec::new();
        for (decoration, range, covered) in &hits {
            if !covered.starts_with("[[") {
                actions.push(CodeActionOrCommand::CodeAction(replace_action(
                    uri,
                    *range,
                    &decoration.phrase,
                )));
            }
            for (path, count) in index.related_documents(&decoration.phrase, Some(&key)) {
                actions.push(CodeActionOrCommand::CodeAction(goto_action(&path, count)));
            }
        }

        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        match params.command.as_str() {
            OPEN_DOCUMENT_COMMAND => {
                let Some(path) = params.arguments.first().and_then(Value::as_str) else {
                    return Err(jsonrpc::Error::invalid_params("expected a document path"));
                };
                let uri = match self.inner.workspace().await {
                    Some(ws) => ws.uri_for(path),
                    None => None,
                };
                let Some(uri) = uri else {
                    return Err(jsonrpc::Error::invalid_params(format!(
                        "cannot resolve {path}"
                    )));
                };
                let shown = self
                    .inner
                    .client
                    .show_document(ShowDocumentParams {
                        uri,
                        external: Some(false),
                        take_focus: Some(true),
                        selection: None,
                    })
                    .await?;
                if !shown {
                    self.inner
                        .client
                        .log_message(MessageType::WARNING, format!("Could not open {path}"))
                        .await;
                }
                Ok(None)
            }
            REBUILD_COMMAND => {
                self.inner.spawn_rebuild();
                Ok(None)
            }
            other => Err(jsonrpc::Error::invalid_params(format!(
                "unknown command {other}"
            ))),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoration(start: usize, end: usize, phrase: &str) -> Decoration {
        Decoration {
            start,
            end,
            phrase: phrase.to_string(),
            total: 3,
            intensity: 0.5,
        }
    }

    #[test]
    fn notification_payload_shape() {
        let params = DecorationsParams {
            uri: Url::parse("file:///notes/a.md").unwrap(),
            version: 4,
            decorations: vec![LspDecoration {
                range: LineIndex::new("a graph").range(decoration(2, 7, "graph").span()),
                phrase: "graph".into(),
                intensity: 0.5,
                color: "#800080".into(),
            }],
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(DecorationsNotification::METHOD, "maxlink/decorations");
        assert_eq!(json["uri"], "file:///notes/a.md");
        assert_eq!(json["version"], 4);
        assert_eq!(json["decorations"][0]["range"]["start"]["character"], 2);
        assert_eq!(json["decorations"][0]["color"], "#800080");
    }

    #[test]
    fn finds_decorations_under_cursor() {
        let text = "a [[neural network]] here";
        let lines = LineIndex::new(text);
        let decorations = vec![decoration(2, 20, "neural network"), decoration(21, 25, "here")];
        let hits = decorations_at(&decorations, &lines, text, 5, 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.phrase, "neural network");
        assert_eq!(hits[0].2, "[[neural network]]");
        assert!(decorations_at(&decorations, &lines, text, 20, 20).is_empty());
        // A selection running past the end of a span does not hit it.
        assert!(decorations_at(&decorations, &lines, text, 3, 22).is_empty());
    }

    #[test]
    fn replace_action_wraps_phrase_in_link() {
        let uri = Url::parse("file:///notes/a.md").unwrap();
        let range = LineIndex::new("a graph").range(decoration(2, 7, "graph").span());
        let action = replace_action(&uri, range, "graph");
        assert_eq!(action.title, "Replace with [[graph]]");
        let changes = action.edit.unwrap().changes.unwrap();
        let edits = &changes[&uri];
        assert_eq!(edits[0].new_text, "[[graph]]");
        assert_eq!(edits[0].range, range);
    }

    #[test]
    fn goto_action_runs_open_command() {
        let action = goto_action("notes/b.md", 2);
        assert_eq!(action.title, "Go to: notes/b.md (2)");
        let command = action.command.unwrap();
        assert_eq!(command.command, OPEN_DOCUMENT_COMMAND);
        assert_eq!(command.arguments, Some(vec![Value::String("notes/b.md".into())]));
    }

    #[test]
    fn returned_action_kinds_are_advertised() {
        let uri = Url::parse("file:///notes/a.md").unwrap();
        let advertised = advertised_action_kinds();
        for action in [
            replace_action(&uri, Range::default(), "graph"),
            goto_action("notes/b.md", 1),
        ] {
            assert!(advertised.contains(&action.kind.unwrap()), "{}", action.title);
        }
    }

    #[test]
    fn deleted_markdown_is_removed_in_place() {
        assert_eq!(markdown_change(FileChangeType::DELETED, false), MarkdownChange::Removed);
        assert_eq!(markdown_change(FileChangeType::DELETED, true), MarkdownChange::Removed);
        assert_eq!(markdown_change(FileChangeType::CHANGED, true), MarkdownChange::Skip);
        assert_eq!(markdown_change(FileChangeType::CHANGED, false), MarkdownChange::Rebuild);
        assert_eq!(markdown_change(FileChangeType::CREATED, true), MarkdownChange::Rebuild);
    }

    #[test]
    fn workspace_defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let ws = Workspace::load(root.clone(), root.join(CONFIG_FILE)).unwrap();
        assert_eq!(ws.cfg.debounce_ms, 1000);
        assert_eq!(ws.store.path(), root.join(".maxlink/phrase-index.json"));
        let uri = ws.uri_for("notes/a.md").unwrap();
        assert_eq!(ws.key_for(&uri), "notes/a.md");
    }

    #[test]
    fn workspace_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join(CONFIG_FILE), "debounce_ms: 250\ntheme: light\n").unwrap();
        let ws = Workspace::load(root.clone(), root.join(CONFIG_FILE)).unwrap();
        assert_eq!(ws.debounce(), Duration::from_millis(250));

        fs::write(root.join(CONFIG_FILE), "debounce_ms: soon\n").unwrap();
        assert!(Workspace::load(root.clone(), root.join(CONFIG_FILE)).is_err());
    }
}
