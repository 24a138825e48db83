use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use console::style;
use maxlink_core::{
    collect_markdown, corpus::document_key, decorate, load_corpus, normalize, Config, Decoration,
    HttpExtractor, JsonFileStore, LoadOutcome, RebuildStats, SharedIndex, Theme,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// maxlink CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "maxlink",
    about = "Find phrases your Markdown notes share and show where they recur."
)]
struct Args {
    /// Path to config file (YAML). Defaults to maxlink.yml if present.
    #[arg(long, default_value = "maxlink.yml", global = true)]
    config: PathBuf,

    /// Set config overrides (repeatable as key=value). Example: --set extractor.port=5001
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    sets: Vec<String>,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild the phrase index from Markdown files and save it.
    Index {
        /// Files or directories to index.
        #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
        paths: Vec<PathBuf>,
    },
    /// Show which spans of a note would be highlighted.
    Decorate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List the notes that contain a phrase, most occurrences first.
    Related {
        phrase: String,
        /// Leave this note out of the listing.
        #[arg(long, value_name = "PATH")]
        exclude: Option<String>,
    },
    /// Print a note with its markup stripped.
    Normalize {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Everything a subcommand needs: config, workspace root and snapshot store.
struct Workspace {
    cfg: Config,
    root: PathBuf,
    store: JsonFileStore,
}

#[derive(Debug, Serialize)]
struct IndexReport {
    snapshot: String,
    #[serde(flatten)]
    stats: RebuildStats,
}

#[derive(Debug, Serialize)]
struct DecorationRow {
    line: usize,
    column: usize,
    #[serde(flatten)]
    decoration: Decoration,
    color: String,
}

#[derive(Debug, Serialize)]
struct RelatedRow {
    path: String,
    count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let (mut cfg, root) = load_config(&args.config)?;
    apply_overrides(&mut cfg, &args.sets)?;
    let store = JsonFileStore::from_config(&root, &cfg.database);
    let ws = Workspace { cfg, root, store };

    match &args.command {
        Command::Index { paths } => run_index(&ws, paths, args.json).await,
        Command::Decorate { file } => run_decorate(&ws, file, args.json).await,
        Command::Related { phrase, exclude } => {
            run_related(&ws, phrase, exclude.as_deref(), args.json).await
        }
        Command::Normalize { file } => run_normalize(file, args.json),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_index(ws: &Workspace, paths: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let shared = SharedIndex::default();
    let stats = rebuild_from(ws, &shared, paths).await?;
    shared
        .save(&ws.store)
        .await
        .with_context(|| format!("Failed to write {}", ws.store.path().display()))?;

    if json {
        let report = IndexReport {
            snapshot: ws.store.path().to_string_lossy().to_string(),
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!(
        "{} {} documents, {} phrases, {} spans",
        style("Indexed").green().bold(),
        stats.documents,
        stats.phrases,
        stats.spans
    );
    if stats.excluded > 0 {
        println!("  {} excluded by exclude_folders", stats.excluded);
    }
    if stats.failed_extractions > 0 {
        println!(
            "  {}",
            style(format!(
                "{} documents could not be sent to the extractor",
                stats.failed_extractions
            ))
            .yellow()
        );
    }
    println!("  saved to {}", style(ws.store.path().display()).cyan());
    Ok(())
}

async fn run_decorate(ws: &Workspace, file: &Path, json: bool) -> anyhow::Result<()> {
    let path = absolute(file)?;
    let text =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let key = document_key(&ws.root, &path);

    let shared = open_index(ws).await?;
    let extractor = HttpExtractor::new(&ws.cfg.extractor)?;
    let index = shared.read().await;
    let decorations = decorate(
        &text,
        &key,
        &index,
        &extractor,
        &ws.cfg.phrase_filter(),
        ws.cfg.max_highlight_count,
    )
    .await;

    let rows: Vec<DecorationRow> = decorations
        .into_iter()
        .map(|decoration| {
            let (line, column) = line_col(&text, decoration.start);
            DecorationRow {
                line,
                column,
                color: decoration.color(ws.cfg.theme).to_hex(),
                decoration,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{}", style(&key).bold());
    if rows.is_empty() {
        println!("  {}", style("no shared phrases").dim());
        return Ok(());
    }
    for row in &rows {
        print_decoration(row, ws.cfg.theme);
    }
    Ok(())
}

async fn run_related(
    ws: &Workspace,
    phrase: &str,
    exclude: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let shared = open_index(ws).await?;
    let index = shared.read().await;
    let phrase = phrase.trim().to_lowercase();
    let rows: Vec<RelatedRow> = index
        .related_documents(&phrase, exclude)
        .into_iter()
        .map(|(path, count)| RelatedRow { path, count })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No notes mention {}.", style(&phrase).bold());
        return Ok(());
    }
    for row in &rows {
        println!("  {:>4}  {}", row.count, style(&row.path).cyan());
    }
    Ok(())
}

fn run_normalize(file: &Path, json: bool) -> anyhow::Result<()> {
    let text =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let normalized = normalize(&text);
    if json {
        let value = serde_json::json!({
            "text": normalized.text,
            "offsets": normalized.offsets.as_slice(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", normalized.text);
    }
    Ok(())
}

/// Loads the saved index, rebuilding the whole workspace when there is none.
async fn open_index(ws: &Workspace) -> anyhow::Result<SharedIndex> {
    let shared = SharedIndex::default();
    match shared.load(&ws.store).await {
        LoadOutcome::Loaded { phrases } => {
            info!(phrases, "using saved phrase index");
            return Ok(shared);
        }
        LoadOutcome::Missing => info!("no saved phrase index, rebuilding"),
        LoadOutcome::Corrupt(reason) => warn!("rebuilding phrase index: {reason}"),
    }
    rebuild_from(ws, &shared, &[ws.root.clone()]).await?;
    if let Err(err) = shared.save(&ws.store).await {
        warn!("could not save phrase index: {err}");
    }
    Ok(shared)
}

async fn rebuild_from(
    ws: &Workspace,
    shared: &SharedIndex,
    paths: &[PathBuf],
) -> anyhow::Result<RebuildStats> {
    let paths = paths
        .iter()
        .map(|p| absolute(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let files = collect_markdown(&paths, &ws.cfg.ignore_globs)?;
    if files.is_empty() {
        warn!("no Markdown files found");
    }
    let corpus = load_corpus(&ws.root, &files);
    let extractor = HttpExtractor::new(&ws.cfg.extractor)?;
    Ok(shared
        .rebuild(
            corpus,
            &extractor,
            &ws.cfg.phrase_filter(),
            &ws.cfg.exclusions(),
        )
        .await)
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(env::current_dir()?.join(path))
}

/// Reads the config and returns it with the directory it applies to.
fn load_config(path: &Path) -> anyhow::Result<(Config, PathBuf)> {
    let path = absolute(path)?;
    if !path.exists() {
        return Ok((Config::default(), env::current_dir()?));
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let cfg = Config::from_yaml(&text)
        .with_context(|| format!("Invalid config structure in {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) => parent.to_path_buf(),
        None => env::current_dir()?,
    };
    Ok((cfg, dir))
}

fn apply_overrides(cfg: &mut Config, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let Some((key, val)) = kv.split_once('=') else {
            bail!("override `{kv}` is not KEY=VALUE");
        };
        let (key, val) = (key.trim(), val.trim());
        if key.is_empty() {
            continue;
        }
        match key {
            "extractor.protocol" => cfg.extractor.protocol = val.to_string(),
            "extractor.host" => cfg.extractor.host = val.to_string(),
            "extractor.port" => {
                cfg.extractor.port = val.parse::<u16>().unwrap_or(cfg.extractor.port);
            }
            "extractor.path" => cfg.extractor.path = val.to_string(),
            "extractor.timeout_secs" => {
                cfg.extractor.timeout_secs =
                    val.parse::<u64>().unwrap_or(cfg.extractor.timeout_secs);
            }
            "database.dir" => cfg.database.dir = PathBuf::from(val),
            "database.file_name" => cfg.database.file_name = val.to_string(),
            "min_phrase_length" => {
                cfg.min_phrase_length = val.parse::<usize>().unwrap_or(cfg.min_phrase_length);
            }
            "max_highlight_count" => {
                cfg.max_highlight_count = val.parse::<usize>().unwrap_or(cfg.max_highlight_count);
            }
            "debounce_ms" => {
                cfg.debounce_ms = val.parse::<u64>().unwrap_or(cfg.debounce_ms);
            }
            "exclude_folders" => cfg.exclude_folders = split_list(val),
            "ignore_phrases" => cfg.ignore_phrases = split_list(val),
            "theme" => {
                cfg.theme = if val.eq_ignore_ascii_case("light") {
                    Theme::Light
                } else {
                    Theme::Dark
                };
            }
            other => warn!("ignoring unknown override `{other}`"),
        }
    }
    Ok(())
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 1-based line and column of a char offset.
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for ch in text.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

fn print_decoration(row: &DecorationRow, theme: Theme) {
    let d = &row.decoration;
    let bar = "█".repeat(1 + (d.intensity * 9.0).round() as usize);
    println!(
        "  {:>4}:{:<3} {:<32} {:>3} elsewhere  {} {}",
        row.line,
        row.column,
        style(&d.phrase).bold(),
        d.total,
        style(bar).color256(color256(d.color(theme))),
        style(&row.color).dim()
    );
}

/// Nearest xterm-256 cube color.
fn color256(rgb: maxlink_core::Rgb) -> u8 {
    let level = |c: u8| ((c as u16 * 5 + 127) / 255) as u8;
    16 + 36 * level(rgb.r) + 6 * level(rgb.g) + level(rgb.b)
}
