//! Discovers and reads the Markdown notes that make up the corpus.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::index::Document;
use crate::{Error, Result};

pub fn build_ignore_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::Glob {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| Error::Glob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })?;
    Ok(Some(set))
}

/// Markdown files under `paths`, sorted, skipping anything `ignore_globs` matches.
pub fn collect_markdown(paths: &[PathBuf], ignore_globs: &[String]) -> Result<Vec<PathBuf>> {
    let ignore = build_ignore_set(ignore_globs)?;
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut walker = WalkDir::new(path).into_iter();
            while let Some(entry_res) = walker.next() {
                let entry = entry_res?;
                let entry_path = entry.path();
                if let Some(set) = &ignore {
                    if set.is_match(entry_path) {
                        if entry.file_type().is_dir() {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                }
                if entry.file_type().is_file() && is_markdown(entry_path) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else if path.is_file() && is_markdown(path) {
            if ignore.as_ref().is_some_and(|set| set.is_match(path)) {
                continue;
            }
            files.push(path.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

pub fn is_markdown(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "md" | "markdown" | "mdx"),
        None => false,
    }
}

/// Index key for `path`: relative to `root`, with forward slashes.
pub fn document_key(root: &Path, path: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    relative.to_string_lossy().replace('\\', "/")
}

/// Reads `files` into documents keyed relative to `root`. Unreadable files
/// are logged and skipped.
pub fn load_corpus(root: &Path, files: &[PathBuf]) -> Vec<Document> {
    files
        .iter()
        .filter_map(|path| match fs::read_to_string(path) {
            Ok(text) => Some(Document::new(document_key(root, path), text)),
            Err(err) => {
                warn!(path = %path.display(), "skipping unreadable note: {err}");
                None
            }
        })
        .collect()
}
