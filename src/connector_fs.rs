//! Filesystem source for course documents.
//!
//! Walks `[docs] root`, keeps files matching `include_globs` and not
//! matching `exclude_globs`, and returns them sorted by relative path.
//! Entries the walk cannot read (dangling symlinks, loops, unreadable
//! directories) are logged and returned alongside the files so the
//! ingest can report them without stopping.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::DocsConfig;

/// A document file found under the docs root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocFile {
    pub path: PathBuf,
    /// Path relative to the docs root, `/`-separated. Used as the source id.
    pub relative: String,
}

impl DocFile {
    /// File name without extension, used when a document has no title line.
    pub fn stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
    }
}

/// A walk entry that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableEntry {
    pub relative: String,
    pub error: String,
}

/// Result of [`scan_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocScan {
    pub files: Vec<DocFile>,
    pub unreadable: Vec<UnreadableEntry>,
}

pub fn scan_docs(docs: &DocsConfig) -> Result<DocScan> {
    scan_dir(&docs.root, docs)
}

/// Only a missing root is an error; per-entry failures land in
/// [`DocScan::unreadable`].
pub fn scan_dir(root: &Path, docs: &DocsConfig) -> Result<DocScan> {
    if !root.exists() {
        bail!("Docs root does not exist: {}", root.display());
    }
    if root.is_file() {
        return Ok(DocScan {
            files: vec![DocFile {
                path: root.to_path_buf(),
                relative: root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            }],
            unreadable: Vec::new(),
        });
    }

    let include_set = build_globset(&docs.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(docs.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    let mut unreadable = Vec::new();

    let walker = WalkDir::new(root).follow_links(docs.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let rel_str = e
                    .path()
                    .map(|p| relative_path(root, p))
                    .unwrap_or_else(|| root.display().to_string());
                if exclude_set.is_match(&rel_str) {
                    continue;
                }
                tracing::warn!(path = %rel_str, "cannot read docs entry: {}", e);
                unreadable.push(UnreadableEntry {
                    relative: rel_str,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel_str = relative_path(root, path);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(DocFile {
            path: path.to_path_buf(),
            relative: rel_str,
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    unreadable.sort_by(|a, b| a.relative.cmp(&b.relative));

    Ok(DocScan { files, unreadable })
}

/// `path` relative to `root`, `/`-separated.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
