//! Directory collection for bulk selection.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};
use parking_lot::Mutex;

use crate::infra::config::Config;

const CTXFETCH_IGNORE: &str = ".ctxfetchignore";
const BINARY_SNIFF_BYTES: usize = 1024;

/// Why a file under the collection root was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LargeFile,
    BinaryFile,
}

/// Recursively collect the text files under `dir`, sorted by path.
///
/// Honours `.gitignore`, the `[ignore]` patterns from `config`, and a `.ctxfetchignore` file at
/// `dir`. Hidden entries are skipped unless `workspace.show_hidden` is set. Files above the
/// configured size limit and files that look binary are dropped.
pub fn collect_files(dir: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let matcher = build_ignore_matcher(dir, config)?;
    let max_file_size = config.workspace.max_file_size();

    let mut builder = WalkBuilder::new(dir);
    builder
        .git_ignore(true)
        .require_git(false)
        .hidden(!config.workspace.show_hidden());

    let root = dir.to_path_buf();
    builder.filter_entry(move |entry| {
        if entry.depth() == 0 {
            return true;
        }
        let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        !matcher.should_skip(rel)
    });

    let files = Mutex::new(Vec::new());

    builder.build_parallel().run(|| {
        let files = &files;
        Box::new(move |result| {
            match result {
                Ok(entry) => match classify(&entry, max_file_size) {
                    Some(Ok(path)) => files.lock().push(path),
                    Some(Err(reason)) => {
                        tracing::debug!(path = %entry.path().display(), ?reason, "skipping file");
                    }
                    None => {}
                },
                Err(err) => tracing::warn!(error = %err, "directory walk error"),
            }
            WalkState::Continue
        })
    });

    let mut files = files.into_inner();
    files.sort();
    tracing::debug!(dir = %dir.display(), files = files.len(), "collected files");
    Ok(files)
}

/// `None` for anything that is not a regular file.
fn classify(entry: &DirEntry, max_file_size: u64) -> Option<Result<PathBuf, SkipReason>> {
    let metadata = entry.metadata().ok()?;
    if !metadata.is_file() {
        return None;
    }

    let path = entry.path();
    if metadata.len() > max_file_size {
        return Some(Err(SkipReason::LargeFile));
    }
    if is_probably_binary(path) {
        return Some(Err(SkipReason::BinaryFile));
    }
    Some(Ok(path.to_path_buf()))
}

fn is_probably_binary(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut buf = [0u8; BINARY_SNIFF_BYTES];
    match file.read(&mut buf) {
        Ok(0) | Err(_) => false,
        Ok(n) => {
            let slice = &buf[..n];
            // A multi-byte character cut at the buffer edge is not binary.
            slice.contains(&0)
                || std::str::from_utf8(slice).is_err_and(|err| err.error_len().is_some())
        }
    }
}

#[derive(Debug, Clone)]
struct IgnoreMatcher {
    globs: GlobSet,
}

impl IgnoreMatcher {
    fn should_skip(&self, rel: &Path) -> bool {
        self.globs.is_match(rel)
    }
}

fn build_ignore_matcher(root: &Path, config: &Config) -> Result<IgnoreMatcher> {
    let mut builder = GlobSetBuilder::new();

    for pattern in &config.ignore.paths {
        for expanded in expand_dir_pattern(pattern) {
            let glob = Glob::new(&expanded)
                .with_context(|| format!("invalid ignore path pattern '{pattern}'"))?;
            builder.add(glob);
        }
    }

    for pattern in &config.ignore.globs {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid ignore glob '{pattern}'"))?;
        builder.add(glob);
    }

    for pattern in load_ctxfetchignore(root)? {
        for expanded in expand_dir_pattern(&pattern) {
            let glob = Glob::new(&expanded)
                .with_context(|| format!("invalid {CTXFETCH_IGNORE} pattern '{pattern}'"))?;
            builder.add(glob);
        }
    }

    builder.add(Glob::new(CTXFETCH_IGNORE)?);

    let globs = builder.build().context("failed to build ignore matcher")?;
    Ok(IgnoreMatcher { globs })
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

fn load_ctxfetchignore(root: &Path) -> Result<Vec<String>> {
    let path = root.join(CTXFETCH_IGNORE);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut patterns = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        patterns.push(trimmed.to_owned());
    }
    Ok(patterns)
}
