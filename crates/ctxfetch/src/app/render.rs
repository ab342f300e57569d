//! Context rendering: turns a snapshot of selections into one pasteable document.
//!
//! Stored line ranges are zero-based. This module is the only place that converts them to the
//! one-based numbers users see, in both directions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;

use crate::app::listeners::{ContextUpdateListener, ListenerRegistry};
use crate::domain::errors::{ContentUnavailable, RangeParseError};
use crate::domain::model::{FileRef, LineRange, SelectionItem, SelectionKind};
use crate::infra::source::FileSource;

pub const OPENING_BANNER: &str = "# --- Code context ---";
pub const CLOSING_BANNER: &str = "# End of code context";
pub const FILE_HEADER_PREFIX: &str = "## File: ";
pub const SNIPPET_HEADER_PREFIX: &str = "### L";
pub const CONTENT_UNAVAILABLE: &str = " ... file content could not be loaded ...";

const FENCE: &str = "```";
const DISPLAY_LINE_OFFSET: i64 = 1;

/// Generated document plus its one-line summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedContext {
    pub text: String,
    pub status: String,
}

impl RenderedContext {
    /// Whether no document has been generated.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Stateless renderer. Reads each distinct file once per call through the injected source.
#[derive(Clone)]
pub struct ContextRenderer {
    source: Arc<dyn FileSource>,
}

struct FileGroup<'a> {
    file: &'a FileRef,
    items: Vec<&'a SelectionItem>,
}

struct LoadedFile {
    display_path: String,
    language: String,
    content: Result<String, ContentUnavailable>,
}

impl ContextRenderer {
    /// Create a renderer reading content through `source`.
    pub fn new(source: Arc<dyn FileSource>) -> Self {
        Self { source }
    }

    /// Render `items` grouped by file, in order of each file's first appearance.
    ///
    /// Per-file problems never abort the batch: unreadable files render a placeholder and
    /// out-of-range snippets render whatever lines exist.
    pub fn render(&self, items: &[SelectionItem]) -> RenderedContext {
        let groups = group_by_file(items);
        let span = tracing::info_span!("generate_context", items = items.len(), files = groups.len());
        let _entered = span.enter();

        let loaded: Vec<LoadedFile> = groups
            .par_iter()
            .map(|group| self.load(group.file))
            .collect();

        let mut text = String::new();
        text.push_str(OPENING_BANNER);
        text.push_str("\n\n");

        let mut whole_files = 0;
        let mut snippets = 0;

        for (group, file) in groups.iter().zip(&loaded) {
            text.push_str(&format!("{FILE_HEADER_PREFIX}{}:\n\n", file.display_path));

            for item in &group.items {
                match item.kind {
                    SelectionKind::WholeFile => {
                        whole_files += 1;
                        let body = file.content.as_deref().unwrap_or(CONTENT_UNAVAILABLE);
                        push_fenced(&mut text, &file.language, body);
                    }
                    SelectionKind::Snippet(range) => {
                        snippets += 1;
                        let (start, end) = display_bounds(range);
                        text.push_str(&format!("{SNIPPET_HEADER_PREFIX}{start}-{end}\n"));
                        let body = match &file.content {
                            Ok(content) => extract_lines(content, range.start(), range.end()),
                            Err(_) => CONTENT_UNAVAILABLE.to_owned(),
                        };
                        push_fenced(&mut text, &file.language, &body);
                    }
                }
            }
        }

        text.push_str(CLOSING_BANNER);
        text.push('\n');

        let status = format_status(whole_files, snippets);
        tracing::info!(%status, bytes = text.len(), "context generated");
        RenderedContext { text, status }
    }

    fn load(&self, file: &FileRef) -> LoadedFile {
        let content = self.source.read_text(file);
        if let Err(err) = &content {
            tracing::warn!(path = %file, error = %err, "file content could not be loaded");
        }
        LoadedFile {
            display_path: self.source.display_path(file),
            language: self.source.language(file).unwrap_or_default(),
            content,
        }
    }
}

fn group_by_file(items: &[SelectionItem]) -> Vec<FileGroup<'_>> {
    let mut index: HashMap<&FileRef, usize> = HashMap::new();
    let mut groups: Vec<FileGroup<'_>> = Vec::new();

    for item in items {
        let slot = *index.entry(&item.file).or_insert_with(|| {
            groups.push(FileGroup {
                file: &item.file,
                items: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].items.push(item);
    }

    groups
}

fn push_fenced(out: &mut String, language: &str, body: &str) {
    out.push_str(FENCE);
    out.push_str(language);
    out.push('\n');
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push_str("\n\n");
}

/// Inclusive slice of `content`'s lines, zero-based.
///
/// A negative start counts as 0 and an end before the start collapses to the start. Lines past
/// the end of the content are simply absent, so the result may be empty.
pub fn extract_lines(content: &str, start: i64, end: i64) -> String {
    let start = start.max(0);
    let end = end.max(start);
    let skip = usize::try_from(start).unwrap_or(usize::MAX);
    let take = usize::try_from(end.saturating_sub(start).saturating_add(1)).unwrap_or(usize::MAX);

    content
        .lines()
        .skip(skip)
        .take(take)
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Context generated: N file(s)[, M snippet(s)]`.
pub fn format_status(whole_files: usize, snippets: usize) -> String {
    let mut status = format!("Context generated: {whole_files} file(s)");
    if snippets > 0 {
        status.push_str(&format!(", {snippets} snippet(s)"));
    }
    status
}

/// One-based inclusive bounds for display.
pub fn display_bounds(range: LineRange) -> (i64, i64) {
    (
        range.start().saturating_add(DISPLAY_LINE_OFFSET),
        range.end().saturating_add(DISPLAY_LINE_OFFSET),
    )
}

/// Parse a one-based `START` or `START-END` range typed by a user into a stored range.
pub fn parse_display_range(raw: &str) -> Result<LineRange, RangeParseError> {
    let trimmed = raw.trim();
    let (start, end) = match trimmed.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (trimmed, trimmed),
    };

    let parse = |value: &str| {
        value
            .parse::<i64>()
            .map_err(|_| RangeParseError::Malformed(raw.to_owned()))
    };
    let (start, end) = (parse(start)?, parse(end)?);

    for line in [start, end] {
        if line < DISPLAY_LINE_OFFSET {
            return Err(RangeParseError::ZeroLine(line));
        }
    }

    Ok(LineRange::new(
        start - DISPLAY_LINE_OFFSET,
        end - DISPLAY_LINE_OFFSET,
    )?)
}

/// Short list label: the file name, plus the one-based range for snippets.
pub fn item_label(item: &SelectionItem, source: &dyn FileSource) -> String {
    let name = source.display_name(&item.file);
    match item.kind {
        SelectionKind::WholeFile => name,
        SelectionKind::Snippet(range) => {
            let (start, end) = display_bounds(range);
            format!("{name} [L{start}-{end}]")
        }
    }
}

/// Renders on demand, remembers the latest document, and tells listeners about every update.
pub struct ContextGenerator {
    renderer: ContextRenderer,
    current: RwLock<RenderedContext>,
    listeners: ListenerRegistry<dyn ContextUpdateListener>,
}

impl std::fmt::Debug for ContextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGenerator")
            .field("status", &self.current.read().status)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl ContextGenerator {
    /// Create a generator with no current document.
    pub fn new(renderer: ContextRenderer) -> Self {
        Self {
            renderer,
            current: RwLock::new(RenderedContext::default()),
            listeners: ListenerRegistry::new("context_updated"),
        }
    }

    /// Render `items`, store the result, and notify listeners. Blocks on file reads.
    pub fn generate(&self, items: &[SelectionItem]) -> RenderedContext {
        let rendered = self.renderer.render(items);
        *self.current.write() = rendered.clone();
        self.listeners
            .notify(|listener| listener.on_context_updated(&rendered.text, &rendered.status));
        rendered
    }

    /// Drop the current document and notify listeners with an empty text and status.
    pub fn clear_generated(&self) {
        *self.current.write() = RenderedContext::default();
        self.listeners
            .notify(|listener| listener.on_context_updated("", ""));
    }

    /// Latest generated document, empty before the first generation or after a clear.
    pub fn current(&self) -> RenderedContext {
        self.current.read().clone()
    }

    /// Whether a generated document is currently held.
    pub fn has_context(&self) -> bool {
        !self.current.read().is_empty()
    }

    /// Register a context-update listener. Returns `false` if it was already registered.
    pub fn add_listener(&self, listener: Arc<dyn ContextUpdateListener>) -> bool {
        self.listeners.register(listener)
    }

    /// Unregister a context-update listener. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn ContextUpdateListener>) -> bool {
        self.listeners.unregister(listener)
    }
}
