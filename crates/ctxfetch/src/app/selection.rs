//! Aggregation store tracking whole-file and snippet selections.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;

use crate::app::listeners::{FilesChangeListener, ListenerRegistry};
use crate::domain::model::{FileRef, LineRange, SelectionItem, SelectionKind};
use crate::infra::source::FileSource;

/// Per-file state. A file is tracked either whole or as a non-empty set of ranges, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileSlot {
    Whole,
    Snippets(BTreeSet<LineRange>),
}

impl FileSlot {
    fn push_items(&self, file: &FileRef, out: &mut Vec<SelectionItem>) {
        match self {
            FileSlot::Whole => out.push(SelectionItem::whole_file(file.clone())),
            FileSlot::Snippets(ranges) => out.extend(
                ranges
                    .iter()
                    .map(|range| SelectionItem::snippet(file.clone(), *range)),
            ),
        }
    }

    fn snippet_count(&self) -> usize {
        match self {
            FileSlot::Whole => 0,
            FileSlot::Snippets(ranges) => ranges.len(),
        }
    }

    fn item_count(&self) -> usize {
        match self {
            FileSlot::Whole => 1,
            FileSlot::Snippets(ranges) => ranges.len(),
        }
    }
}

/// Outcome of a single-item removal performed inside a shard lock.
enum Removal {
    Removed,
    Missing,
}

/// Concurrent set of selections for one workspace session.
///
/// Every mutation on a file happens inside that file's map entry, so the whole-file/snippet
/// exclusion holds without a global lock. Mutators share `gate`; snapshot reads and
/// [`SelectionStore::clear`] take it exclusively, which keeps multi-file reads untorn.
/// Listeners run after the gate is released, so they observe the post-mutation state.
pub struct SelectionStore {
    source: Arc<dyn FileSource>,
    files: DashMap<FileRef, FileSlot>,
    gate: RwLock<()>,
    listeners: ListenerRegistry<dyn FilesChangeListener>,
}

impl fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionStore")
            .field("files", &self.files.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl SelectionStore {
    /// Create an empty store validating files against `source`.
    pub fn new(source: Arc<dyn FileSource>) -> Self {
        Self {
            source,
            files: DashMap::new(),
            gate: RwLock::new(()),
            listeners: ListenerRegistry::new("files_changed"),
        }
    }

    /// Track `file` as a whole file.
    ///
    /// Fails when the file is invalid or already tracked in any form.
    pub fn add_file(&self, file: &FileRef) -> bool {
        if !self.source.is_valid(file) {
            tracing::warn!(path = %file, "refusing to add invalid file");
            return false;
        }

        let added = {
            let _shared = self.gate.read();
            self.insert_whole(file)
        };

        if added {
            self.notify_changed();
        } else {
            tracing::debug!(path = %file, "file already tracked");
        }
        added
    }

    /// Track every valid, untracked file as a whole file. Returns how many were added and fires
    /// at most one notification for the batch.
    pub fn add_files(&self, files: impl IntoIterator<Item = FileRef>) -> usize {
        let candidates: Vec<FileRef> = files
            .into_iter()
            .filter(|file| self.source.is_valid(file))
            .collect();

        let added = {
            let _shared = self.gate.read();
            candidates
                .iter()
                .filter(|file| self.insert_whole(file))
                .count()
        };

        if added > 0 {
            self.notify_changed();
        }
        added
    }

    /// Track a line range of `file`.
    ///
    /// Fails when the file is invalid, the range is malformed, the file is tracked whole, or the
    /// exact range is already tracked. Distinct ranges of one file accumulate.
    pub fn add_snippet(&self, file: &FileRef, range: LineRange) -> bool {
        if !self.source.is_valid(file) {
            tracing::warn!(path = %file, "refusing to add snippet from invalid file");
            return false;
        }
        if !range.is_valid() {
            tracing::warn!(path = %file, %range, "refusing to add invalid line range");
            return false;
        }

        let added = {
            let _shared = self.gate.read();
            match self.files.entry(file.clone()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(FileSlot::Snippets(BTreeSet::from([range])));
                    true
                }
                Entry::Occupied(mut occupied) => match occupied.get_mut() {
                    FileSlot::Whole => false,
                    FileSlot::Snippets(ranges) => ranges.insert(range),
                },
            }
        };

        if added {
            tracing::debug!(path = %file, %range, lines = range.line_count(), "snippet added");
            self.notify_changed();
        } else {
            tracing::debug!(path = %file, %range, "snippet conflicts with existing selection");
        }
        added
    }

    /// Stop tracking `file` as a whole file. Snippets of the file are left alone.
    pub fn remove_file(&self, file: &FileRef) -> bool {
        let removed = {
            let _shared = self.gate.read();
            matches!(self.remove_whole(file), Removal::Removed)
        };

        if removed {
            self.notify_changed();
        }
        removed
    }

    /// Remove one exact snippet. The file stops being tracked once its last range is gone.
    pub fn remove_snippet(&self, file: &FileRef, range: LineRange) -> bool {
        let removed = {
            let _shared = self.gate.read();
            matches!(self.remove_range(file, range), Removal::Removed)
        };

        if removed {
            self.notify_changed();
        }
        removed
    }

    /// Remove a mixed batch of items. Returns how many were removed and fires at most one
    /// notification.
    pub fn remove_items<'a>(&self, items: impl IntoIterator<Item = &'a SelectionItem>) -> usize {
        let removed = {
            let _shared = self.gate.read();
            items
                .into_iter()
                .map(|item| match item.kind {
                    SelectionKind::WholeFile => self.remove_whole(&item.file),
                    SelectionKind::Snippet(range) => self.remove_range(&item.file, range),
                })
                .filter(|outcome| matches!(outcome, Removal::Removed))
                .count()
        };

        if removed > 0 {
            self.notify_changed();
        }
        removed
    }

    /// Whether any selection references `file`.
    pub fn contains_file(&self, file: &FileRef) -> bool {
        self.files.contains_key(file)
    }

    /// Snapshot of every item in no particular order.
    pub fn all_items(&self) -> Vec<SelectionItem> {
        let snapshot = self.snapshot();
        let capacity = snapshot.iter().map(|(_, slot)| slot.item_count()).sum();
        let mut items = Vec::with_capacity(capacity);
        for (file, slot) in &snapshot {
            slot.push_items(file, &mut items);
        }
        items
    }

    /// Snapshot ordered by display name, then whole file before snippets, then by range.
    pub fn sorted_items(&self) -> Vec<SelectionItem> {
        let items = self.all_items();

        let mut names: HashMap<FileRef, String> = HashMap::new();
        for item in &items {
            if !names.contains_key(&item.file) {
                names.insert(item.file.clone(), self.source.display_name(&item.file));
            }
        }

        let mut keyed: Vec<(&str, SelectionItem)> = Vec::with_capacity(items.len());
        for item in items {
            let name = names.get(&item.file).map(String::as_str).unwrap_or_default();
            keyed.push((name, item));
        }
        keyed.sort_by(|(a_name, a), (b_name, b)| {
            a_name
                .cmp(b_name)
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        keyed.into_iter().map(|(_, item)| item).collect()
    }

    /// Items for one file, whole file first then ranges ascending.
    pub fn items_for_file(&self, file: &FileRef) -> Vec<SelectionItem> {
        let mut items = Vec::new();
        if let Some(slot) = self.files.get(file) {
            slot.push_items(file, &mut items);
        }
        items
    }

    /// Number of distinct files referenced by any item.
    pub fn file_count(&self) -> usize {
        let _exclusive = self.gate.write();
        self.files.len()
    }

    /// Number of snippet items across all files.
    pub fn snippet_count(&self) -> usize {
        let _exclusive = self.gate.write();
        self.files
            .iter()
            .map(|entry| entry.value().snippet_count())
            .sum()
    }

    /// Total number of items, whole files and snippets alike.
    pub fn len(&self) -> usize {
        let _exclusive = self.gate.write();
        self.files
            .iter()
            .map(|entry| entry.value().item_count())
            .sum()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        let _exclusive = self.gate.write();
        self.files.is_empty()
    }

    /// Remove everything. Notifies only when something was tracked.
    pub fn clear(&self) {
        let cleared = {
            let _exclusive = self.gate.write();
            let had_items = !self.files.is_empty();
            self.files.clear();
            had_items
        };

        if cleared {
            self.notify_changed();
        }
    }

    /// Register a change listener. Returns `false` if it was already registered.
    pub fn add_listener(&self, listener: Arc<dyn FilesChangeListener>) -> bool {
        self.listeners.register(listener)
    }

    /// Unregister a change listener. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn FilesChangeListener>) -> bool {
        self.listeners.unregister(listener)
    }

    fn insert_whole(&self, file: &FileRef) -> bool {
        match self.files.entry(file.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(FileSlot::Whole);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    fn remove_whole(&self, file: &FileRef) -> Removal {
        match self
            .files
            .remove_if(file, |_, slot| matches!(slot, FileSlot::Whole))
        {
            Some(_) => Removal::Removed,
            None => Removal::Missing,
        }
    }

    fn remove_range(&self, file: &FileRef, range: LineRange) -> Removal {
        let Entry::Occupied(mut occupied) = self.files.entry(file.clone()) else {
            return Removal::Missing;
        };

        let now_empty = match occupied.get_mut() {
            FileSlot::Whole => return Removal::Missing,
            FileSlot::Snippets(ranges) => {
                if !ranges.remove(&range) {
                    return Removal::Missing;
                }
                ranges.is_empty()
            }
        };

        if now_empty {
            occupied.remove();
        }
        Removal::Removed
    }

    fn snapshot(&self) -> Vec<(FileRef, FileSlot)> {
        let _exclusive = self.gate.write();
        self.files
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn notify_changed(&self) {
        self.listeners.notify(|listener| listener.on_files_changed());
    }
}
