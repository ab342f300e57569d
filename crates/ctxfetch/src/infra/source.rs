//! File content and metadata capabilities consumed by the store and renderer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::domain::errors::ContentUnavailable;
use crate::domain::model::FileRef;
use crate::infra::config::Config;

/// Read access to workspace files.
///
/// Implementations must tolerate concurrent calls for different files.
pub trait FileSource: Send + Sync {
    /// Full text of the file.
    fn read_text(&self, file: &FileRef) -> Result<String, ContentUnavailable>;

    /// Whether the file still exists and can be referenced.
    fn is_valid(&self, file: &FileRef) -> bool;

    /// Path shown in file headers.
    fn display_path(&self, file: &FileRef) -> String {
        file.to_string()
    }

    /// Short label used for list ordering and item labels.
    fn display_name(&self, file: &FileRef) -> String {
        file.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string())
    }

    /// Fence annotation for code blocks; `None` when unknown.
    fn language(&self, file: &FileRef) -> Option<String> {
        language_for_path(file.path())
    }
}

/// Filesystem-backed source rooted at a workspace directory.
#[derive(Debug, Clone)]
pub struct FsFileSource {
    root: PathBuf,
    max_file_size: u64,
    languages: HashMap<String, String>,
}

impl FsFileSource {
    /// Source rooted at `root` with no size limit or language overrides.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: u64::MAX,
            languages: HashMap::new(),
        }
    }

    /// Build a source honouring the size limit and language overrides from configuration.
    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            max_file_size: config.workspace.max_file_size(),
            languages: config
                .languages
                .iter()
                .map(|(ext, tag)| (ext.to_ascii_lowercase(), tag.clone()))
                .collect(),
        }
    }

    /// Resolve a caller-supplied path against the workspace root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> FileRef {
        let path = path.as_ref();
        if path.is_absolute() {
            FileRef::new(path)
        } else {
            FileRef::from(self.root.join(path))
        }
    }
}

impl FileSource for FsFileSource {
    fn read_text(&self, file: &FileRef) -> Result<String, ContentUnavailable> {
        let path = file.path();
        let metadata = fs::metadata(path)
            .map_err(|err| ContentUnavailable::new(self.display_path(file), err.to_string()))?;
        if metadata.len() > self.max_file_size {
            return Err(ContentUnavailable::new(
                self.display_path(file),
                format!(
                    "file is {} bytes, above the {} byte limit",
                    metadata.len(),
                    self.max_file_size
                ),
            ));
        }
        fs::read_to_string(path)
            .map_err(|err| ContentUnavailable::new(self.display_path(file), err.to_string()))
    }

    fn is_valid(&self, file: &FileRef) -> bool {
        fs::metadata(file.path()).is_ok_and(|meta| meta.is_file())
    }

    fn display_path(&self, file: &FileRef) -> String {
        file.path()
            .strip_prefix(&self.root)
            .unwrap_or(file.path())
            .display()
            .to_string()
    }

    fn language(&self, file: &FileRef) -> Option<String> {
        file.path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.languages.get(&ext.to_ascii_lowercase()).cloned())
            .or_else(|| language_for_path(file.path()))
    }
}

/// In-memory workspace, handy for hosts that keep unsaved buffers and for tests.
#[derive(Debug, Default)]
pub struct MemoryFileSource {
    files: DashMap<FileRef, String>,
}

impl MemoryFileSource {
    /// Empty in-memory workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file and return its handle.
    pub fn insert(&self, path: impl AsRef<Path>, contents: impl Into<String>) -> FileRef {
        let file = FileRef::new(path);
        self.files.insert(file.clone(), contents.into());
        file
    }

    /// Drop a file. Returns `false` when it was not present.
    pub fn remove(&self, file: &FileRef) -> bool {
        self.files.remove(file).is_some()
    }
}

impl FileSource for MemoryFileSource {
    fn read_text(&self, file: &FileRef) -> Result<String, ContentUnavailable> {
        self.files
            .get(file)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ContentUnavailable::new(file.to_string(), "no such file"))
    }

    fn is_valid(&self, file: &FileRef) -> bool {
        self.files.contains_key(file)
    }
}

/// Guess a fence language tag from the file extension.
pub fn language_for_path(path: &Path) -> Option<String> {
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        match name {
            "Dockerfile" => return Some("dockerfile".into()),
            "Makefile" | "makefile" | "GNUmakefile" => return Some("makefile".into()),
            _ => {}
        }
    }

    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let tag = match ext.as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "go" => "go",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "sh" | "bash" | "zsh" => "bash",
        "ps1" => "powershell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "md" | "markdown" => "markdown",
        "properties" => "properties",
        "gradle" => "groovy",
        "lua" => "lua",
        "hs" => "haskell",
        "ex" | "exs" => "elixir",
        "erl" => "erlang",
        "zig" => "zig",
        "dart" => "dart",
        "vue" => "vue",
        _ => return None,
    };
    Some(tag.to_owned())
}
