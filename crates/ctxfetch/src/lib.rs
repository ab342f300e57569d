//! Aggregates whole files and line-range snippets from a workspace into one code context
//! document ready to paste into a chat prompt.

pub mod app;
pub mod domain;
pub mod infra;

pub use app::render::{ContextGenerator, ContextRenderer, RenderedContext};
pub use app::selection::SelectionStore;
pub use app::session::Session;
pub use domain::model::{FileRef, LineRange, SelectionItem, SelectionKind};
pub use infra::source::{FileSource, FsFileSource, MemoryFileSource};
