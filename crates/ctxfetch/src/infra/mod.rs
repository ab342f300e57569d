//! Infrastructure adapters for file access, configuration, and logging.

pub mod config;
pub mod logging;
pub mod source;
