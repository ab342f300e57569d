//! Tracing subscriber setup for the command-line host.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_tree::HierarchicalLayer;

/// Options derived from the global CLI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// Nested span output instead of flat lines.
    pub tree: bool,
}

impl LogOptions {
    /// Default filter level for the verbosity count.
    pub fn level(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flags.
///
/// Logs go to stderr so stdout carries only the generated document.
pub fn init(options: LogOptions) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ctxfetch={}", options.level())));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if options.tree {
        registry
            .with(
                HierarchicalLayer::new(2)
                    .with_writer(std::io::stderr)
                    .with_targets(true)
                    .with_bracketed_fields(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };

    result.context("failed to install tracing subscriber")
}
