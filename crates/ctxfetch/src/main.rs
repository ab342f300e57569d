use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use ctxfetch::app::render::parse_display_range;
use ctxfetch::app::scan::collect_files;
use ctxfetch::infra::config::Config;
use ctxfetch::infra::logging::{self, LogOptions};
use ctxfetch::{FileRef, FsFileSource, LineRange, Session};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Print logs as an indented span tree
    #[arg(long, global = true)]
    log_tree: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render selected files and snippets into one code context document
    Render(RenderArgs),
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Workspace root; relative selections resolve against it
    #[arg(long)]
    root: Option<PathBuf>,
    /// Add a whole file
    #[arg(long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,
    /// Add a snippet, lines are 1-based and inclusive
    #[arg(long = "snippet", value_name = "PATH:START[-END]")]
    snippets: Vec<String>,
    /// Add every text file under a directory
    #[arg(long = "dir", value_name = "DIR")]
    dirs: Vec<PathBuf>,
    /// Write the document here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Emit `{"text": .., "status": ..}` JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogOptions {
        verbosity: cli.verbose,
        tree: cli.log_tree,
    })?;

    match cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_owned();
            clap_complete::generate(shell, &mut command, name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let config = Config::load_for(&root)?;
    let source = Arc::new(FsFileSource::from_config(&root, &config));

    let mut session = Session::new(source.clone(), &config);
    session.set_auto_generate(false);
    let store = session.store();

    for dir in &args.dirs {
        let dir = source.resolve(dir);
        let files = collect_files(dir.path(), &config)?;
        let added = store.add_files(files.into_iter().map(FileRef::from));
        tracing::info!(dir = %dir, added, "added directory");
    }

    for file in &args.files {
        let file = source.resolve(file);
        if !store.add_file(&file) {
            tracing::warn!(path = %file, "file not added");
        }
    }

    for raw in &args.snippets {
        let (path, range) = parse_snippet_arg(raw)?;
        let file = source.resolve(path);
        if !store.add_snippet(&file, range) {
            tracing::warn!(path = %file, %range, "snippet not added");
        }
    }

    if store.is_empty() {
        anyhow::bail!("nothing selected; pass --file, --snippet or --dir");
    }

    let rendered = session.generate();
    let payload = if args.json {
        let mut json =
            serde_json::to_string_pretty(&rendered).context("failed to serialise context")?;
        json.push('\n');
        json
    } else {
        rendered.text.clone()
    };

    match &args.output {
        Some(path) => write_output(path, &payload)?,
        None => io::stdout()
            .lock()
            .write_all(payload.as_bytes())
            .context("failed to write context to stdout")?,
    }
    eprintln!("{}", rendered.status);
    Ok(())
}

fn write_output(path: &Path, payload: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))
}

/// Split `PATH:START[-END]` at the last colon so paths containing colons survive.
fn parse_snippet_arg(raw: &str) -> Result<(PathBuf, LineRange)> {
    let (path, range) = raw
        .rsplit_once(':')
        .filter(|(path, _)| !path.is_empty())
        .with_context(|| format!("snippet '{raw}' must look like PATH:START[-END]"))?;
    let range = parse_display_range(range).with_context(|| format!("invalid snippet '{raw}'"))?;
    Ok((PathBuf::from(path), range))
}
