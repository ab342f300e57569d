use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the test suite through cargo nextest
    Test {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
        /// Restrict the run to one workspace package
        #[arg(long, short)]
        package: Option<String>,
    },
    /// Run clippy over the workspace, denying warnings
    Lint,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Test {
            profile,
            release,
            package,
        } => run_nextest(profile, release, package),
        Commands::Lint => run_clippy(),
    }
}

fn run_nextest(profile: Option<String>, release: bool, package: Option<String>) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("nextest").arg("run");
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    if let Some(package) = package {
        cmd.arg("--package").arg(package);
    }
    run(cmd, "cargo nextest run")
}

fn run_clippy() -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"]);
    run(cmd, "cargo clippy")
}

fn run(mut cmd: Command, label: &str) -> Result<()> {
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("{label} failed");
    }
    Ok(())
}
