//! stepfs - scriptable shell over the STEPPPS virtual filesystem.
//!
//! Usage:
//!   # Interactive, one command per line on stdin
//!   stepfs
//!
//!   # Run a script against a configured mount table
//!   stepfs --config vfs.toml setup.fs
//!
//! Each line is one command (`help` lists them). A failing command prints
//! `error: ...` and the shell continues; the exit status reports whether
//! any command failed.

mod shell;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use steppps_vfs::{FileSystemManager, VfsConfig};

use crate::shell::Shell;

/// Shell over the STEPPPS virtual filesystem.
#[derive(Parser, Debug)]
#[command(name = "stepfs")]
#[command(about = "Run filesystem commands against an in-memory VFS")]
struct Args {
    /// TOML config describing limits, policies and mounts
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// Script file to run instead of reading stdin
    script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when at least one command failed.
async fn run(args: Args) -> Result<bool> {
    let config = match &args.config {
        Some(path) => {
            VfsConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => VfsConfig::default(),
    };
    let manager = FileSystemManager::from_config(&config).await?;
    tracing::info!(mounts = config.mounts.len().max(1), "filesystem ready");
    let shell = Shell::new(manager);

    let mut ok = true;
    match &args.script {
        Some(path) => {
            let script = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            for line in script.lines() {
                ok &= run_one(&shell, line).await;
            }
        }
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                ok &= run_one(&shell, &line).await;
            }
        }
    }
    Ok(ok)
}

async fn run_one(shell: &Shell, line: &str) -> bool {
    match shell.run_line(line).await {
        Ok(Some(out)) => {
            print!("{out}");
            true
        }
        Ok(None) => true,
        Err(e) => {
            eprintln!("error: {e:#}");
            false
        }
    }
}
