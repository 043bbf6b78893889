//! `vexfs` command-line tool.
//!
//! Thin wrapper around the vexfs library for looking inside packs:
//! summarize, list, print, extract and checksum their entries.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vexfs::VfsConfig;

#[derive(Parser)]
#[command(
    name = "vexfs",
    about = "Inspect and extract Vex packed asset archives",
    version
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with file system settings
    #[arg(short, long, global = true, env = "VEXFS_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON document
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Summarize a pack
    Info {
        /// Directory file (`<name>_dir.vpk`)
        pack: PathBuf,
    },

    /// List entries of a pack
    List {
        /// Directory file
        pack: PathBuf,
        /// Only list entries under this virtual directory
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Write one file to stdout
    Cat {
        /// Virtual path
        path: String,
        /// Directory files to mount, in order
        #[arg(short, long = "pack", required = true)]
        packs: Vec<PathBuf>,
    },

    /// Extract every entry of a pack into a directory
    Extract {
        /// Directory file
        pack: PathBuf,
        /// Output directory
        output: PathBuf,
    },

    /// Recompute and compare entry checksums
    Verify {
        /// Directory file
        pack: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => VfsConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => VfsConfig::default(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(cli.command, config, cli.format, &mut out)
}
