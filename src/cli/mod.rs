//! CLI entry point for Chatflow.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chatflow CLI
#[derive(Parser, Debug)]
#[command(
    name = "chatflow",
    version,
    about = "Replay chat event streams and inspect markdown blocks"
)]
pub struct Cli {
    /// TOML config file (environment variables override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fold a recorded event stream into messages
    Replay(ReplayArgs),
    /// Show how a markdown document is partitioned while it grows
    Blocks(BlocksArgs),
    /// Refresh the stored session token
    Refresh(RefreshArgs),
}

/// Arguments for `chatflow replay`.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Raw event-stream capture, or a JSON event list with --history
    pub file: PathBuf,

    /// Treat the file as stored history (JSON array or JSON lines)
    #[arg(long)]
    pub history: bool,

    /// Bytes per simulated network chunk
    #[arg(long, default_value_t = 64)]
    pub chunk_size: usize,
}

/// Arguments for `chatflow blocks`.
#[derive(Parser, Debug)]
pub struct BlocksArgs {
    /// Markdown file
    pub file: PathBuf,

    /// Characters appended per growth tick
    #[arg(long, default_value_t = 16)]
    pub chunk_size: usize,

    /// Print the partition after every tick
    #[arg(long)]
    pub verbose: bool,
}

/// Arguments for `chatflow refresh`.
#[derive(Parser, Debug)]
pub struct RefreshArgs {
    /// Session profile
    #[arg(long, default_value = "default")]
    pub profile: String,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
