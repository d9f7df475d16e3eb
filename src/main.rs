//! Chatflow CLI binary entry point.

use chatflow::cli::commands::{handle_blocks, handle_refresh, handle_replay, load_config};
use chatflow::cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Replay(args) => handle_replay(&args, &config, cancel).await,
            Commands::Blocks(args) => handle_blocks(&args).await,
            Commands::Refresh(args) => handle_refresh(&args, &config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
