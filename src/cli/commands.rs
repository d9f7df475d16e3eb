//! CLI command handlers.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{BlocksArgs, RefreshArgs, ReplayArgs};
use crate::auth::{
    BridgeOutbound, FileSessionStore, HttpTokenRefresher, RefreshCoordinator, SessionStore,
};
use crate::config::ChatflowConfig;
use crate::conversation::{rebuild_from_values, Conversation};
use crate::error::{ChatflowError, Result};
use crate::markdown::BlockStream;
use crate::types::{Message, Partition};

/// Handle `chatflow replay <file>`.
pub async fn handle_replay(
    args: &ReplayArgs,
    config: &ChatflowConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let messages = if args.history {
        let raw = tokio::fs::read_to_string(&args.file).await?;
        rebuild_from_values(&parse_history(&raw)?, config).into_messages()
    } else {
        let bytes = tokio::fs::read(&args.file).await?;
        replay_capture(bytes, args.chunk_size, config, cancel).await?
    };
    print!("{}", render_messages(&messages));
    Ok(())
}

/// Feed a capture through the live pipeline in fixed-size chunks.
pub async fn replay_capture(
    bytes: Vec<u8>,
    chunk_size: usize,
    config: &ChatflowConfig,
    cancel: CancellationToken,
) -> Result<Vec<Message>> {
    let chunks: Vec<Result<Vec<u8>>> = bytes
        .chunks(chunk_size.max(1))
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();
    let mut conversation = Conversation::live(config);
    let source = futures::stream::iter(chunks);
    match crate::stream::stream_turn(source, cancel, config, &mut conversation).await {
        Ok(applied) => tracing::debug!(applied, "Replay finished"),
        Err(e) if e.is_aborted() => eprintln!("(replay cancelled)"),
        Err(e) => return Err(e),
    }
    Ok(conversation.into_messages())
}

/// Accept a JSON array or one JSON value per line.
pub fn parse_history(raw: &str) -> Result<Vec<Value>> {
    if let Ok(Value::Array(values)) = serde_json::from_str::<Value>(raw) {
        return Ok(values);
    }
    let mut values = Vec::new();
    for (n, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(value) => values.push(value),
            Err(e) => tracing::debug!(line = n + 1, error = %e, "Skipping malformed history line"),
        }
    }
    Ok(values)
}

pub fn render_messages(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(out, "[{}] {}", message.role, message.id);
        let _ = writeln!(out, "{}", message.text);
        out.push('\n');
    }
    out
}

/// Handle `chatflow blocks <file>`.
pub async fn handle_blocks(args: &BlocksArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.file).await?;
    let mut stream = BlockStream::new();
    let mut grown = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut tick = 0usize;

    while chars.peek().is_some() {
        grown.extend(chars.by_ref().take(args.chunk_size.max(1)));
        tick += 1;
        let partition = stream.update(&grown);
        if args.verbose {
            println!("-- tick {tick} --");
            print!("{}", render_partition(partition));
        }
    }

    if !args.verbose {
        print!("{}", render_partition(stream.partition()));
    }
    Ok(())
}

pub fn render_partition(partition: &Partition) -> String {
    let mut out = String::new();
    for block in &partition.frozen_blocks {
        let _ = writeln!(out, "frozen {} ({})", block.key, block.kind);
    }
    if let Some(tail) = &partition.tail_block {
        let _ = writeln!(out, "tail   {} ({})", tail.key, tail.kind);
    }
    out
}

/// Handle `chatflow refresh`.
pub async fn handle_refresh(args: &RefreshArgs, config: &ChatflowConfig) -> Result<()> {
    let url = config.refresh_url.clone().ok_or_else(|| {
        ChatflowError::Configuration("refresh_url is not set (CHATFLOW_REFRESH_URL)".into())
    })?;
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::from_config(config));
    let refresher = HttpTokenRefresher::new(url, Arc::clone(&store)).with_profile(&args.profile);
    let coordinator = RefreshCoordinator::new(Arc::new(refresher))
        .with_store(Arc::clone(&store))
        .with_profile(&args.profile)
        .on_hard_failure(RefreshCoordinator::sign_out_hook(store, &args.profile));

    let outcome = coordinator.refresh().await;
    match outcome.token() {
        Some(token) => {
            println!("{}", BridgeOutbound::token(token).to_json()?);
            Ok(())
        }
        None => Err(ChatflowError::Authentication(
            outcome.error().unwrap_or("refresh failed").to_string(),
        )),
    }
}

/// Load config from an optional file plus the environment.
pub fn load_config(path: Option<&Path>) -> Result<ChatflowConfig> {
    let config = ChatflowConfig::load(path)?;
    config.validate()?;
    Ok(config)
}
