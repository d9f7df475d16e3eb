//! Event-stream decoding: bytes to frames to envelopes.
//!
//! ```no_run
//! use chatflow::config::ChatflowConfig;
//! use chatflow::conversation::Conversation;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(response: reqwest::Response) -> chatflow::error::Result<()> {
//! let config = ChatflowConfig::default();
//! let mut conversation = Conversation::live(&config);
//! let bytes = chatflow::stream::response_byte_stream(response).await?;
//! let cancel = CancellationToken::new();
//! match chatflow::stream::stream_turn(bytes, cancel, &config, &mut conversation).await {
//!     Err(e) if e.is_aborted() => {} // user pressed stop
//!     other => { other?; }
//! }
//! # Ok(())
//! # }
//! ```

pub mod envelope;
pub mod frame;

pub use envelope::parse_envelope;
pub use frame::FrameDecoder;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::ChatflowConfig;
use crate::conversation::Conversation;
use crate::error::ChatflowError;
use crate::types::EventEnvelope;

/// Decode a chunked byte source into events.
///
/// The cancellation token is checked before every read and raced against
/// it; once it fires the stream yields [`ChatflowError::Aborted`] and ends.
/// A source error ends the stream after being yielded. Malformed frames are
/// skipped. At end of input any partial frame is flushed.
pub fn decode_stream<S, B, E>(
    source: S,
    cancel: CancellationToken,
    config: &ChatflowConfig,
) -> BoxStream<'static, Result<EventEnvelope, ChatflowError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatflowError> + Send + 'static,
{
    let mut decoder = FrameDecoder::new(
        config.sse_data_prefix.clone(),
        config.sse_done_sentinel.clone(),
    );

    let stream = async_stream::stream! {
        futures::pin_mut!(source);

        loop {
            if cancel.is_cancelled() {
                yield Err(ChatflowError::Aborted);
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = source.next() => Some(item),
            };

            let Some(item) = next else {
                tracing::debug!("Event stream cancelled");
                yield Err(ChatflowError::Aborted);
                break;
            };

            match item {
                Some(Ok(chunk)) => {
                    for payload in decoder.feed(chunk.as_ref()) {
                        if let Some(envelope) = parse_envelope(&payload) {
                            yield Ok(envelope);
                        }
                    }
                }
                Some(Err(e)) => {
                    let error: ChatflowError = e.into();
                    tracing::warn!(error = %error, "Event stream read failed");
                    yield Err(error);
                    break;
                }
                None => {
                    if let Some(payload) = decoder.finish() {
                        if let Some(envelope) = parse_envelope(&payload) {
                            yield Ok(envelope);
                        }
                    }
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

/// Check an HTTP response and expose its body as a byte stream.
///
/// A non-2xx status is an application failure even though transport
/// succeeded; the body is decoded as an API envelope when possible.
pub async fn response_byte_stream(
    response: reqwest::Response,
) -> Result<BoxStream<'static, Result<Vec<u8>, ChatflowError>>, ChatflowError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(crate::api::status_error(status.as_u16(), &body));
    }
    Ok(response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ChatflowError::from))
        .boxed())
}

/// Fold decoded events into a conversation until the stream ends.
///
/// Returns the number of events applied.
pub async fn consume_into<S>(
    events: S,
    conversation: &mut Conversation,
) -> Result<usize, ChatflowError>
where
    S: Stream<Item = Result<EventEnvelope, ChatflowError>>,
{
    futures::pin_mut!(events);
    let mut applied = 0;
    while let Some(item) = events.next().await {
        let envelope = item?;
        conversation.apply(&envelope);
        applied += 1;
    }
    Ok(applied)
}

/// Run one live turn: reset the content index, decode, and fold.
pub async fn stream_turn<S, B, E>(
    source: S,
    cancel: CancellationToken,
    config: &ChatflowConfig,
    conversation: &mut Conversation,
) -> Result<usize, ChatflowError>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatflowError> + Send + 'static,
{
    conversation.begin_turn();
    let events = decode_stream(source, cancel, config);
    consume_into(events, conversation).await
}
