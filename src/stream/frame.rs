//! Incremental event-stream frame decoding.

use crate::config::{DEFAULT_DATA_PREFIX, DEFAULT_DONE_SENTINEL};

/// Splits a chunked byte stream into frame payloads.
///
/// Frames end at a blank line. Within a frame, every line starting with the
/// data prefix contributes its remainder (minus one leading space); the
/// contributions are joined with `\n`. Empty payloads and the done sentinel
/// are swallowed.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    prefix: String,
    sentinel: String,
    /// Bytes of an incomplete UTF-8 sequence carried to the next chunk.
    pending: Vec<u8>,
    buffer: String,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PREFIX, DEFAULT_DONE_SENTINEL)
    }
}

impl FrameDecoder {
    pub fn new(prefix: impl Into<String>, sentinel: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sentinel: sentinel.into(),
            pending: Vec::new(),
            buffer: String::new(),
        }
    }

    /// Feed arbitrary bytes and drain the payloads of completed frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => {
                // Invalid sequence mid-stream; decode lossily rather than stall.
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                return self.feed_str(&text);
            }
        };

        let tail = self.pending.split_off(valid_up_to);
        let text = String::from_utf8(std::mem::replace(&mut self.pending, tail))
            .unwrap_or_default();
        self.feed_str(&text)
    }

    /// Feed already-decoded text.
    pub fn feed_str(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        if self.buffer.contains('\r') {
            self.buffer = normalize_line_endings(&self.buffer);
        }

        let mut payloads = Vec::new();
        while let Some(split) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..split + 2).collect();
            if let Some(payload) = self.extract_payload(&frame[..split]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush whatever partial frame remains at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
            self.buffer.push_str(&rest);
        }
        let frame = normalize_line_endings(&std::mem::take(&mut self.buffer));
        self.extract_payload(&frame)
    }

    /// Decode a complete capture in one shot.
    pub fn decode_all(&mut self, input: &[u8]) -> Vec<String> {
        let mut payloads = self.feed(input);
        payloads.extend(self.finish());
        payloads
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.pending.is_empty() && self.buffer.trim().is_empty()
    }

    fn extract_payload(&self, frame: &str) -> Option<String> {
        let data_lines: Vec<&str> = frame
            .split('\n')
            .filter_map(|line| line.strip_prefix(self.prefix.as_str()))
            .map(|value| value.strip_prefix(' ').unwrap_or(value))
            .collect();

        if data_lines.is_empty() {
            return None;
        }

        let payload = data_lines.join("\n");
        let trimmed = payload.trim();
        if trimmed.is_empty() || trimmed == self.sentinel {
            tracing::trace!(payload = %trimmed, "Skipping no-op frame");
            return None;
        }
        Some(payload)
    }
}

fn normalize_line_endings(text: &str) -> String {
    // A lone trailing '\r' may be the first half of a split "\r\n".
    let (body, trailing_cr) = match text.strip_suffix('\r') {
        Some(body) => (body, true),
        None => (text, false),
    };
    let mut normalized = body.replace("\r\n", "\n").replace('\r', "\n");
    if trailing_cr {
        normalized.push('\r');
    }
    normalized
}
