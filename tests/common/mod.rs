//! Shared test helpers: event-stream builders, a counting refresher, and an
//! in-memory session store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use chatflow::auth::{AccessToken, AuthError, SessionStore, TokenRefresher};
use chatflow::error::ChatflowError;

/// One `data:` frame terminated by a blank line.
pub fn sse_frame(payload: &Value) -> String {
    format!("data: {payload}\n\n")
}

/// Concatenated frames for a list of events.
pub fn sse_body(events: &[Value]) -> String {
    events.iter().map(sse_frame).collect()
}

/// Split bytes into fixed-size chunks as a fallible byte source.
pub fn chunked(bytes: &[u8], size: usize) -> Vec<Result<Vec<u8>, ChatflowError>> {
    bytes.chunks(size.max(1)).map(|c| Ok(c.to_vec())).collect()
}

/// What the counting refresher answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Token(&'static str),
    Blank,
    Fail(&'static str),
}

/// Counts underlying refresh calls and takes a while to answer.
pub struct CountingRefresher {
    calls: AtomicUsize,
    delay: Duration,
    reply: Reply,
}

impl CountingRefresher {
    pub fn new(reply: Reply) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
            reply,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self) -> Result<Option<AccessToken>, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        match &self.reply {
            Reply::Token(prefix) => Ok(Some(AccessToken::new(format!("{prefix}-{n}")))),
            Reply::Blank => Ok(None),
            Reply::Fail(msg) => Err(AuthError::Rejected((*msg).to_string())),
        }
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, profile: &str, token: AccessToken) {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert(profile.to_string(), token);
    }

    pub fn get(&self, profile: &str) -> Option<AccessToken> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .get(profile)
            .cloned()
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, profile: &str) -> Result<Option<AccessToken>, AuthError> {
        Ok(self.get(profile))
    }

    fn save(&self, profile: &str, token: &AccessToken) -> Result<(), AuthError> {
        self.seed(profile, token.clone());
        Ok(())
    }

    fn clear(&self, profile: &str) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .remove(profile);
        Ok(())
    }
}
