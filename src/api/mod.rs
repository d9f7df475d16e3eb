//! Shared HTTP client and the backend's `{ code, msg, data }` envelope.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChatflowError, Result};

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// Response wrapper used by every backend endpoint. `code == 0` is success.
///
/// Absent `msg` or `data` decode as `None`; `T` needs no `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T = Value> {
    pub code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Unwrap `data`, turning a non-zero code into [`ChatflowError::Api`].
    pub fn into_result(self) -> Result<Option<T>> {
        if self.is_success() {
            return Ok(self.data);
        }
        let message = self
            .msg
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "request failed".to_string());
        Err(ChatflowError::api(self.code, message))
    }
}

/// Map a non-2xx response to an error, preferring the envelope's `msg`.
pub fn status_error(status: u16, body: &str) -> ChatflowError {
    let message = serde_json::from_str::<ApiEnvelope>(body)
        .ok()
        .and_then(|env| env.msg)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => ChatflowError::Authentication(message),
        _ => ChatflowError::http(status, message),
    }
}

/// Decode an envelope body received with `status`.
pub fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<Option<T>> {
    if !(200..300).contains(&status) {
        return Err(status_error(status, body));
    }
    let envelope: ApiEnvelope<T> = serde_json::from_str(body)?;
    envelope.into_result()
}

/// Read a response and decode its envelope.
pub async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    tracing::debug!(status, bytes = body.len(), "Received API response");
    decode_body(status, &body)
}
