//! JSON message bridge between the host and an embedded web surface.
//!
//! The surface asks for a fresh token with `auth_refresh_request`; the host
//! answers with `auth_refresh_result` carrying the same `requestId`. The host
//! may also push `auth_token` whenever its credential changes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::refresh::{RefreshCoordinator, RefreshOutcome};
use super::token::AccessToken;
use crate::error::Result;

/// Messages the embedded surface sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeInbound {
    #[serde(rename_all = "camelCase")]
    AuthRefreshRequest {
        #[serde(default)]
        request_id: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Messages the host sends to the embedded surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeOutbound {
    #[serde(rename_all = "camelCase")]
    AuthRefreshResult {
        request_id: Value,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AuthToken {
        access_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_expire_at_ms: Option<i64>,
    },
}

impl BridgeOutbound {
    /// Answer to `request_id` built from a refresh outcome.
    pub fn refresh_result(request_id: Value, outcome: &RefreshOutcome) -> Self {
        Self::AuthRefreshResult {
            request_id,
            ok: outcome.is_ok(),
            access_token: outcome.access_token().map(str::to_string),
            error: outcome.error().map(str::to_string),
        }
    }

    /// Push message for a new credential.
    pub fn token(token: &AccessToken) -> Self {
        Self::AuthToken {
            access_token: token.access_token.clone(),
            access_expire_at_ms: token.expires_at_ms(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a raw inbound message. Malformed input is dropped with a debug log.
pub fn parse_inbound(raw: &str) -> Option<BridgeInbound> {
    match serde_json::from_str::<BridgeInbound>(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed bridge message");
            None
        }
    }
}

/// Routes surface refresh requests through the shared coordinator.
#[derive(Debug, Clone)]
pub struct AuthBridge {
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthBridge {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Handle one raw inbound message, returning the reply to post back.
    pub async fn handle_message(&self, raw: &str) -> Option<BridgeOutbound> {
        match parse_inbound(raw)? {
            BridgeInbound::AuthRefreshRequest { request_id, source } => {
                tracing::debug!(
                    source = source.as_deref().unwrap_or("unknown"),
                    "Surface requested token refresh"
                );
                let outcome = self.coordinator.refresh().await;
                Some(BridgeOutbound::refresh_result(request_id, &outcome))
            }
            BridgeInbound::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn inbound_request_parses() {
        let msg =
            parse_inbound(r#"{"type":"auth_refresh_request","requestId":"q1","source":"api"}"#);
        assert_eq!(
            msg,
            Some(BridgeInbound::AuthRefreshRequest {
                request_id: json!("q1"),
                source: Some("api".into()),
            })
        );
    }

    #[test]
    fn unknown_types_and_garbage() {
        assert_eq!(parse_inbound(r#"{"type":"ping"}"#), Some(BridgeInbound::Unknown));
        assert_eq!(parse_inbound("not json"), None);
    }

    #[test]
    fn outbound_result_omits_absent_fields() {
        let msg = BridgeOutbound::refresh_result(
            json!(7),
            &RefreshOutcome::Failed {
                error: "nope".into(),
            },
        );
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "auth_refresh_result", "requestId": 7, "ok": false, "error": "nope"})
        );
    }

    #[test]
    fn token_push_carries_expiry() {
        let token = AccessToken::new("t").with_expiry_ms(Some(1_700_000_000_000));
        let value = serde_json::to_value(BridgeOutbound::token(&token)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "auth_token",
                "accessToken": "t",
                "accessExpireAtMs": 1_700_000_000_000i64
            })
        );
    }
}
