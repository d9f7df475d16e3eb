use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Access credential handed to the embedded surface and API calls.
///
/// # Example
/// ```
/// use chatflow::auth::AccessToken;
///
/// let token = AccessToken::new("opaque-token").with_expiry_ms(Some(1_700_000_000_000));
/// assert_eq!(token.expires_at_ms(), Some(1_700_000_000_000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Wrap a raw token; JWTs get their expiry from the `exp` claim.
    pub fn new(access_token: impl Into<String>) -> Self {
        let access_token = access_token.into();
        let expires_at = jwt_expiry(&access_token);
        Self {
            access_token,
            refresh_token: None,
            expires_at,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token.filter(|t| !t.is_empty());
        self
    }

    /// Explicit expiry in epoch milliseconds; `None` keeps the current value.
    pub fn with_expiry_ms(mut self, expires_at_ms: Option<i64>) -> Self {
        if let Some(at) = expires_at_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
            self.expires_at = Some(at);
        }
        self
    }

    pub fn expires_at_ms(&self) -> Option<i64> {
        self.expires_at.map(|at| at.timestamp_millis())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    pub fn is_usable(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}

/// Read the `exp` claim of a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    let secs = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    Utc.timestamp_opt(secs, 0).single()
}
