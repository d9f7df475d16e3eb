//! Refresh over HTTP against the backend's refresh endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::error::AuthError;
use super::refresh::TokenRefresher;
use super::store::SessionStore;
use super::token::AccessToken;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    access_expire_at_ms: Option<i64>,
}

/// Posts the stored refresh token and decodes the envelope reply.
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: String,
    store: Arc<dyn SessionStore>,
    profile: String,
}

impl HttpTokenRefresher {
    pub fn new(url: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            client: crate::api::shared_client().clone(),
            url: url.into(),
            store,
            profile: "default".to_string(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> Result<Option<AccessToken>, AuthError> {
        let current = self.store.load(&self.profile)?.ok_or(AuthError::NotLoggedIn)?;
        let refresh_token = current
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotLoggedIn)?;

        tracing::debug!(url = %self.url, "Requesting token refresh");
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;
        let data: Option<RefreshData> = crate::api::read_envelope(response).await?;

        let Some(data) = data else {
            return Ok(None);
        };
        let Some(access_token) = data.access_token.filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        let token = AccessToken::new(access_token)
            .with_refresh_token(data.refresh_token.or(Some(refresh_token)))
            .with_expiry_ms(data.access_expire_at_ms);
        Ok(Some(token))
    }
}
