//! # Graph Authentication
//!
//! Client-credentials (app-only) token acquisition against Azure AD, with
//! in-memory caching. Tokens are refreshed five minutes before their
//! reported expiry so a token never goes stale mid-request.

use crate::error::{Result, SharePointError};
use crate::types::TokenResponse;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Refresh this long before the token's reported expiry
const EXPIRY_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Token source for Graph requests.
///
/// Cheap to share behind an `Arc`; concurrent callers serialize on the
/// cache so at most one token request is in flight at a time.
pub struct GraphAuth {
    http: reqwest::Client,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl GraphAuth {
    pub fn new(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached: Mutex::new(None),
        }
    }

    /// A currently valid bearer token, fetched or served from cache
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid(Utc::now()) {
                debug!("Using cached access token");
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let url = format!("{LOGIN_BASE}/{}/oauth2/v2.0/token", self.tenant_id);

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
        ];

        let response = self.http.post(&url).form(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SharePointError::AuthenticationFailed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SharePointError::ParseError(format!("token response: {e}")))?;

        let expires_at = Utc::now()
            + Duration::seconds(token.expires_in as i64)
            - Duration::seconds(EXPIRY_SKEW_SECS);

        info!(expires_in = token.expires_in, "Acquired Graph access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}
