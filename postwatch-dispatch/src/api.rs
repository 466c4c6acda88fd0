//! Chat platform HTTP client: OAuth client-credentials tokens, the operator's
//! profile, and topic reposts.
//!
//! | Call            | Request                                                  |
//! |-----------------|----------------------------------------------------------|
//! | token           | `POST <api>/oauth2/access_token` (form)                  |
//! | `my_profile`    | `GET  <api>/api/v1/profile`                              |
//! | `post_message`  | `POST <api>/api/v1/topics/{topic_id}` (form `message=…`) |

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use postwatch_core::{SelfIdentity, TopicId};

use crate::error::{api_err, ApiError, SinkError};
use crate::sink::RemoteSink;

/// Tokens are refreshed this long before the server says they expire.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build()
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Source of bearer tokens for API calls.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Result<String, ApiError>;
}

/// A bearer token and the moment it should be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub refresh_at: DateTime<Utc>,
}

impl CachedToken {
    /// Token issued at `issued_at`, valid for `expires_in` seconds.
    ///
    /// A lifetime that does not fit a timestamp makes the token stale at once,
    /// so the next call fetches a new one.
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, expires_in: i64) -> Self {
        let refresh_at = TimeDelta::try_seconds(expires_in.saturating_sub(TOKEN_REFRESH_MARGIN_SECS))
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(issued_at);
        Self {
            value: value.into(),
            refresh_at,
        }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.refresh_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// OAuth2 client-credentials grant with an in-memory token cache.
pub struct ClientCredentials {
    agent: ureq::Agent,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    pub fn new(
        api_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent(),
            token_url: endpoint(api_url, "oauth2/access_token"),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            cached: Mutex::new(None),
        }
    }

    fn fetch(&self) -> Result<CachedToken, ApiError> {
        debug!(url = %self.token_url, scope = %self.scope, "requesting access token");
        let issued_at = Utc::now();
        let response = self
            .agent
            .post(&self.token_url)
            .send_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", self.scope.as_str()),
            ])
            .map_err(|e| api_err(&self.token_url, e))?;
        let token: TokenResponse = response.into_json().map_err(|source| ApiError::Decode {
            url: self.token_url.clone(),
            source,
        })?;
        Ok(CachedToken::new(token.access_token, issued_at, token.expires_in))
    }
}

impl CredentialProvider for ClientCredentials {
    fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh_at(Utc::now())) {
            return Ok(token.value.clone());
        }
        let token = self.fetch()?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// A fixed token, for tests and pre-issued credentials.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    name: String,
}

/// Authenticated client for the platform's REST API.
#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    api_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(api_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            agent: agent(),
            api_url: api_url.into(),
            credentials,
        }
    }

    fn bearer(&self) -> Result<String, ApiError> {
        Ok(format!("Bearer {}", self.credentials.access_token()?))
    }

    /// The account the credentials belong to.
    pub fn my_profile(&self) -> Result<SelfIdentity, ApiError> {
        let url = endpoint(&self.api_url, "api/v1/profile");
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer()?)
            .call()
            .map_err(|e| api_err(&url, e))?;
        let profile: ProfileResponse = response
            .into_json()
            .map_err(|source| ApiError::Decode { url: url.clone(), source })?;
        info!(name = %profile.account.name, "resolved operator identity");
        Ok(SelfIdentity::new(profile.account.name))
    }

    /// Post `message` into `topic_id`.
    pub fn post_message(&self, topic_id: TopicId, message: &str) -> Result<(), ApiError> {
        let url = endpoint(&self.api_url, &format!("api/v1/topics/{topic_id}"));
        self.agent
            .post(&url)
            .set("Authorization", &self.bearer()?)
            .send_form(&[("message", message)])
            .map_err(|e| api_err(&url, e))?;
        Ok(())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("api_url", &self.api_url).finish()
    }
}

/// Remote sink backed by [`ApiClient::post_message`].
#[derive(Debug, Clone)]
pub struct ApiRemoteSink {
    client: ApiClient,
}

impl ApiRemoteSink {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl RemoteSink for ApiRemoteSink {
    fn send(&self, topic_id: TopicId, body: &str) -> Result<(), SinkError> {
        Ok(self.client.post_message(topic_id, body)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
