// # Auth API Trait
//
// Defines the interface for the authentication endpoints.
//
// ## Implementations
//
// - REST: `cloudtask-http` crate
//   - Login: POST `/auth/jwt/login` `{ "username", "password" }`
//   - Refresh: POST `/auth/jwt/refresh` `{ "refresh" }`
//
// ## Security
//
// Token values NEVER appear in logs or `Debug` output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authorization scheme for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScheme {
    /// Short-lived JWT access token
    #[default]
    Bearer,
    /// Permanent API key
    ApiKey,
}

impl TokenScheme {
    /// Prefix used in the `Authorization` header
    pub fn header_prefix(self) -> &'static str {
        match self {
            TokenScheme::Bearer => "Bearer",
            TokenScheme::ApiKey => "APIKey",
        }
    }
}

/// An access token with its optional refresh token
///
/// The pair is always replaced as a whole; readers never see an access
/// token from one login paired with the refresh token of another.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Access token attached to every request
    /// ⚠️ NEVER log this value
    access: String,

    /// Refresh token (absent for API keys)
    /// ⚠️ NEVER log this value
    refresh: Option<String>,

    /// Authorization scheme
    scheme: TokenScheme,

    /// Access token expiry, when known
    expires_at: Option<DateTime<Utc>>,
}

// Custom Debug implementation that hides the token values
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<REDACTED>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<REDACTED>"))
            .field("scheme", &self.scheme)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenPair {
    /// Create a bearer token pair
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
            scheme: TokenScheme::Bearer,
            expires_at: None,
        }
    }

    /// Create a permanent API key "pair" (no refresh token)
    pub fn api_key(token: impl Into<String>) -> Self {
        Self {
            access: token.into(),
            refresh: None,
            scheme: TokenScheme::ApiKey,
            expires_at: None,
        }
    }

    /// Set the access token expiry
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// The access token
    pub fn access(&self) -> &str {
        &self.access
    }

    /// The refresh token, if any
    pub fn refresh(&self) -> Option<&str> {
        self.refresh.as_deref()
    }

    /// The authorization scheme
    pub fn scheme(&self) -> TokenScheme {
        self.scheme
    }

    /// The access token expiry, if known
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("{} {}", self.scheme.header_prefix(), self.access)
    }

    /// Whether the access token expires within `skew` from now
    ///
    /// Tokens without a known expiry never count as expired; the server's
    /// 401 is the signal for those.
    pub fn is_expired(&self, skew: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + skew >= expires_at,
            None => false,
        }
    }

    /// Validate the pair before installing it
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The pair is usable
    /// - `Err(Error::Validation)`: Empty access token or empty refresh token
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.access.trim().is_empty() {
            return Err(crate::Error::validation("Access token cannot be empty"));
        }
        if let Some(refresh) = &self.refresh
            && refresh.trim().is_empty()
        {
            return Err(crate::Error::validation(
                "Refresh token cannot be empty when provided",
            ));
        }
        Ok(())
    }
}

/// Trait for authentication endpoint implementations
///
/// # Contract
///
/// - Rejected credentials → `Err(Error::Authentication)`
/// - Rejected or expired refresh token → `Err(Error::Refresh)`
/// - Implementations never retry and never touch a [`Session`](crate::Session)
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Perform a full login with username and password
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair, crate::Error>;

    /// Exchange a refresh token for a new token pair
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, crate::Error>;
}
