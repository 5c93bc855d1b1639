//! JWT login and refresh endpoints
//!
//! ```http
//! POST {auth_url}/auth/jwt/login    { "username": .., "password": .. }
//! POST {auth_url}/auth/jwt/refresh  { "refresh": .. }
//!
//! 200 { "access": "<jwt>", "refresh": "<jwt>" }
//! ```

use crate::client::{build_http_client, execute};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use cloudtask_core::{AuthApi, Error, Result, TokenPair};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Token response body
#[derive(Deserialize)]
struct JwtTokens {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// REST implementation of [`AuthApi`]
///
/// Requests here are never authorized by a session; they are how a
/// session gets its tokens.
pub struct RestAuthApi {
    /// Auth base URL without trailing slash
    auth_url: String,

    /// HTTP client (with timeout)
    client: reqwest::Client,
}

impl std::fmt::Debug for RestAuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestAuthApi")
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

impl RestAuthApi {
    /// Create an auth client
    pub fn new(auth_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            client: build_http_client(timeout)?,
        })
    }

    async fn post_tokens(&self, path: &str, body: Value) -> Result<JwtTokens> {
        let url = format!("{}/{}", self.auth_url, path);
        tracing::debug!("POST {}", url);
        execute(self.client.post(&url).json(&body)).await
    }
}

#[async_trait]
impl AuthApi for RestAuthApi {
    async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let tokens = self
            .post_tokens(
                "auth/jwt/login",
                json!({ "username": username, "password": password }),
            )
            .await
            .map_err(|e| match e {
                Error::Unauthorized(msg) | Error::Authentication(msg) => Error::auth(msg),
                Error::Http { status: 400, message } => Error::auth(message),
                other => other,
            })?;

        tracing::info!("Logged in as {}", username);
        Ok(token_pair(tokens.access, tokens.refresh))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let tokens = self
            .post_tokens("auth/jwt/refresh", json!({ "refresh": refresh_token }))
            .await
            .map_err(|e| match e {
                Error::Unauthorized(msg) | Error::Authentication(msg) => Error::refresh(msg),
                Error::Http { status: 400, message } => Error::refresh(message),
                other => other,
            })?;

        // Some deployments return only a new access token
        let refresh = tokens.refresh.or_else(|| Some(refresh_token.to_string()));
        Ok(token_pair(tokens.access, refresh))
    }
}

fn token_pair(access: String, refresh: Option<String>) -> TokenPair {
    let expires_at = jwt_expiry(&access);
    let pair = TokenPair::new(access, refresh);
    match expires_at {
        Some(expires_at) => pair.with_expires_at(expires_at),
        None => pair,
    }
}

/// Read the `exp` claim of a JWT without verifying it
///
/// The server is the authority on validity; the claim only lets the
/// session renew a token before sending a request that would get a 401.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload_b64 = token.split('.').nth(1)?;
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&payload_bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}
