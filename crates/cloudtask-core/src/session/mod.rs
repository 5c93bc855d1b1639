//! Token/session manager
//!
//! The [`Session`] holds the token pair attached to every outgoing request
//! and re-authenticates transparently when the API rejects it.
//!
//! ## Re-authentication
//!
//! ```text
//!  request ── 401 ──► reauthenticate()
//!                        │
//!                        ▼
//!              throwaway clone (allow_reauth = false)
//!                        │
//!              refresh(refresh_token) ──ok──┐
//!                        │ err              │
//!                        ▼                  │
//!              login(username, password) ───┤
//!                        │ err              ▼
//!                        ▼         copy tokens into session
//!                 Authentication      retry request once
//! ```
//!
//! A second 401 after a successful re-authentication is fatal; the chain
//! never recurses. Concurrent callers may each re-authenticate; that is
//! tolerated rather than deduplicated.

use crate::error::{Error, Result};
use crate::traits::{AuthApi, TokenPair};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Access tokens expiring within this window are treated as expired
const EXPIRY_SKEW_SECS: i64 = 30;

/// Credentials used to open a session
#[derive(Clone)]
pub enum Credentials {
    /// Username and password; supports full re-login
    Password {
        /// Account username
        username: String,
        /// Account password
        password: String,
    },
    /// Permanent API key; never re-authenticated
    ApiToken(String),
    /// Token pair obtained out-of-band; re-authenticated by refresh only
    Tokens(TokenPair),
}

// Custom Debug implementation that hides secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
            Credentials::ApiToken(_) => f.debug_tuple("ApiToken").field(&"<REDACTED>").finish(),
            Credentials::Tokens(tokens) => f.debug_tuple("Tokens").field(tokens).finish(),
        }
    }
}

/// The installed re-authentication callback
///
/// Refresh is always attempted first; `login` is the fallback when the
/// session was opened with a password.
#[derive(Clone)]
struct Reauthenticator {
    login: Option<(String, String)>,
}

impl Reauthenticator {
    /// Run one refresh attempt and at most one login attempt against `scratch`
    async fn run(&self, scratch: &Session) -> Result<()> {
        let refresh_token = scratch
            .tokens()
            .await
            .and_then(|tokens| tokens.refresh().map(str::to_string));

        let refreshed = match refresh_token {
            Some(refresh_token) => scratch.auth.refresh(&refresh_token).await,
            None => Err(Error::refresh("No refresh token available")),
        };

        let refresh_err = match refreshed {
            Ok(tokens) => {
                debug!("Token refresh succeeded");
                return scratch.store(tokens).await;
            }
            Err(e) => e,
        };

        let Some((username, password)) = &self.login else {
            return Err(match refresh_err {
                Error::Refresh(_) => refresh_err,
                other => Error::refresh(other.to_string()),
            });
        };

        warn!("Token refresh failed, falling back to full login: {}", refresh_err);

        let tokens = scratch.auth.login(username, password).await.map_err(|e| {
            Error::auth(format!(
                "Re-login after refresh failure ({}) failed: {}",
                refresh_err, e
            ))
        })?;

        scratch.store(tokens).await
    }
}

/// Bearer credentials shared by all requests of one provider configuration
///
/// ## Lifecycle
///
/// 1. Create with [`Session::authenticate()`] (or [`Session::new()`] +
///    [`Session::set_tokens()`])
/// 2. Share as `Arc<Session>` between clients
/// 3. Tokens are swapped in place on every successful re-authentication
///
/// ## Threading
///
/// The token pair lives behind an async `RwLock` and is replaced as a
/// whole, so readers never observe a half-updated pair.
pub struct Session {
    /// Authentication endpoints
    auth: Arc<dyn AuthApi>,

    /// Current token pair
    tokens: RwLock<Option<TokenPair>>,

    /// Installed re-authentication callback
    reauth: RwLock<Option<Reauthenticator>>,

    /// Whether a 401 may trigger re-authentication
    allow_reauth: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("allow_reauth", &self.allow_reauth)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an unauthenticated session
    ///
    /// Re-authentication stays disabled until [`Session::authenticate`]
    /// installs a callback.
    pub fn new(auth: Arc<dyn AuthApi>) -> Self {
        Self::with_reauth(auth, false)
    }

    fn with_reauth(auth: Arc<dyn AuthApi>, allow_reauth: bool) -> Self {
        Self {
            auth,
            tokens: RwLock::new(None),
            reauth: RwLock::new(None),
            allow_reauth,
        }
    }

    /// Open a session with the given credentials
    ///
    /// # Parameters
    ///
    /// - `auth`: Authentication endpoints
    /// - `credentials`: How to authenticate
    /// - `allow_reauth`: Whether 401 responses may trigger re-authentication
    ///
    /// # Returns
    ///
    /// - `Ok(Session)`: Authenticated session
    /// - `Err(Error::Authentication)`: Login rejected
    /// - `Err(Error::Validation)`: Malformed token pair
    pub async fn authenticate(
        auth: Arc<dyn AuthApi>,
        credentials: Credentials,
        allow_reauth: bool,
    ) -> Result<Self> {
        let session = Self::with_reauth(auth, allow_reauth);

        match credentials {
            Credentials::Password { username, password } => {
                debug!("Logging in as {}", username);
                let tokens = session.auth.login(&username, &password).await?;
                session.store(tokens).await?;
                if allow_reauth {
                    session
                        .install(Reauthenticator {
                            login: Some((username, password)),
                        })
                        .await;
                }
            }
            Credentials::ApiToken(token) => {
                session.set_tokens(TokenPair::api_key(token)).await?;
            }
            Credentials::Tokens(tokens) => {
                let refreshable = tokens.refresh().is_some();
                session.set_tokens(tokens).await?;
                if allow_reauth && refreshable {
                    session.install(Reauthenticator { login: None }).await;
                }
            }
        }

        info!("Session authenticated (reauth: {})", session.can_reauthenticate().await);
        Ok(session)
    }

    /// Install tokens obtained out-of-band, without a login
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Tokens installed
    /// - `Err(Error::Validation)`: Empty access or refresh token
    pub async fn set_tokens(&self, tokens: TokenPair) -> Result<()> {
        self.store(tokens).await
    }

    /// Snapshot of the current token pair
    pub async fn tokens(&self) -> Option<TokenPair> {
        self.tokens.read().await.clone()
    }

    /// Current `Authorization` header value
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: Header value
    /// - `Err(Error::Authentication)`: Session holds no token
    pub async fn authorization(&self) -> Result<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(TokenPair::authorization)
            .ok_or_else(|| Error::auth("Session is not authenticated"))
    }

    /// Whether 401 responses may trigger re-authentication at all
    pub fn allow_reauth(&self) -> bool {
        self.allow_reauth
    }

    /// Whether re-authentication is allowed and a callback is installed
    pub async fn can_reauthenticate(&self) -> bool {
        self.allow_reauth && self.reauth.read().await.is_some()
    }

    /// Re-authenticate using the installed callback
    ///
    /// Works on a throwaway clone with re-authentication disabled; the
    /// caller-visible tokens are replaced only when the attempt succeeds.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Tokens refreshed
    /// - `Err(Error::Authentication)`: Disabled, or refresh and login failed
    /// - `Err(Error::Refresh)`: Refresh failed and no login fallback exists
    pub async fn reauthenticate(&self) -> Result<()> {
        if !self.allow_reauth {
            return Err(Error::auth("Re-authentication is disabled for this session"));
        }

        let reauth = self
            .reauth
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::auth("No re-authentication method installed"))?;

        let scratch = self.throwaway_clone().await;
        reauth.run(&scratch).await?;

        let tokens = scratch
            .tokens()
            .await
            .ok_or_else(|| Error::auth("Re-authentication produced no tokens"))?;
        *self.tokens.write().await = Some(tokens);

        info!("Session re-authenticated");
        Ok(())
    }

    /// Run a request with the current authorization, re-authenticating once
    ///
    /// `op` receives the `Authorization` header value. If the token is known
    /// to be expired it is renewed first, and that renewal is the call's one
    /// re-authentication. Otherwise, if `op` fails with `Error::Unauthorized`,
    /// the session re-authenticates and `op` runs one more time. A 401 after
    /// any re-authentication is returned as `Error::Authentication`.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let renewed = self.is_expired().await && self.can_reauthenticate().await;
        if renewed {
            debug!("Access token expired, re-authenticating before request");
            self.reauthenticate().await?;
        }

        match op(self.authorization().await?).await {
            Err(e) if e.is_unauthorized() => {
                if renewed {
                    return Err(Error::auth(format!(
                        "Still unauthorized after re-authentication: {}",
                        e
                    )));
                }
                if !self.can_reauthenticate().await {
                    return Err(Error::auth(e.to_string()));
                }

                warn!("Request unauthorized, re-authenticating: {}", e);
                self.reauthenticate().await?;

                op(self.authorization().await?).await.map_err(|e| {
                    if e.is_unauthorized() {
                        Error::auth(format!("Still unauthorized after re-authentication: {}", e))
                    } else {
                        e
                    }
                })
            }
            other => other,
        }
    }

    async fn is_expired(&self) -> bool {
        self.tokens
            .read()
            .await
            .as_ref()
            .is_some_and(|tokens| tokens.is_expired(chrono::Duration::seconds(EXPIRY_SKEW_SECS)))
    }

    async fn store(&self, tokens: TokenPair) -> Result<()> {
        tokens.validate()?;
        *self.tokens.write().await = Some(tokens);
        Ok(())
    }

    async fn install(&self, reauth: Reauthenticator) {
        *self.reauth.write().await = Some(reauth);
    }

    async fn throwaway_clone(&self) -> Session {
        Session {
            auth: Arc::clone(&self.auth),
            tokens: RwLock::new(self.tokens().await),
            reauth: RwLock::new(None),
            allow_reauth: false,
        }
    }
}
