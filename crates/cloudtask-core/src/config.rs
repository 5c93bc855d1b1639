//! Configuration types for the task bridge
//!
//! This module defines all configuration structures used throughout the
//! crate. A [`CloudConfig`] is constructed explicitly and handed to each
//! client; there is no process-wide configuration.

use crate::session::Credentials;
use crate::traits::TokenPair;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the cloud REST API (e.g. "https://api.example.com/cloud")
    pub api_url: String,

    /// Base URL of the authentication API
    pub auth_url: String,

    /// How to authenticate
    pub credentials: CredentialsConfig,

    /// Whether a 401 may trigger transparent re-authentication
    #[serde(default = "default_allow_reauth")]
    pub allow_reauth: bool,

    /// Timeout for a single HTTP request (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Task polling settings
    #[serde(default)]
    pub poll: PollConfig,
}

impl CloudConfig {
    /// Create a configuration with default polling and HTTP settings
    pub fn new(
        api_url: impl Into<String>,
        auth_url: impl Into<String>,
        credentials: CredentialsConfig,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            auth_url: auth_url.into(),
            credentials,
            allow_reauth: default_allow_reauth(),
            http_timeout_secs: default_http_timeout_secs(),
            poll: PollConfig::default(),
        }
    }

    /// Load a JSON configuration file
    ///
    /// The loaded configuration is validated before it is returned.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: CloudConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_url("api_url", &self.api_url)?;
        validate_url("auth_url", &self.auth_url)?;

        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("http_timeout_secs must be > 0"));
        }

        self.credentials.validate()?;
        self.poll.validate()?;

        Ok(())
    }

    /// HTTP request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", field)));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            field, url
        )));
    }
    Ok(())
}

/// Credential configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// Username and password login
    Password {
        /// Account username
        username: String,
        /// Account password
        password: String,
    },

    /// Permanent API token
    ApiToken {
        /// The token
        token: String,
    },

    /// Pre-existing token pair
    Tokens {
        /// Access token
        access: String,
        /// Refresh token (optional)
        #[serde(default)]
        refresh: Option<String>,
    },
}

// Custom Debug implementation that hides secrets
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsConfig::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
            CredentialsConfig::ApiToken { .. } => f
                .debug_struct("ApiToken")
                .field("token", &"<REDACTED>")
                .finish(),
            CredentialsConfig::Tokens { refresh, .. } => f
                .debug_struct("Tokens")
                .field("access", &"<REDACTED>")
                .field("refresh", &refresh.as_ref().map(|_| "<REDACTED>"))
                .finish(),
        }
    }
}

impl CredentialsConfig {
    /// Validate the credential configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            CredentialsConfig::Password { username, password } => {
                if username.is_empty() {
                    return Err(crate::Error::config("Username cannot be empty"));
                }
                if password.is_empty() {
                    return Err(crate::Error::config("Password cannot be empty"));
                }
                Ok(())
            }
            CredentialsConfig::ApiToken { token } => {
                if token.is_empty() {
                    return Err(crate::Error::config("API token cannot be empty"));
                }
                Ok(())
            }
            CredentialsConfig::Tokens { access, refresh } => {
                if access.is_empty() {
                    return Err(crate::Error::config("Access token cannot be empty"));
                }
                if refresh.as_ref().is_some_and(|r| r.is_empty()) {
                    return Err(crate::Error::config(
                        "Refresh token cannot be empty when provided",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the credential mode name
    pub fn type_name(&self) -> &'static str {
        match self {
            CredentialsConfig::Password { .. } => "password",
            CredentialsConfig::ApiToken { .. } => "api_token",
            CredentialsConfig::Tokens { .. } => "tokens",
        }
    }

    /// Convert into session credentials
    pub fn to_credentials(&self) -> Credentials {
        match self {
            CredentialsConfig::Password { username, password } => Credentials::Password {
                username: username.clone(),
                password: password.clone(),
            },
            CredentialsConfig::ApiToken { token } => Credentials::ApiToken(token.clone()),
            CredentialsConfig::Tokens { access, refresh } => {
                Credentials::Tokens(TokenPair::new(access.clone(), refresh.clone()))
            }
        }
    }
}

/// Task polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between task status fetches (in milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive transient fetch failures tolerated before giving up
    #[serde(default = "default_max_fetch_retries")]
    pub max_fetch_retries: usize,

    /// Deadline used when the caller does not pass one (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl PollConfig {
    /// Validate the polling configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_ms == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.default_timeout_secs == 0 {
            return Err(crate::Error::config("Default task timeout must be > 0"));
        }
        Ok(())
    }

    /// Delay between task status fetches
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Deadline used when the caller does not pass one
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_fetch_retries: default_max_fetch_retries(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_allow_reauth() -> bool {
    true
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_fetch_retries() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    1200
}
