// # cloudtask-wait
//
// Thin command-line wrapper: authenticates, waits for the given tasks one
// after another, and prints each terminal task as a JSON line on stdout.
// All polling and re-authentication logic lives in cloudtask-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### API
// - `CLOUD_API_URL`: Cloud API base URL
// - `CLOUD_AUTH_URL`: Auth API base URL (defaults to `CLOUD_API_URL`)
// - `CLOUD_HTTP_TIMEOUT_SECS`: Per-request timeout (default 30)
//
// ### Credentials (first match wins)
// - `CLOUD_API_TOKEN`: Permanent API key
// - `CLOUD_USERNAME` + `CLOUD_PASSWORD`: Login
// - `CLOUD_ACCESS_TOKEN` (+ optional `CLOUD_REFRESH_TOKEN`): Token pair
// - `CLOUD_ALLOW_REAUTH`: `true`/`false` (default true)
//
// ### Tasks
// - `CLOUD_TASK_IDS`: Comma-separated task IDs, waited for in order
// - `CLOUD_TASK_TIMEOUT_SECS`: Deadline per task (default 1200)
// - `CLOUD_POLL_INTERVAL_MS`: Delay between status fetches (default 1000)
// - `CLOUD_RESOURCE_KIND`: Print created IDs of this kind instead of the
//   full task (e.g. `volumes`, `instances`)
//
// ### Logging
// - `CLOUD_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export CLOUD_API_URL=https://api.example.com/cloud
// export CLOUD_AUTH_URL=https://api.example.com/iam
// export CLOUD_API_TOKEN=your_token
// export CLOUD_TASK_IDS=8a2c...,91fe...
// export CLOUD_RESOURCE_KIND=volumes
//
// cloudtask-wait
// ```

use anyhow::Result;
use cloudtask_core::{
    CloudConfig, CreatedResourceIds, CredentialsConfig, PollConfig, ResourceKind,
};
use cloudtask_http::CloudClient;
use std::env;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Every task finished successfully
/// - 1: Configuration or startup error
/// - 2: Runtime error (authentication, task failure, timeout)
#[derive(Debug, Clone, Copy)]
enum WaitExitCode {
    /// All tasks finished
    Finished = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<WaitExitCode> for ExitCode {
    fn from(code: WaitExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    cloud: CloudConfig,
    task_ids: Vec<String>,
    task_timeout: Duration,
    resource_kind: Option<ResourceKind>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = var("CLOUD_API_URL")
            .ok_or_else(|| anyhow::anyhow!("CLOUD_API_URL is required"))?;
        let auth_url = var("CLOUD_AUTH_URL").unwrap_or_else(|| api_url.clone());

        let credentials = if let Some(token) = var("CLOUD_API_TOKEN") {
            CredentialsConfig::ApiToken { token }
        } else if let Some(username) = var("CLOUD_USERNAME") {
            let password = var("CLOUD_PASSWORD").ok_or_else(|| {
                anyhow::anyhow!("CLOUD_PASSWORD is required when CLOUD_USERNAME is set")
            })?;
            CredentialsConfig::Password { username, password }
        } else if let Some(access) = var("CLOUD_ACCESS_TOKEN") {
            CredentialsConfig::Tokens {
                access,
                refresh: var("CLOUD_REFRESH_TOKEN"),
            }
        } else {
            anyhow::bail!(
                "No credentials. Set CLOUD_API_TOKEN, CLOUD_USERNAME/CLOUD_PASSWORD \
                or CLOUD_ACCESS_TOKEN"
            );
        };

        let mut cloud = CloudConfig::new(api_url, auth_url, credentials);
        if let Some(allow) = var("CLOUD_ALLOW_REAUTH") {
            cloud.allow_reauth = parse_bool("CLOUD_ALLOW_REAUTH", &allow)?;
        }
        if let Some(secs) = var("CLOUD_HTTP_TIMEOUT_SECS") {
            cloud.http_timeout_secs = parse_number("CLOUD_HTTP_TIMEOUT_SECS", &secs)?;
        }

        let mut poll = PollConfig::default();
        if let Some(interval) = var("CLOUD_POLL_INTERVAL_MS") {
            poll.interval_ms = parse_number("CLOUD_POLL_INTERVAL_MS", &interval)?;
        }
        if let Some(secs) = var("CLOUD_TASK_TIMEOUT_SECS") {
            poll.default_timeout_secs = parse_number("CLOUD_TASK_TIMEOUT_SECS", &secs)?;
        }
        let task_timeout = poll.default_timeout();
        cloud.poll = poll;

        let resource_kind = var("CLOUD_RESOURCE_KIND")
            .map(|kind| kind.parse::<ResourceKind>())
            .transpose()?;

        Ok(Self {
            cloud,
            task_ids: var("CLOUD_TASK_IDS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            task_timeout,
            resource_kind,
            log_level: var("CLOUD_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.cloud.validate()?;

        if self.task_ids.is_empty() {
            anyhow::bail!(
                "CLOUD_TASK_IDS must contain at least one task ID. \
                Set it via: export CLOUD_TASK_IDS=<id>,<id>"
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CLOUD_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, value),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a number. Got: {}", key, value))
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WaitExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return WaitExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries the results
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WaitExitCode::ConfigError.into();
    }

    info!("Waiting for {} task(s)", config.task_ids.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WaitExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run(config).await {
            error!("{}", e);
            WaitExitCode::RuntimeError
        } else {
            WaitExitCode::Finished
        }
    });

    result.into()
}

/// Wait for every task, in order, printing one JSON line per task
async fn run(config: Config) -> Result<()> {
    let client = CloudClient::from_config(&config.cloud).await?;

    for task_id in &config.task_ids {
        let line = match config.resource_kind {
            Some(kind) => {
                let ids = client
                    .wait_task_and_return_result(
                        task_id,
                        config.task_timeout,
                        &CreatedResourceIds::of(kind),
                    )
                    .await?;
                serde_json::json!({ "task": task_id, (kind.key()): ids })
            }
            None => {
                let task = client
                    .poller()
                    .wait_task(task_id, config.task_timeout)
                    .await?;
                serde_json::to_value(&task)?
            }
        };
        println!("{}", line);
    }

    info!("All {} task(s) finished", config.task_ids.len());
    Ok(())
}
