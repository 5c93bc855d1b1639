//! Submit-and-wait client built from a [`CloudConfig`]

use crate::auth::RestAuthApi;
use crate::client::ApiClient;
use crate::tasks::RestTaskApi;
use cloudtask_core::{
    CloudConfig, ResultExtractor, Result, Session, TaskCompleted, TaskPoller, TaskResults,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Cloud API client that turns asynchronous operations into results
///
/// # Example
///
/// ```rust,no_run
/// use cloudtask_core::{CloudConfig, CreatedResourceId, CredentialsConfig, ResourceKind};
/// use cloudtask_http::CloudClient;
/// use serde_json::json;
///
/// # async fn run() -> cloudtask_core::Result<()> {
/// let config = CloudConfig::new(
///     "https://api.example.com/cloud",
///     "https://api.example.com/iam",
///     CredentialsConfig::ApiToken { token: "...".to_string() },
/// );
/// let client = CloudClient::from_config(&config).await?;
///
/// let volume_id: String = client
///     .create_and_wait(
///         "v1/volumes/1/1",
///         &json!({ "name": "data", "size": 10 }),
///         &CreatedResourceId::of(ResourceKind::Volume),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CloudClient {
    api: ApiClient,
    poller: TaskPoller,
}

impl CloudClient {
    /// Authenticate and build a client from explicit configuration
    ///
    /// # Returns
    ///
    /// - `Ok(CloudClient)`: Authenticated client
    /// - `Err(Error::Config)`: Invalid configuration
    /// - `Err(Error::Authentication)`: Login rejected
    pub async fn from_config(config: &CloudConfig) -> Result<Self> {
        config.validate()?;

        let auth = Arc::new(RestAuthApi::new(&config.auth_url, config.http_timeout())?);
        let session = Session::authenticate(
            auth,
            config.credentials.to_credentials(),
            config.allow_reauth,
        )
        .await?;

        let api = ApiClient::new(&config.api_url, Arc::new(session), config.http_timeout())?;
        let poller = TaskPoller::new(Arc::new(RestTaskApi::new(api.clone())), &config.poll);

        tracing::info!(
            "Cloud client ready: {} (credentials: {})",
            config.api_url,
            config.credentials.type_name()
        );
        Ok(Self { api, poller })
    }

    /// Build a client from an existing session
    pub fn with_session(config: &CloudConfig, session: Arc<Session>) -> Result<Self> {
        let api = ApiClient::new(&config.api_url, session, config.http_timeout())?;
        let poller = TaskPoller::new(Arc::new(RestTaskApi::new(api.clone())), &config.poll);
        Ok(Self { api, poller })
    }

    /// The underlying JSON client
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The task poller
    pub fn poller(&self) -> &TaskPoller {
        &self.poller
    }

    /// POST a request that starts tasks, wait for the first, and extract
    /// its result
    pub async fn create_and_wait<B, T, E>(&self, path: &str, body: &B, extract: &E) -> Result<T>
    where
        B: Serialize + ?Sized,
        E: ResultExtractor<T> + ?Sized,
    {
        let submitted: TaskResults = self.api.post_json(path, body).await?;
        tracing::debug!("{} started {} task(s)", path, submitted.tasks.len());
        self.poller
            .wait_submitted(&submitted, false, self.poller.default_timeout(), extract)
            .await
    }

    /// DELETE a resource and wait for every task the deletion started
    pub async fn delete_and_wait(&self, path: &str) -> Result<()> {
        let submitted: TaskResults = self.api.delete_json(path).await?;
        self.poller
            .wait_tasks(
                &submitted.tasks,
                false,
                self.poller.default_timeout(),
                &TaskCompleted,
            )
            .await?;
        Ok(())
    }

    /// Wait for a task started elsewhere
    pub async fn wait_task_and_return_result<T, E>(
        &self,
        task_id: &str,
        timeout: Duration,
        extract: &E,
    ) -> Result<T>
    where
        E: ResultExtractor<T> + ?Sized,
    {
        self.poller
            .wait_task_and_return_result(task_id, true, timeout, extract)
            .await
    }
}
