//! Task lookups
//!
//! ```http
//! GET {api_url}/v1/tasks/{task_id}
//! ```

use crate::client::ApiClient;
use async_trait::async_trait;
use cloudtask_core::{Error, Result, TaskApi, TaskInfo};

/// REST implementation of [`TaskApi`]
///
/// Single-shot: no retries here. Transient failures are surfaced to the
/// task poller, which owns the retry budget.
#[derive(Debug, Clone)]
pub struct RestTaskApi {
    client: ApiClient,
}

impl RestTaskApi {
    /// Create a task API over an authorized client
    ///
    /// The status check is the full `GET`, so the poller fetches full task
    /// info on every poll.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskApi for RestTaskApi {
    async fn get_task(&self, task_id: &str) -> Result<TaskInfo> {
        if task_id.trim().is_empty() || task_id.contains('/') {
            return Err(Error::validation(format!("Invalid task ID: {:?}", task_id)));
        }

        let task: TaskInfo = self
            .client
            .get_json(&format!("v1/tasks/{}", task_id))
            .await?;

        if task.id != task_id {
            tracing::warn!("Asked for task {} but the API returned {}", task_id, task.id);
        }
        Ok(task)
    }

    fn api_name(&self) -> &'static str {
        "rest"
    }
}
