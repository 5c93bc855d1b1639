// # Task API Trait
//
// Defines the interface for reading asynchronous task state.
//
// ## Implementations
//
// - REST: `cloudtask-http` crate (`GET /v1/tasks/{id}`)
// - Test doubles: scripted task sequences in `tests/common`
//
// ## Wire format
//
// ```json
// {
//   "id": "8a2c...",
//   "state": "FINISHED",
//   "error": null,
//   "created_resources": { "volumes": ["726ecfcc-..."] },
//   "data": { ... }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State of an asynchronous server-side task
///
/// `Success` and `Error` are terminal: once reached, the task never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Accepted or in progress
    #[serde(rename = "RUNNING", alias = "NEW", alias = "running", alias = "new")]
    Running,
    /// Finished successfully; the result payload can be trusted
    #[serde(rename = "FINISHED", alias = "SUCCESS", alias = "finished", alias = "success")]
    Success,
    /// Finished with a server-reported error
    #[serde(rename = "ERROR", alias = "error")]
    Error,
}

impl TaskState {
    /// Whether the task can no longer change state
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Running => "RUNNING",
            TaskState::Success => "FINISHED",
            TaskState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Full task information, including the result payload
///
/// The payload fields stay as raw JSON; their schema depends on the
/// operation that created the task and is decoded by a
/// [`ResultExtractor`](crate::extract::ResultExtractor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task identifier
    pub id: String,
    /// Current state
    pub state: TaskState,
    /// Server-reported error detail (set when `state` is `Error`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Resources created by the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_resources: Option<Value>,
    /// Operation-specific request/result data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Any other fields the API returns (task_type, timestamps, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TaskInfo {
    /// Create a task with no payload
    pub fn new(id: impl Into<String>, state: TaskState) -> Self {
        Self {
            id: id.into(),
            state,
            error: None,
            created_resources: None,
            data: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the `created_resources` payload
    pub fn with_created_resources(mut self, created_resources: Value) -> Self {
        self.created_resources = Some(created_resources);
        self
    }

    /// Set the server error detail
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the `data` payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The status view of this task
    pub fn status(&self) -> TaskStatus {
        TaskStatus {
            id: self.id.clone(),
            state: self.state,
            error: self.error.clone(),
        }
    }
}

/// Light-weight task status (no result payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Task identifier
    pub id: String,
    /// Current state
    pub state: TaskState,
    /// Server-reported error detail
    #[serde(default)]
    pub error: Option<String>,
}

/// Body returned by mutating endpoints: the tasks they started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResults {
    /// Task identifiers, in submission order
    #[serde(default)]
    pub tasks: Vec<String>,
}

impl TaskResults {
    /// The first task of the submission
    ///
    /// # Returns
    ///
    /// - `Ok(&str)`: The first task ID
    /// - `Err(Error::Validation)`: If the API returned no task
    pub fn first(&self) -> Result<&str, crate::Error> {
        self.tasks
            .first()
            .map(String::as_str)
            .ok_or_else(|| crate::Error::validation("Response contained no task IDs"))
    }
}

/// Trait for task endpoint implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - A task ID the server does not know → `Err(Error::NotFound)`
/// - Network failures, 5xx and 429 → errors for which
///   [`Error::is_transient`](crate::Error::is_transient) is true
/// - Implementations do not retry; the [`TaskPoller`](crate::TaskPoller) does
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Fetch full task information, including the result payload
    async fn get_task(&self, task_id: &str) -> Result<TaskInfo, crate::Error>;

    /// Fetch the task status only
    ///
    /// The default derives the status from [`TaskApi::get_task`].
    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatus, crate::Error> {
        self.get_task(task_id).await.map(|task| task.status())
    }

    /// Whether [`TaskApi::get_task_status`] is cheaper than a full fetch
    ///
    /// Return `true` only when overriding `get_task_status` with a separate
    /// endpoint. Otherwise the poller fetches full info on every poll.
    fn has_light_status(&self) -> bool {
        false
    }

    /// Get the API name (for logging/debugging)
    fn api_name(&self) -> &'static str;
}
