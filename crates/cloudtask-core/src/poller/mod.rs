//! Task poller
//!
//! The [`TaskPoller`] turns an asynchronous "task accepted" response into a
//! synchronous result, bounded by a deadline.
//!
//! ## Poll Loop
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │
//!   fetch status ──► RUNNING ──► deadline? ──no──► sleep(interval)
//!        │               │           │
//!        │               │          yes ──► TaskTimeout
//!        │               │
//!        │           FINISHED ──► extract(task) ──► value / Extraction
//!        │           ERROR    ──► TaskFailed (server detail)
//!        │
//!        ├── not found ──► TaskFailed
//!        ├── transient ──► retry (bounded) ──► TransientFetch
//!        └── other     ──► propagated
//! ```
//!
//! ## Bounds
//!
//! At most `ceil(timeout / interval) + 1` status fetches happen per task,
//! and none after the deadline. When the endpoint has a separate light
//! status call, one extra full fetch follows the status that reports
//! success; otherwise each poll is a single full fetch. The loop sleeps between fetches and does
//! no background work; the deadline is the only way to abort.

use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::extract::ResultExtractor;
use crate::traits::{TaskApi, TaskInfo, TaskResults, TaskState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Blocks until tasks reach a terminal state
///
/// ## Threading
///
/// Each wait is self-contained; one poller may serve concurrent waits.
/// Batches passed to [`TaskPoller::wait_tasks`] are polled sequentially.
pub struct TaskPoller {
    /// Task endpoint
    api: Arc<dyn TaskApi>,

    /// Delay between status fetches
    interval: Duration,

    /// Consecutive transient failures tolerated before giving up
    max_fetch_retries: usize,

    /// Deadline used by [`TaskPoller::wait_task`] callers without one
    default_timeout: Duration,
}

impl std::fmt::Debug for TaskPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPoller")
            .field("api", &self.api.api_name())
            .field("interval", &self.interval)
            .field("max_fetch_retries", &self.max_fetch_retries)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl TaskPoller {
    /// Create a new poller
    ///
    /// # Parameters
    ///
    /// - `api`: Task endpoint implementation
    /// - `config`: Polling configuration
    pub fn new(api: Arc<dyn TaskApi>, config: &PollConfig) -> Self {
        Self {
            api,
            interval: config.interval().max(Duration::from_millis(1)),
            max_fetch_retries: config.max_fetch_retries,
            default_timeout: config.default_timeout(),
        }
    }

    /// Delay between status fetches
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deadline used when the caller has none
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Upper bound on status fetches for one task: `ceil(timeout / interval) + 1`
    pub fn max_polls(&self, timeout: Duration) -> usize {
        let polls = timeout.as_nanos().div_ceil(self.interval.as_nanos());
        usize::try_from(polls).unwrap_or(usize::MAX - 1) + 1
    }

    /// Wait for a task and extract its result
    ///
    /// # Parameters
    ///
    /// - `task_id`: The task to wait for
    /// - `always_fetch_status`: Fetch full task info on every poll instead
    ///   of the light status check. Ignored when the endpoint has no light
    ///   status call (see [`TaskApi::has_light_status`])
    /// - `timeout`: Deadline for the task to reach a terminal state
    /// - `extract`: Decodes the terminal payload
    ///
    /// # Returns
    ///
    /// - `Ok(T)`: Exactly what `extract` returned for the finished task
    /// - `Err(Error::TaskFailed)`: Server reported an error, or no such task
    /// - `Err(Error::TaskTimeout)`: Still running at the deadline
    /// - `Err(Error::TransientFetch)`: Status fetch kept failing
    /// - `Err(_)`: The error from `extract`, unchanged
    pub async fn wait_task_and_return_result<T, E>(
        &self,
        task_id: &str,
        always_fetch_status: bool,
        timeout: Duration,
        extract: &E,
    ) -> Result<T>
    where
        E: ResultExtractor<T> + ?Sized,
    {
        let task = self.wait_terminal(task_id, always_fetch_status, timeout).await?;
        extract.extract(&task)
    }

    /// Wait for a task and return its terminal info
    pub async fn wait_task(&self, task_id: &str, timeout: Duration) -> Result<TaskInfo> {
        self.wait_terminal(task_id, true, timeout).await
    }

    /// Wait for several tasks, one after another, in submission order
    ///
    /// Each task gets the full `timeout`. The first failure stops the batch.
    pub async fn wait_tasks<T, E>(
        &self,
        task_ids: &[String],
        always_fetch_status: bool,
        timeout: Duration,
        extract: &E,
    ) -> Result<Vec<T>>
    where
        E: ResultExtractor<T> + ?Sized,
    {
        let mut results = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            results.push(
                self.wait_task_and_return_result(task_id, always_fetch_status, timeout, extract)
                    .await?,
            );
        }
        Ok(results)
    }

    /// Wait for the first task of a submission
    pub async fn wait_submitted<T, E>(
        &self,
        submitted: &TaskResults,
        always_fetch_status: bool,
        timeout: Duration,
        extract: &E,
    ) -> Result<T>
    where
        E: ResultExtractor<T> + ?Sized,
    {
        let task_id = submitted.first()?;
        self.wait_task_and_return_result(task_id, always_fetch_status, timeout, extract)
            .await
    }

    async fn wait_terminal(
        &self,
        task_id: &str,
        always_fetch_status: bool,
        timeout: Duration,
    ) -> Result<TaskInfo> {
        let started = Instant::now();
        let max_polls = self.max_polls(timeout);
        let full_fetch = always_fetch_status || !self.api.has_light_status();
        let mut failures = 0;

        debug!(
            "Waiting for task {} (timeout: {:?}, interval: {:?}, api: {})",
            task_id,
            timeout,
            self.interval,
            self.api.api_name()
        );

        for poll in 1..=max_polls {
            match self.poll_once(task_id, full_fetch).await {
                Ok(Some(task)) => {
                    info!("Task {} finished after {} poll(s)", task_id, poll);
                    return Ok(task);
                }
                Ok(None) => {
                    failures = 0;
                    debug!("Task {} still running (poll {}/{})", task_id, poll, max_polls);
                }
                Err(Error::NotFound(message)) => {
                    return Err(Error::task_failed(
                        task_id,
                        format!("task not found: {}", message),
                    ));
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    warn!(
                        "Status fetch {} for task {} failed: {}",
                        failures, task_id, e
                    );
                    if failures > self.max_fetch_retries {
                        return Err(Error::TransientFetch {
                            task_id: task_id.to_string(),
                            attempts: failures,
                            message: e.to_string(),
                        });
                    }
                }
                Err(e) => return Err(e),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout || poll == max_polls {
                break;
            }
            tokio::time::sleep(self.interval.min(timeout - elapsed)).await;
        }

        warn!("Task {} did not finish within {:?}", task_id, timeout);
        Err(Error::task_timeout(task_id, timeout))
    }

    /// One poll cycle: `Ok(Some)` when finished, `Ok(None)` while running
    async fn poll_once(
        &self,
        task_id: &str,
        full_fetch: bool,
    ) -> Result<Option<TaskInfo>> {
        let (state, error) = if full_fetch {
            let task = self.api.get_task(task_id).await?;
            if task.state == TaskState::Success {
                return Ok(Some(task));
            }
            (task.state, task.error)
        } else {
            let status = self.api.get_task_status(task_id).await?;
            (status.state, status.error)
        };

        match state {
            TaskState::Running => Ok(None),
            TaskState::Error => Err(failed(task_id, error)),
            TaskState::Success => {
                // Status reported success; the payload lives in the full info
                let task = self.api.get_task(task_id).await?;
                match task.state {
                    TaskState::Success => Ok(Some(task)),
                    TaskState::Running => Ok(None),
                    TaskState::Error => Err(failed(task_id, task.error)),
                }
            }
        }
    }
}

fn failed(task_id: &str, error: Option<String>) -> Error {
    let message = error
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "task state is ERROR".to_string());
    Error::task_failed(task_id, message)
}
