//! Test doubles and common utilities for contract tests
//!
//! These doubles replay scripted server behavior without any HTTP.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudtask_core::error::{Error, Result};
use cloudtask_core::traits::{AuthApi, TaskApi, TaskInfo, TaskState, TaskStatus, TokenPair};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One scripted response of the task endpoint
#[derive(Debug, Clone)]
pub enum Step {
    /// Task is still running
    Running,
    /// Task finished with the given `created_resources`
    Finished(Value),
    /// Task finished with a server error
    Failed(String),
    /// Endpoint answers 404
    NotFound,
    /// Endpoint answers 503
    Unavailable,
    /// Endpoint answers 400
    BadRequest,
}

impl Step {
    fn respond(&self, task_id: &str) -> Result<TaskInfo> {
        match self {
            Step::Running => Ok(TaskInfo::new(task_id, TaskState::Running)),
            Step::Finished(created) => {
                Ok(TaskInfo::new(task_id, TaskState::Success).with_created_resources(created.clone()))
            }
            Step::Failed(message) => {
                Ok(TaskInfo::new(task_id, TaskState::Error).with_error(message.clone()))
            }
            Step::NotFound => Err(Error::not_found(format!("task {}", task_id))),
            Step::Unavailable => Err(Error::http(503, "Service Unavailable")),
            Step::BadRequest => Err(Error::http(400, "Bad Request")),
        }
    }
}

/// A task endpoint that replays a script per task ID
///
/// Each fetch consumes the next step; the last step repeats forever.
pub struct ScriptedTaskApi {
    scripts: std::sync::Mutex<HashMap<String, VecDeque<Step>>>,
    /// Task IDs in the order they were fetched
    fetched: Arc<std::sync::Mutex<Vec<String>>>,
    get_task_count: Arc<AtomicUsize>,
    get_task_status_count: Arc<AtomicUsize>,
}

impl ScriptedTaskApi {
    pub fn new() -> Self {
        Self {
            scripts: std::sync::Mutex::new(HashMap::new()),
            fetched: Arc::new(std::sync::Mutex::new(Vec::new())),
            get_task_count: Arc::new(AtomicUsize::new(0)),
            get_task_status_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add the script for one task
    pub fn script(self, task_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), steps.into());
        self
    }

    /// Total fetches of either kind
    pub fn fetch_count(&self) -> usize {
        self.get_task_count() + self.get_task_status_count()
    }

    pub fn get_task_count(&self) -> usize {
        self.get_task_count.load(Ordering::SeqCst)
    }

    pub fn get_task_status_count(&self) -> usize {
        self.get_task_status_count.load(Ordering::SeqCst)
    }

    /// Distinct task IDs in first-fetch order
    pub fn fetch_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for id in self.fetched.lock().unwrap().iter() {
            if order.last() != Some(id) {
                order.push(id.clone());
            }
        }
        order
    }

    fn next(&self, task_id: &str) -> Result<TaskInfo> {
        self.fetched.lock().unwrap().push(task_id.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        let Some(steps) = scripts.get_mut(task_id) else {
            return Step::NotFound.respond(task_id);
        };
        let step = if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        };
        step.unwrap_or(Step::NotFound).respond(task_id)
    }
}

#[async_trait]
impl TaskApi for ScriptedTaskApi {
    async fn get_task(&self, task_id: &str) -> Result<TaskInfo> {
        self.get_task_count.fetch_add(1, Ordering::SeqCst);
        self.next(task_id)
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatus> {
        self.get_task_status_count.fetch_add(1, Ordering::SeqCst);
        self.next(task_id).map(|task| task.status())
    }

    fn has_light_status(&self) -> bool {
        true
    }

    fn api_name(&self) -> &'static str {
        "scripted"
    }
}

/// A task endpoint that only implements the full fetch
///
/// Its status check is the default, which hits the same endpoint.
pub struct FullFetchOnlyApi {
    inner: ScriptedTaskApi,
}

impl FullFetchOnlyApi {
    pub fn new(inner: ScriptedTaskApi) -> Self {
        Self { inner }
    }

    /// Calls that reached the task endpoint
    pub fn endpoint_calls(&self) -> usize {
        self.inner.get_task_count()
    }
}

#[async_trait]
impl TaskApi for FullFetchOnlyApi {
    async fn get_task(&self, task_id: &str) -> Result<TaskInfo> {
        self.inner.get_task(task_id).await
    }

    fn api_name(&self) -> &'static str {
        "full-fetch-only"
    }
}

/// Scripted behavior of an auth endpoint call
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Issue this token pair
    Issue(String, Option<String>),
    /// Answer 401
    Reject,
}

/// An auth endpoint replaying scripted login and refresh outcomes
///
/// Each call consumes the next outcome; the last outcome repeats forever.
pub struct MockAuthApi {
    logins: Arc<std::sync::Mutex<VecDeque<AuthOutcome>>>,
    refreshes: Arc<std::sync::Mutex<VecDeque<AuthOutcome>>>,
    login_count: Arc<AtomicUsize>,
    refresh_count: Arc<AtomicUsize>,
    /// Refresh tokens presented, in order
    presented: Arc<std::sync::Mutex<Vec<String>>>,
}

impl MockAuthApi {
    pub fn new(logins: Vec<AuthOutcome>, refreshes: Vec<AuthOutcome>) -> Self {
        Self {
            logins: Arc::new(std::sync::Mutex::new(logins.into())),
            refreshes: Arc::new(std::sync::Mutex::new(refreshes.into())),
            login_count: Arc::new(AtomicUsize::new(0)),
            refresh_count: Arc::new(AtomicUsize::new(0)),
            presented: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Create a second handle that shares this mock's scripts and counters
    pub fn sharing_counters_with(other: &MockAuthApi) -> Self {
        Self {
            logins: Arc::clone(&other.logins),
            refreshes: Arc::clone(&other.refreshes),
            login_count: Arc::clone(&other.login_count),
            refresh_count: Arc::clone(&other.refresh_count),
            presented: Arc::clone(&other.presented),
        }
    }

    pub fn login_count(&self) -> usize {
        self.login_count.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    pub fn presented_refresh_tokens(&self) -> Vec<String> {
        self.presented.lock().unwrap().clone()
    }
}

fn next_outcome(script: &std::sync::Mutex<VecDeque<AuthOutcome>>) -> AuthOutcome {
    let mut script = script.lock().unwrap();
    let outcome = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    outcome.unwrap_or(AuthOutcome::Reject)
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, _username: &str, _password: &str) -> Result<TokenPair> {
        self.login_count.fetch_add(1, Ordering::SeqCst);
        match next_outcome(&self.logins) {
            AuthOutcome::Issue(access, refresh) => Ok(TokenPair::new(access, refresh)),
            AuthOutcome::Reject => Err(Error::auth("invalid username or password")),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        self.presented.lock().unwrap().push(refresh_token.to_string());
        match next_outcome(&self.refreshes) {
            AuthOutcome::Issue(access, refresh) => Ok(TokenPair::new(access, refresh)),
            AuthOutcome::Reject => Err(Error::refresh("401 Unauthorized: refresh token expired")),
        }
    }
}

/// Shorthand for an issued token pair
pub fn issue(access: &str, refresh: &str) -> AuthOutcome {
    AuthOutcome::Issue(access.to_string(), Some(refresh.to_string()))
}

/// A protected endpoint that accepts exactly one bearer token
pub struct ProtectedEndpoint {
    accepted: String,
    /// Authorization headers seen, in order
    seen: std::sync::Mutex<Vec<String>>,
}

impl ProtectedEndpoint {
    pub fn accepting(access_token: &str) -> Self {
        Self {
            accepted: format!("Bearer {}", access_token),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn call(&self, authorization: String) -> Result<&'static str> {
        let ok = authorization == self.accepted;
        self.seen.lock().unwrap().push(authorization);
        if ok {
            Ok("payload")
        } else {
            Err(Error::unauthorized("token is expired"))
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}
