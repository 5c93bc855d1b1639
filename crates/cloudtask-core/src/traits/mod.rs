//! Core traits for the task bridge
//!
//! This module defines the seams between the bridge and the cloud REST API.
//!
//! - [`TaskApi`]: Fetch task state from the task endpoint
//! - [`AuthApi`]: Log in and refresh tokens

pub mod task_api;
pub mod auth_api;

pub use task_api::{TaskApi, TaskInfo, TaskResults, TaskState, TaskStatus};
pub use auth_api::{AuthApi, TokenPair, TokenScheme};
