// # cloudtask-core
//
// Core library for driving asynchronous cloud API operations to completion.
//
// Most mutating calls against the cloud API (create, delete, resize) are
// accepted asynchronously and answered with a list of task IDs. This crate
// turns that into a synchronous result:
//
// submit request → task IDs → poll task status → decode payload → typed ID
//
// ## Architecture Overview
//
// - **TaskApi**: Trait for fetching task state from the task endpoint
// - **AuthApi**: Trait for the login and token refresh endpoints
// - **Session**: Holds the token pair and re-authenticates on expiry
// - **TaskPoller**: Blocks (with a deadline) until a task is terminal
// - **ResultExtractor**: Per-resource-kind decoding of the task payload
//
// ## Design Principles
//
// 1. **No HTTP here**: REST implementations live in `cloudtask-http`
// 2. **Explicit configuration**: No process-wide client or session
// 3. **Bounded retries**: Re-auth once per failure chain, transient
//    fetch failures a fixed number of times
// 4. **Typed results**: Payloads are decoded only after terminal success

pub mod traits;
pub mod session;
pub mod poller;
pub mod extract;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{AuthApi, TaskApi};
pub use traits::{TaskInfo, TaskResults, TaskState, TaskStatus, TokenPair, TokenScheme};
pub use session::{Credentials, Session};
pub use poller::TaskPoller;
pub use extract::{
    CreatedResourceId, CreatedResourceIds, CreatedResources, ResourceKind, ResultExtractor,
    TaskCompleted,
};
pub use config::{CloudConfig, CredentialsConfig, PollConfig};
pub use error::{Error, Result};
