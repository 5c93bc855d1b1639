// # cloudtask HTTP client
//
// REST implementations of the `cloudtask-core` seams, plus a
// [`CloudClient`] that submits a mutating request and waits for the tasks
// it started.
//
// ## Layout
//
// - `client`: [`ApiClient`], authorized JSON requests and status mapping
// - `auth`: [`RestAuthApi`], JWT login and refresh
// - `tasks`: [`RestTaskApi`], task lookups
// - `cloud`: [`CloudClient`], wiring from a [`cloudtask_core::CloudConfig`]
//
// ## Status mapping
//
// | Status | Error                  | Transient |
// |--------|------------------------|-----------|
// | 401    | `Error::Unauthorized`  | no (re-authenticated by the session) |
// | 403    | `Error::Authentication`| no        |
// | 404    | `Error::NotFound`      | no        |
// | 429    | `Error::RateLimited`   | yes       |
// | 5xx    | `Error::Http`          | yes       |
// | other  | `Error::Http`          | no        |
//
// ## Security Requirements
//
// - Tokens and passwords NEVER appear in logs or `Debug` output
// - No retries here beyond the session's single re-authentication;
//   transient failures are retried by the task poller

mod auth;
mod client;
mod cloud;
mod tasks;

pub use auth::RestAuthApi;
pub use client::ApiClient;
pub use cloud::CloudClient;
pub use tasks::RestTaskApi;
