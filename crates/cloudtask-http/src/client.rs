//! Authorized JSON requests against the cloud API

use cloudtask_core::{Error, Result, Session};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// JSON client bound to one base URL and one session
///
/// Every request goes through [`Session::authorized`], so a 401 triggers at
/// most one re-authentication and one retry.
#[derive(Clone)]
pub struct ApiClient {
    /// Base URL without trailing slash
    base_url: String,

    /// HTTP client (with timeout)
    client: reqwest::Client,

    /// Shared credentials
    session: Arc<Session>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish()
    }
}

impl ApiClient {
    /// Create a client
    ///
    /// # Parameters
    ///
    /// - `base_url`: API base URL (e.g. "https://api.example.com/cloud")
    /// - `session`: Session providing the `Authorization` header
    /// - `timeout`: Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<Session>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_http_client(timeout)?,
            session,
        })
    }

    /// The session this client authorizes with
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a JSON resource
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None).await
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(body)).await
    }

    /// DELETE a resource and decode the JSON response
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::DELETE, path, None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        self.session
            .authorized(|authorization| {
                let mut request = self
                    .client
                    .request(method.clone(), &url)
                    .header(AUTHORIZATION, authorization);
                if let Some(body) = &body {
                    request = request.json(body);
                }
                execute(request)
            })
            .await
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request and decode a JSON response
///
/// An empty success body decodes as JSON `null`.
pub(crate) async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::network(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(error_for_status(status, &error_text));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::network(format!("Failed to read response: {}", e)))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Map a non-success status to an error
pub(crate) fn error_for_status(status: StatusCode, error_text: &str) -> Error {
    let detail = server_message(error_text);
    match status.as_u16() {
        401 => Error::unauthorized(format!("{}: {}", status, detail)),
        403 => Error::auth(format!("Insufficient permissions. Status: {} - {}", status, detail)),
        404 => Error::not_found(detail),
        429 => Error::rate_limited(format!("Please retry later. Status: {}", status)),
        500..=599 => Error::http(status.as_u16(), format!("Server error (transient): {}", detail)),
        _ => Error::http(status.as_u16(), detail),
    }
}

/// The API reports errors as `{"message": ..}` or `{"error": ..}`
fn server_message(error_text: &str) -> String {
    serde_json::from_str::<Value>(error_text)
        .ok()
        .and_then(|json| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| error_text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloudtask_core::{AuthApi, Credentials, TokenPair};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct NoAuth;

    #[async_trait]
    impl AuthApi for NoAuth {
        async fn login(&self, _username: &str, _password: &str) -> Result<TokenPair> {
            Err(Error::auth("unused"))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair> {
            Err(Error::refresh("unused"))
        }
    }

    /// Login issues `access-1`, refresh issues `access-2`
    #[derive(Default)]
    struct RotatingAuth {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl AuthApi for RotatingAuth {
        async fn login(&self, _username: &str, _password: &str) -> Result<TokenPair> {
            Ok(TokenPair::new("access-1", Some("refresh-1".to_string())))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(TokenPair::new("access-2", Some("refresh-2".to_string())))
        }
    }

    /// Serve on loopback, answering 200 only to `accepted` and 401 otherwise
    async fn serve_accepting(accepted: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }

                let request = String::from_utf8_lossy(&request).to_string();
                let authorization = request
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("authorization")
                            .then(|| value.trim().to_string())
                    })
                    .unwrap_or_default();
                let (status, body) = if authorization == accepted {
                    ("200 OK", r#"{"ok":true}"#)
                } else {
                    ("401 Unauthorized", r#"{"message":"token is expired"}"#)
                };
                log.lock().unwrap().push(authorization);

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (base_url, seen)
    }

    async fn password_session(auth: Arc<RotatingAuth>) -> Arc<Session> {
        let credentials = Credentials::Password {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        Arc::new(Session::authenticate(auth, credentials, true).await.unwrap())
    }

    fn client(base_url: &str) -> ApiClient {
        let session = Arc::new(Session::new(Arc::new(NoAuth)));
        ApiClient::new(base_url, session, Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert!(error_for_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, ""),
            Error::Authentication(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, ""),
            Error::NotFound(_)
        ));

        let rate_limited = error_for_status(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(rate_limited, Error::RateLimited(_)));
        assert!(rate_limited.is_transient());

        let unavailable = error_for_status(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(matches!(unavailable, Error::Http { status: 503, .. }));
        assert!(unavailable.is_transient());

        let bad_request = error_for_status(StatusCode::BAD_REQUEST, "");
        assert!(matches!(bad_request, Error::Http { status: 400, .. }));
        assert!(!bad_request.is_transient());
    }

    #[test]
    fn test_server_message() {
        let err = error_for_status(StatusCode::BAD_REQUEST, r#"{"message": "Invalid flavor"}"#);
        assert!(err.to_string().contains("Invalid flavor"));

        let err = error_for_status(StatusCode::BAD_REQUEST, "plain text\n");
        assert!(err.to_string().contains("plain text"));
    }

    #[test]
    fn test_url_join() {
        let client = client("https://api.example.com/cloud/");
        assert_eq!(
            client.url("/v1/tasks/abc"),
            "https://api.example.com/cloud/v1/tasks/abc"
        );
        assert_eq!(
            client.url("v1/tasks/abc"),
            "https://api.example.com/cloud/v1/tasks/abc"
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_session_fails_before_sending() {
        // Port 9 is never contacted: the session has no token
        let client = client("http://127.0.0.1:9");
        let result: Result<Value> = client.get_json("v1/tasks/abc").await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[tokio::test]
    async fn test_unauthorized_request_reauthenticates_and_retries() {
        let (base_url, seen) = serve_accepting("Bearer access-2").await;
        let auth = Arc::new(RotatingAuth::default());
        let session = password_session(Arc::clone(&auth)).await;
        let client = ApiClient::new(&base_url, Arc::clone(&session), Duration::from_secs(5)).unwrap();

        let body: Value = client.get_json("v1/tasks/abc").await.unwrap();

        assert_eq!(body, serde_json::json!({ "ok": true }));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Bearer access-1".to_string(), "Bearer access-2".to_string()]
        );
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(session.authorization().await.unwrap(), "Bearer access-2");
    }

    #[tokio::test]
    async fn test_second_unauthorized_response_is_fatal() {
        let (base_url, seen) = serve_accepting("Bearer never-issued").await;
        let auth = Arc::new(RotatingAuth::default());
        let session = password_session(Arc::clone(&auth)).await;
        let client = ApiClient::new(&base_url, session, Duration::from_secs(5)).unwrap();

        let result: Result<Value> = client.get_json("v1/tasks/abc").await;

        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
    }
}
