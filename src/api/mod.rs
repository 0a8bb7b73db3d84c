//! Thin HTTP wrapper over the task service REST API.
//!
//! One `ApiClient` is built per process and shared via `Arc`. The bearer
//! token lives in a slot on the client; the session store is its only
//! mutator. Wrapper methods never catch — every error propagates to the
//! caller unchanged, and only the board intercepts (the 401 case).

use serde::Deserialize;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::task::{Task, TaskDraft, TaskStatus};

/// Errors returned by the API wrapper.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered 401 — an expired token or, on the login
    /// endpoint, bad credentials.
    #[error("unauthorized (HTTP 401)")]
    Unauthorized,
    /// Any other non-success HTTP status.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// Connection, timeout, or body-decode failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    // `token_type` is always "bearer"; accepted and ignored.
}

/// HTTP client for the task service.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Attach a bearer token to all subsequent requests.
    pub fn set_token(&self, token: &str) {
        *self.token.write().expect("token lock poisoned") = Some(token.to_string());
    }

    /// Remove the attached bearer token.
    pub fn clear_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    /// The currently attached bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer header when a token is held.
    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Map non-success statuses into the error taxonomy.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// POST /login with form-encoded credentials. Returns the access token.
    /// Does not attach the token — that is the session store's job.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let resp = self
            .http
            .post(self.url("/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let body: LoginResponse = resp.json().await?;
        debug!(username, "login accepted");
        Ok(body.access_token)
    }

    /// GET /tasks, optionally scoped by status. The filter value is passed
    /// verbatim as the wire string; filtering happens server-side.
    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>, ApiError> {
        let mut req = self.authed(self.http.get(self.url("/tasks")));
        if let Some(status) = status {
            req = req.query(&[("status", status.as_str())]);
        }
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// GET /tasks/{id}.
    pub async fn get_task(&self, id: Uuid) -> Result<Task, ApiError> {
        let req = self.authed(self.http.get(self.url(&format!("/tasks/{id}"))));
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// POST /tasks. Returns the created task.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let req = self.authed(self.http.post(self.url("/tasks"))).json(draft);
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// PUT /tasks/{id}. Returns the updated task.
    pub async fn update_task(&self, id: Uuid, draft: &TaskDraft) -> Result<Task, ApiError> {
        let req = self
            .authed(self.http.put(self.url(&format!("/tasks/{id}"))))
            .json(draft);
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    /// DELETE /tasks/{id}. The response body has no defined contract.
    pub async fn delete_task(&self, id: Uuid) -> Result<(), ApiError> {
        let req = self.authed(self.http.delete(self.url(&format!("/tasks/{id}"))));
        Self::check(req.send().await?).await?;
        Ok(())
    }
}
