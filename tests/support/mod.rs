//! In-process mock of the task service for integration tests.
//!
//! Implements the same surface the real backend exposes: form-encoded
//! /login issuing bearer tokens, and /tasks CRUD over in-memory state with
//! bearer enforcement. Spun up on a random port per test.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use taskdeck::task::{Task, TaskDraft, TaskStatus};

/// The one password the mock accepts, for any username.
pub const PASSWORD: &str = "pw";

#[derive(Default)]
pub struct ServerState {
    tokens: Mutex<HashSet<String>>,
    tasks: Mutex<Vec<Task>>,
    fail_next_list: AtomicBool,
}

impl ServerState {
    /// Invalidate every issued token so the next authed call gets a 401.
    pub fn revoke_all_tokens(&self) {
        self.tokens.lock().unwrap().clear();
    }

    /// Make the next GET /tasks fail with a 500.
    pub fn fail_next_list(&self) {
        self.fail_next_list.store(true, Ordering::SeqCst);
    }

    /// Number of tasks currently held server-side.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<ServerState>,
}

pub async fn spawn() -> MockServer {
    let state = Arc::new(ServerState::default());
    let router = Router::new()
        .route("/login", post(login))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockServer {
        base_url: format!("http://{addr}"),
        state,
    }
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<String>,
}

fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if state.tokens.lock().unwrap().contains(token) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn login(
    State(state): State<Arc<ServerState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if form.password != PASSWORD {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let token = format!("tok-{}-{}", form.username, Uuid::new_v4());
    state.tokens.lock().unwrap().insert(token.clone());
    Ok(Json(serde_json::json!({
        "access_token": token,
        "token_type": "bearer",
    })))
}

async fn list_tasks(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Task>>, StatusCode> {
    authorize(&state, &headers)?;
    if state.fail_next_list.swap(false, Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let filter = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<TaskStatus>()
                .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?,
        ),
        None => None,
    };
    let tasks = state.tasks.lock().unwrap();
    let out: Vec<Task> = tasks
        .iter()
        .filter(|t| filter.map_or(true, |f| t.status == f))
        .cloned()
        .collect();
    Ok(Json(out))
}

async fn get_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, StatusCode> {
    authorize(&state, &headers)?;
    let tasks = state.tasks.lock().unwrap();
    tasks
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>), StatusCode> {
    authorize(&state, &headers)?;
    if draft.title.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let task = Task {
        id: Uuid::new_v4(),
        title: draft.title,
        description: draft.description,
        status: draft.status,
        created_at: Utc::now(),
        updated_at: None,
    };
    state.tasks.lock().unwrap().push(task.clone());
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(draft): Json<TaskDraft>,
) -> Result<Json<Task>, StatusCode> {
    authorize(&state, &headers)?;
    let mut tasks = state.tasks.lock().unwrap();
    let task = tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    task.title = draft.title;
    task.description = draft.description;
    task.status = draft.status;
    task.updated_at = Some(Utc::now());
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    authorize(&state, &headers)?;
    let mut tasks = state.tasks.lock().unwrap();
    let before = tasks.len();
    tasks.retain(|t| t.id != id);
    if tasks.len() == before {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
