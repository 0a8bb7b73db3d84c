//! Session lifecycle against a live in-process task service: login,
//! reload, logout, forced teardown on 401.

mod support;

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use taskdeck::api::{ApiClient, ApiError};
use taskdeck::board::{BoardError, TaskBoard};
use taskdeck::config::ClientConfig;
use taskdeck::session::{SessionError, SessionStore};

/// Build a client + session store rooted at `data_dir`, pointed at the
/// mock, with the persisted token (if any) loaded — one simulated process
/// start.
fn boot(base_url: &str, data_dir: &Path) -> (Arc<ApiClient>, Arc<SessionStore>) {
    let config = ClientConfig::new(
        Some(base_url.to_string()),
        Some(data_dir.to_path_buf()),
        None,
    );
    let api = Arc::new(ApiClient::new(&config).unwrap());
    let session = Arc::new(SessionStore::new(data_dir, api.clone()));
    session.initialize().unwrap();
    (api, session)
}

#[tokio::test]
async fn login_then_reload_restores_the_session() {
    let server = support::spawn().await;
    let dir = TempDir::new().unwrap();

    let (api, session) = boot(&server.base_url, dir.path());
    assert!(!session.is_authenticated());

    session.login("alice", support::PASSWORD).await.unwrap();
    assert!(session.is_authenticated());
    let token = api.token().expect("token attached after login");

    // Fresh client + store over the same data dir — a process restart.
    let (api2, session2) = boot(&server.base_url, dir.path());
    assert!(session2.is_authenticated());
    assert_eq!(api2.token().as_deref(), Some(token.as_str()));

    // The restored token is accepted by the server.
    let mut board = TaskBoard::new(api2, session2);
    board.refresh().await.unwrap();
}

#[tokio::test]
async fn failed_login_propagates_and_leaves_no_session() {
    let server = support::spawn().await;
    let dir = TempDir::new().unwrap();
    let (api, session) = boot(&server.base_url, dir.path());

    let err = session.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Api(ApiError::Unauthorized)
    ));
    // A bad password must not be reported as a rejected session token.
    assert!(!err.to_string().contains("token"));
    assert!(!session.is_authenticated());
    assert!(api.token().is_none());
    assert!(!dir.path().join("auth_token").exists());
}

#[tokio::test]
async fn logout_is_idempotent_end_to_end() {
    let server = support::spawn().await;
    let dir = TempDir::new().unwrap();
    let (api, session) = boot(&server.base_url, dir.path());

    session.login("alice", support::PASSWORD).await.unwrap();
    session.logout().unwrap();
    session.logout().unwrap();

    assert!(!session.is_authenticated());
    assert!(api.token().is_none());
    assert!(!dir.path().join("auth_token").exists());
}

#[tokio::test]
async fn rejected_token_forces_logout_during_list() {
    let server = support::spawn().await;
    let dir = TempDir::new().unwrap();
    let (api, session) = boot(&server.base_url, dir.path());

    session.login("alice", support::PASSWORD).await.unwrap();
    server.state.revoke_all_tokens();

    let mut board = TaskBoard::new(api.clone(), session.clone());
    let err = board.refresh().await.unwrap_err();
    assert!(matches!(err, BoardError::SessionExpired));

    // Teardown happened: flag, header, and token file are all gone.
    assert!(!session.is_authenticated());
    assert!(api.token().is_none());
    assert!(!dir.path().join("auth_token").exists());
}

#[tokio::test]
async fn unauthenticated_list_surfaces_session_expired() {
    let server = support::spawn().await;
    let dir = TempDir::new().unwrap();
    let (api, session) = boot(&server.base_url, dir.path());

    let mut board = TaskBoard::new(api, session.clone());
    let err = board.refresh().await.unwrap_err();
    assert!(matches!(err, BoardError::SessionExpired));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn login_rolls_back_when_the_token_cannot_be_persisted() {
    let server = support::spawn().await;
    let dir = TempDir::new().unwrap();

    // Point the data dir at a regular file so create_dir_all fails.
    let blocked = dir.path().join("not-a-dir");
    std::fs::write(&blocked, "occupied").unwrap();

    let (api, session) = boot(&server.base_url, dir.path());
    let config = ClientConfig::new(
        Some(server.base_url.clone()),
        Some(blocked.clone()),
        None,
    );
    let api_blocked = Arc::new(ApiClient::new(&config).unwrap());
    let session_blocked = SessionStore::new(&blocked, api_blocked.clone());

    let err = session_blocked
        .login("alice", support::PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    // In-memory state rolled back — storage, flag, and header agree.
    assert!(!session_blocked.is_authenticated());
    assert!(api_blocked.token().is_none());

    // The unrelated store is untouched.
    assert!(!session.is_authenticated());
    assert!(api.token().is_none());
}
