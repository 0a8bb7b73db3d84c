//! Client-held session state: one persisted token file, one in-memory
//! authenticated flag, and the token slot attached to the API client.
//!
//! Every mutator keeps those three in step on every exit path. The flag is
//! true iff a non-empty token is held; the token itself is never validated
//! locally — trust is deferred to the server on each request.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError};

const TOKEN_FILE: &str = "auth_token";

/// Errors from the session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The login call itself failed; propagated unchanged from the wrapper.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The token file could not be read, written, or removed.
    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Persisted session store. One per process, shared via `Arc`; the only
/// mutator of the API client's token slot.
pub struct SessionStore {
    data_dir: PathBuf,
    api: Arc<ApiClient>,
    authenticated: AtomicBool,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>, api: Arc<ApiClient>) -> Self {
        Self {
            data_dir: data_dir.into(),
            api,
            authenticated: AtomicBool::new(false),
        }
    }

    fn token_path(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILE)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Read the persisted token, if any, and attach it. Runs once at
    /// startup, before any command that issues requests.
    pub fn initialize(&self) -> Result<(), SessionError> {
        match std::fs::read_to_string(self.token_path()) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    debug!("token file present but empty — starting logged out");
                    self.reset_memory();
                } else {
                    self.api.set_token(token);
                    self.authenticated.store(true, Ordering::SeqCst);
                    debug!("session restored from token file");
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.reset_memory();
                Ok(())
            }
            Err(e) => {
                self.reset_memory();
                Err(e.into())
            }
        }
    }

    /// Exchange credentials for a token, persist it, and attach it.
    ///
    /// On API failure the error propagates unchanged — no retry, no
    /// backoff; the caller surfaces it. If persisting fails after a
    /// successful login, the in-memory state is rolled back so storage,
    /// flag, and attached token stay consistent.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let token = self.api.login(username, password).await?;

        self.api.set_token(&token);
        self.authenticated.store(true, Ordering::SeqCst);

        if let Err(e) = persist_token(&self.data_dir, self.token_path().as_path(), &token) {
            self.reset_memory();
            return Err(e.into());
        }

        info!(username, "logged in");
        Ok(())
    }

    /// Clear the persisted token, the flag, and the attached header.
    /// Idempotent — safe to call when already logged out.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.reset_memory();
        match std::fs::remove_file(self.token_path()) {
            Ok(()) => {
                info!("logged out");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn reset_memory(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        self.api.clear_token();
    }
}

fn persist_token(data_dir: &Path, path: &Path, token: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(path, token)
}
