//! Task view-controller: holds the transient task list, the status filter,
//! and the modal lifecycle, and coordinates fetch / mutate / resynchronize
//! against the API.
//!
//! Mutations are an explicit two-step pipeline: perform the call, then
//! refresh the list. The refresh has its own failure channel so a stale
//! list after a successful mutation is distinguishable from a failed
//! mutation. Any 401 forces session teardown before the error is surfaced.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ApiError};
use crate::session::SessionStore;
use crate::task::{Task, TaskDraft, TaskStatus};

/// Errors surfaced by board operations.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// The server returned 401; the session has already been torn down.
    #[error("session expired — logged out")]
    SessionExpired,
    /// The create/update/delete call itself failed. Nothing was resynced.
    #[error("mutation failed: {0}")]
    Mutation(#[source] ApiError),
    /// The mutation succeeded but the follow-up list failed; the local
    /// task list is stale.
    #[error("task list refresh failed: {0}")]
    Refresh(#[source] ApiError),
    /// Local form validation failed; no network call was made.
    #[error("invalid form: {0}")]
    InvalidForm(String),
}

/// Which task the open modal is editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalMode {
    Create,
    Edit(Uuid),
}

/// Form state held while the modal is open. An empty description is sent
/// as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

impl TaskForm {
    fn empty() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Pending,
        }
    }

    fn prefilled(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status,
        }
    }

    fn into_draft(self) -> Result<TaskDraft, BoardError> {
        let draft = TaskDraft {
            title: self.title,
            description: if self.description.trim().is_empty() {
                None
            } else {
                Some(self.description)
            },
            status: self.status,
        };
        draft.validate().map_err(BoardError::InvalidForm)?;
        Ok(draft)
    }
}

/// Modal lifecycle: closed → open (create or edit, with form state) →
/// closed. The modal always closes on submit or delete, even when the API
/// call fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Open { mode: ModalMode, form: TaskForm },
}

/// The board. Owns a disposable copy of the server's task collection.
pub struct TaskBoard {
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    tasks: Vec<Task>,
    filter: Option<TaskStatus>,
    modal: ModalState,
}

impl TaskBoard {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        Self {
            api,
            session,
            tasks: Vec::new(),
            filter: None,
            modal: ModalState::Closed,
        }
    }

    /// The collection as of the last successful refresh.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn filter(&self) -> Option<TaskStatus> {
        self.filter
    }

    pub fn modal(&self) -> &ModalState {
        &self.modal
    }

    /// Tear down the session after a 401 and surface `SessionExpired`.
    fn expire_session(&self) -> BoardError {
        warn!("server rejected the token — forcing logout");
        if let Err(e) = self.session.logout() {
            warn!(err = %e, "logout during 401 teardown failed");
        }
        BoardError::SessionExpired
    }

    /// Fetch the collection, scoped by the current filter, replacing the
    /// held list. No client-side caching, no pagination handling.
    pub async fn refresh(&mut self) -> Result<(), BoardError> {
        match self.api.list_tasks(self.filter).await {
            Ok(tasks) => {
                self.tasks = tasks;
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(self.expire_session()),
            Err(e) => Err(BoardError::Refresh(e)),
        }
    }

    /// Change the status filter and refetch.
    pub async fn set_filter(&mut self, filter: Option<TaskStatus>) -> Result<(), BoardError> {
        self.filter = filter;
        self.refresh().await
    }

    /// Run one mutation call, then resynchronize the list.
    async fn mutate_then_refresh(
        &mut self,
        result: Result<(), ApiError>,
    ) -> Result<(), BoardError> {
        match result {
            Ok(()) => {}
            Err(ApiError::Unauthorized) => return Err(self.expire_session()),
            Err(e) => return Err(BoardError::Mutation(e)),
        }
        self.refresh().await
    }

    /// Create a task, then refresh.
    pub async fn create(&mut self, draft: &TaskDraft) -> Result<(), BoardError> {
        draft.validate().map_err(BoardError::InvalidForm)?;
        let result = self.api.create_task(draft).await.map(|task| {
            info!(id = %task.id, title = %task.title, "task created");
        });
        self.mutate_then_refresh(result).await
    }

    /// Update a task, then refresh.
    pub async fn update(&mut self, id: Uuid, draft: &TaskDraft) -> Result<(), BoardError> {
        draft.validate().map_err(BoardError::InvalidForm)?;
        let result = self.api.update_task(id, draft).await.map(|task| {
            info!(id = %task.id, status = %task.status, "task updated");
        });
        self.mutate_then_refresh(result).await
    }

    /// Delete a task, then refresh. Closes the modal if it was open on the
    /// deleted task.
    pub async fn delete(&mut self, id: Uuid) -> Result<(), BoardError> {
        self.modal = ModalState::Closed;
        let result = self.api.delete_task(id).await.map(|()| {
            info!(id = %id, "task deleted");
        });
        self.mutate_then_refresh(result).await
    }

    // ── Modal lifecycle ──────────────────────────────────────────────────────

    /// Open the modal with a blank form for a new task.
    pub fn open_for_create(&mut self) {
        self.modal = ModalState::Open {
            mode: ModalMode::Create,
            form: TaskForm::empty(),
        };
    }

    /// Open the modal prefilled from an existing task.
    pub fn open_for_edit(&mut self, task: &Task) {
        self.modal = ModalState::Open {
            mode: ModalMode::Edit(task.id),
            form: TaskForm::prefilled(task),
        };
    }

    /// Close the modal, discarding the form.
    pub fn close_modal(&mut self) {
        self.modal = ModalState::Closed;
    }

    /// Mutable access to the open form, for edits before submit.
    pub fn form_mut(&mut self) -> Option<&mut TaskForm> {
        match &mut self.modal {
            ModalState::Open { form, .. } => Some(form),
            ModalState::Closed => None,
        }
    }

    /// Submit the open modal: dispatch create or update per its mode, then
    /// refresh. The modal closes unconditionally first — even a failed
    /// submit leaves it closed.
    pub async fn submit(&mut self) -> Result<(), BoardError> {
        let modal = std::mem::replace(&mut self.modal, ModalState::Closed);
        let (mode, form) = match modal {
            ModalState::Open { mode, form } => (mode, form),
            ModalState::Closed => {
                return Err(BoardError::InvalidForm("no open form to submit".to_string()))
            }
        };
        let draft = form.into_draft()?;
        match mode {
            ModalMode::Create => self.create(&draft).await,
            ModalMode::Edit(id) => self.update(id, &draft).await,
        }
    }
}
