//! Boundary to the persistence and identity services the board relies on.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::project::{NewProject, Project, ProjectPatch};
use crate::task::{NewTask, Task, TaskPatch};

const UNAUTHENTICATED: &str = "not signed in";

/// Failure reported by a backend. Only the message is kept; callers do not
/// branch on the kind of failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &str, id: Uuid) -> Self {
        Self::new(format!("{kind} not found: {id}"))
    }

    pub fn unauthenticated() -> Self {
        Self::new(UNAUTHENTICATED)
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.message == UNAUTHENTICATED
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Tasks of a project in display order.
    async fn list_tasks(&self, project_id: Uuid) -> BackendResult<Vec<Task>>;

    /// Stores a task at the end of its column.
    async fn create_task(&self, new: NewTask) -> BackendResult<Task>;

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> BackendResult<Task>;

    async fn delete_task(&self, id: Uuid) -> BackendResult<()>;

    /// Moves a task to `status`, appending it to that column.
    async fn set_task_status(&self, id: Uuid, status: &str) -> BackendResult<Task>;

    /// Rewrites the given order keys. Either every pair is applied or none.
    async fn reorder_tasks(&self, order: &[(Uuid, i64)]) -> BackendResult<()>;

    /// Projects owned by `owner_id`, newest first.
    async fn list_projects(&self, owner_id: Uuid) -> BackendResult<Vec<Project>>;

    async fn get_project(&self, id: Uuid) -> BackendResult<Option<Project>>;

    async fn create_project(&self, owner_id: Uuid, new: NewProject) -> BackendResult<Project>;

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> BackendResult<Project>;

    /// Removes the project and every task in it.
    async fn delete_project(&self, id: Uuid) -> BackendResult<()>;
}

pub trait Identity: Send + Sync {
    /// The signed-in user, or `None` when nobody is.
    fn current_user(&self) -> BackendResult<Option<Uuid>>;
}
