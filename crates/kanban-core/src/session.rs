//! Per-run context: the collaborators and settings every board operation
//! needs, built once at start-up and passed down explicitly.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendError, Identity};
use crate::board::Board;
use crate::columns;
use crate::config::Config;
use crate::error::{KanbanError, KanbanResult};
use crate::project::{NewProject, Project, ProjectPatch};
use crate::task::DEFAULT_CATEGORY;

pub const DEFAULT_RETRY_HINT: &str = "Please try again.";

/// Sink for user-facing failure notices.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Writes notices to stderr, where the CLI reports errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify_error(&self, message: &str) {
        eprintln!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSettings {
    pub default_columns: Vec<String>,
    pub default_category: String,
    pub retry_hint: String,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            default_columns: columns::default_columns(),
            default_category: DEFAULT_CATEGORY.to_string(),
            retry_hint: DEFAULT_RETRY_HINT.to_string(),
        }
    }
}

impl BoardSettings {
    /// Reads `board.columns`, `task.category` and `notify.message`, keeping
    /// defaults for missing or unusable values.
    pub fn from_config(cfg: &Config) -> Self {
        let mut settings = Self::default();

        if let Some(list) = cfg.get_list("board.columns") {
            match columns::validate_columns(&list) {
                Ok(cols) => settings.default_columns = cols,
                Err(err) => warn!(value = ?list, error = %err, "ignoring board.columns"),
            }
        }
        if let Some(category) = cfg.get("task.category")
            && !category.trim().is_empty()
        {
            settings.default_category = category.trim().to_string();
        }
        if let Some(hint) = cfg.get("notify.message")
            && !hint.trim().is_empty()
        {
            settings.retry_hint = hint.trim().to_string();
        }
        settings
    }

    pub(crate) fn failure_notice(&self, action: &str) -> String {
        format!("Could not {action}. {}", self.retry_hint)
    }
}

#[derive(Clone)]
pub struct Session {
    backend: Arc<dyn Backend>,
    identity: Arc<dyn Identity>,
    notifier: Arc<dyn Notifier>,
    settings: BoardSettings,
}

impl Session {
    pub fn new(
        backend: Arc<dyn Backend>,
        identity: Arc<dyn Identity>,
        notifier: Arc<dyn Notifier>,
        settings: BoardSettings,
    ) -> Self {
        Self {
            backend,
            identity,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    pub fn current_user(&self) -> KanbanResult<Uuid> {
        match self.identity.current_user() {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(KanbanError::Collaborator(BackendError::unauthenticated())),
            Err(err) => Err(self.surface("check who is signed in", err)),
        }
    }

    #[instrument(skip(self))]
    pub async fn projects(&self) -> KanbanResult<Vec<Project>> {
        let owner = self.current_user()?;
        self.backend
            .list_projects(owner)
            .await
            .map_err(|err| self.surface("load projects", err))
    }

    #[instrument(skip(self))]
    pub async fn project(&self, id: Uuid) -> KanbanResult<Project> {
        match self.backend.get_project(id).await {
            Ok(Some(project)) => Ok(project),
            Ok(None) => Err(self.surface(
                "load the project",
                BackendError::not_found("project", id),
            )),
            Err(err) => Err(self.surface("load the project", err)),
        }
    }

    #[instrument(skip(self, new), fields(title = %new.title))]
    pub async fn create_project(&self, mut new: NewProject) -> KanbanResult<Project> {
        let owner = self.current_user()?;
        if new.columns.is_none() {
            new.columns = Some(self.settings.default_columns.clone());
        }
        let new = new.normalized()?;
        let project = self
            .backend
            .create_project(owner, new)
            .await
            .map_err(|err| self.surface("create the project", err))?;
        info!(project = %project.id, "project created");
        Ok(project)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> KanbanResult<Project> {
        let patch = patch.normalized()?;
        self.backend
            .update_project(id, patch)
            .await
            .map_err(|err| self.surface("update the project", err))
    }

    #[instrument(skip(self))]
    pub async fn delete_project(&self, id: Uuid) -> KanbanResult<()> {
        self.backend
            .delete_project(id)
            .await
            .map_err(|err| self.surface("delete the project", err))?;
        info!(project = %id, "project deleted");
        Ok(())
    }

    /// Loads the project and its tasks into a board.
    #[instrument(skip(self))]
    pub async fn open_board(&self, project_id: Uuid) -> KanbanResult<Board> {
        let project = self.project(project_id).await?;
        Board::open(
            Arc::clone(&self.backend),
            Arc::clone(&self.notifier),
            self.settings.clone(),
            project,
        )
        .await
    }

    fn surface(&self, action: &str, err: BackendError) -> KanbanError {
        warn!(action, error = %err, "backend request failed");
        self.notifier
            .notify_error(&self.settings.failure_notice(action));
        KanbanError::Collaborator(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config_and_skip_bad_values() {
        let mut cfg = Config::defaults();
        cfg.apply_overrides([
            ("board.columns".to_string(), "Backlog, Now".to_string()),
            ("task.category".to_string(), "work".to_string()),
            ("notify.message".to_string(), "Check your connection.".to_string()),
        ]);
        let settings = BoardSettings::from_config(&cfg);
        assert_eq!(settings.default_columns, vec!["Backlog", "Now"]);
        assert_eq!(settings.default_category, "work");
        assert_eq!(
            settings.failure_notice("save the task"),
            "Could not save the task. Check your connection."
        );

        cfg.apply_overrides([("board.columns".to_string(), "A,a".to_string())]);
        let settings = BoardSettings::from_config(&cfg);
        assert_eq!(settings.default_columns, columns::default_columns());
    }
}
