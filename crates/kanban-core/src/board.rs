//! One open project: its task cache, transient move/drag state, the active
//! filter, and the operations that change tasks' columns and order.
//!
//! Mutations go to the backend first. Local state is only ever rebuilt from
//! a fresh listing afterwards, so a failed call leaves it untouched.
//! Methods take `&self` and never hold the state lock across an await, so
//! two operations may interleave on one thread.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendError};
use crate::columns::{self, Direction};
use crate::error::{KanbanError, KanbanResult, RejectReason};
use crate::filter::{self, FilterState};
use crate::ordering;
use crate::project::{Project, ProjectPatch};
use crate::session::{BoardSettings, Notifier};
use crate::stats::{self, BoardStats};
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragState {
    pub task_id: Uuid,
    /// Column currently under the pointer, if any.
    pub over: Option<String>,
}

#[derive(Debug)]
struct BoardState {
    project: Project,
    store: TaskStore,
    in_flight: HashSet<Uuid>,
    drag: Option<DragState>,
    filter: FilterState,
}

pub struct Board {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    settings: BoardSettings,
    state: Mutex<BoardState>,
}

impl Board {
    #[instrument(skip_all, fields(project = %project.id))]
    pub async fn open(
        backend: Arc<dyn Backend>,
        notifier: Arc<dyn Notifier>,
        settings: BoardSettings,
        project: Project,
    ) -> KanbanResult<Self> {
        let board = Self {
            backend,
            notifier,
            settings,
            state: Mutex::new(BoardState {
                project,
                store: TaskStore::new(),
                in_flight: HashSet::new(),
                drag: None,
                filter: FilterState::default(),
            }),
        };
        board.reload().await?;
        Ok(board)
    }

    pub fn project(&self) -> Project {
        self.state.lock().project.clone()
    }

    pub fn columns(&self) -> Vec<String> {
        self.state.lock().project.columns.clone()
    }

    /// All tasks in display order, ignoring the filter.
    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().store.tasks().to_vec()
    }

    pub fn task(&self, id: Uuid) -> Option<Task> {
        self.state.lock().store.get(id).cloned()
    }

    pub fn resolve_task(&self, prefix: &str) -> KanbanResult<Task> {
        self.state.lock().store.resolve_prefix(prefix).cloned()
    }

    pub fn column(&self, label: &str) -> Vec<Task> {
        self.state
            .lock()
            .store
            .column(label)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().store.generation()
    }

    pub fn filter(&self) -> FilterState {
        self.state.lock().filter.clone()
    }

    pub fn set_filter(&self, filter: FilterState) {
        debug!(active = filter.active_count(), "filter replaced");
        self.state.lock().filter = filter;
    }

    pub fn update_filter(&self, change: impl FnOnce(&mut FilterState)) {
        change(&mut self.state.lock().filter);
    }

    /// Tasks passing the active filter, in display order.
    pub fn visible_tasks(&self) -> Vec<Task> {
        let state = self.state.lock();
        filter::visible_tasks(state.store.tasks(), &state.filter)
            .into_iter()
            .cloned()
            .collect()
    }

    /// One column of the filtered view.
    pub fn visible_column(&self, label: &str) -> Vec<Task> {
        let state = self.state.lock();
        state
            .store
            .column(label)
            .into_iter()
            .filter(|task| state.filter.matches(task))
            .cloned()
            .collect()
    }

    /// Aggregates over every task of the project, filter ignored.
    pub fn stats(&self) -> BoardStats {
        let state = self.state.lock();
        stats::compute(state.store.tasks(), &state.project.columns)
    }

    pub fn is_in_flight(&self, id: Uuid) -> bool {
        self.state.lock().in_flight.contains(&id)
    }

    pub fn drag_state(&self) -> Option<DragState> {
        self.state.lock().drag.clone()
    }

    /// Replaces the project and the task cache with a fresh listing.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> KanbanResult<()> {
        self.reload_after("load tasks")
            .await
            .map_err(|err| self.surface("load tasks", err))
    }

    /// Moves a task one column left or right. Ignored at the board edges
    /// and while another move of the same task is outstanding.
    #[instrument(skip(self))]
    pub async fn move_step(&self, task_id: Uuid, direction: Direction) -> KanbanResult<Task> {
        let target = {
            let mut state = self.state.lock();
            let task = state
                .store
                .get(task_id)
                .ok_or_else(|| KanbanError::rejected(RejectReason::UnknownTask(task_id)))?;
            if state.in_flight.contains(&task_id) {
                return Err(KanbanError::rejected(RejectReason::InFlight(task_id)));
            }
            let columns = &state.project.columns;
            if columns::position(columns, &task.status).is_none() {
                return Err(KanbanError::rejected(RejectReason::UnknownColumn(
                    task.status.clone(),
                )));
            }
            let target = columns::adjacent(columns, &task.status, direction)
                .ok_or_else(|| KanbanError::rejected(RejectReason::AtBoundary))?
                .to_string();
            state.in_flight.insert(task_id);
            target
        };

        self.commit_move(task_id, &target).await
    }

    /// Starts dragging a card.
    pub fn begin_drag(&self, task_id: Uuid) -> KanbanResult<()> {
        let mut state = self.state.lock();
        if state.store.get(task_id).is_none() {
            return Err(KanbanError::rejected(RejectReason::UnknownTask(task_id)));
        }
        state.drag = Some(DragState {
            task_id,
            over: None,
        });
        debug!(%task_id, "drag started");
        Ok(())
    }

    /// Records the column under the pointer. Ignored when nothing is being
    /// dragged.
    pub fn drag_over(&self, label: &str) {
        if let Some(drag) = self.state.lock().drag.as_mut() {
            drag.over = Some(label.to_string());
        }
    }

    /// Ends a drag without moving anything.
    pub fn cancel_drag(&self) {
        if self.state.lock().drag.take().is_some() {
            debug!("drag cancelled");
        }
    }

    /// Drops the dragged card on `label`. The drag ends whatever the
    /// outcome.
    #[instrument(skip(self))]
    pub async fn drop_on(&self, label: &str) -> KanbanResult<Task> {
        let drag = self
            .state
            .lock()
            .drag
            .take()
            .ok_or_else(|| KanbanError::rejected(RejectReason::NoDragInProgress))?;
        self.move_to(drag.task_id, label).await
    }

    /// Moves a task straight to `label`. Dropping a task on its own column
    /// changes nothing.
    #[instrument(skip(self))]
    pub async fn move_to(&self, task_id: Uuid, label: &str) -> KanbanResult<Task> {
        {
            let mut state = self.state.lock();
            let task = state
                .store
                .get(task_id)
                .ok_or_else(|| KanbanError::rejected(RejectReason::UnknownTask(task_id)))?;
            if !state.project.has_column(label) {
                return Err(KanbanError::rejected(RejectReason::UnknownColumn(
                    label.to_string(),
                )));
            }
            if task.status == label {
                return Err(KanbanError::rejected(RejectReason::SameColumn));
            }
            if state.in_flight.contains(&task_id) {
                return Err(KanbanError::rejected(RejectReason::InFlight(task_id)));
            }
            state.in_flight.insert(task_id);
        }

        self.commit_move(task_id, label).await
    }

    async fn commit_move(&self, task_id: Uuid, target: &str) -> KanbanResult<Task> {
        let result = match self.backend.set_task_status(task_id, target).await {
            Ok(_) => self.reload_after("move the task").await,
            Err(err) => {
                if self.column_vanished(target).await {
                    self.finish_move(task_id);
                    debug!(%task_id, column = %target, "target column no longer exists");
                    return Err(KanbanError::rejected(RejectReason::UnknownColumn(
                        target.to_string(),
                    )));
                }
                Err(err)
            }
        };

        self.finish_move(task_id);

        match result {
            Ok(()) => {
                info!(%task_id, to = %target, "task moved");
                self.task(task_id).ok_or_else(|| {
                    self.surface("move the task", BackendError::not_found("task", task_id))
                })
            }
            Err(err) => Err(self.surface("move the task", err)),
        }
    }

    /// Clears the in-flight mark, and the drag when it was this task's.
    fn finish_move(&self, task_id: Uuid) {
        let mut state = self.state.lock();
        state.in_flight.remove(&task_id);
        if state.drag.as_ref().is_some_and(|drag| drag.task_id == task_id) {
            state.drag = None;
        }
    }

    /// After a failed move: true when the target column was removed by
    /// someone else. The board then holds the fresh project and tasks.
    async fn column_vanished(&self, label: &str) -> bool {
        let project_id = self.state.lock().project.id;
        match self.backend.get_project(project_id).await {
            Ok(Some(project)) if !project.has_column(label) => {
                self.state.lock().project = project;
                if let Err(err) = self.reload_after("move the task").await {
                    warn!(error = %err, "reload after column change failed");
                }
                true
            }
            Ok(_) => false,
            Err(err) => {
                warn!(error = %err, "could not re-read project after failed move");
                false
            }
        }
    }

    /// Empty template for a task on this board.
    pub fn draft(&self, title: impl Into<String>) -> NewTask {
        let project_id = self.state.lock().project.id;
        let mut new = NewTask::new(project_id, title);
        new.category = Some(self.settings.default_category.clone());
        new
    }

    #[instrument(skip(self, new), fields(title = %new.title))]
    pub async fn create_task(&self, new: NewTask) -> KanbanResult<Task> {
        let mut new = new.normalized()?;
        {
            let state = self.state.lock();
            if new.project_id != state.project.id {
                return Err(KanbanError::validation(
                    "task belongs to a different project",
                ));
            }
            new.status = Some(self.checked_status(&state.project, new.status.as_deref())?);
        }

        let created = self
            .backend
            .create_task(new)
            .await
            .map_err(|err| self.surface("save the task", err))?;
        self.reload_after("save the task")
            .await
            .map_err(|err| self.surface("save the task", err))?;
        info!(task = %created.id, status = %created.status, "task created");
        Ok(self.task(created.id).unwrap_or(created))
    }

    #[instrument(skip(self, patch))]
    pub async fn update_task(&self, task_id: Uuid, patch: TaskPatch) -> KanbanResult<Task> {
        let mut patch = patch.normalized()?;
        if let Some(status) = patch.status.as_deref() {
            let state = self.state.lock();
            let resolved = self.checked_status(&state.project, Some(status))?;
            patch.status = Some(resolved);
        }

        let updated = self
            .backend
            .update_task(task_id, patch)
            .await
            .map_err(|err| self.surface("save the task", err))?;
        self.reload_after("save the task")
            .await
            .map_err(|err| self.surface("save the task", err))?;
        Ok(self.task(updated.id).unwrap_or(updated))
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, task_id: Uuid) -> KanbanResult<()> {
        self.backend
            .delete_task(task_id)
            .await
            .map_err(|err| self.surface("delete the task", err))?;
        self.reload_after("delete the task")
            .await
            .map_err(|err| self.surface("delete the task", err))?;
        info!(%task_id, "task deleted");
        Ok(())
    }

    /// Rewrites the order of one column to `ids`. Nothing is written when
    /// the column already has that order.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn reorder(&self, label: &str, ids: &[Uuid]) -> KanbanResult<()> {
        let plan = {
            let state = self.state.lock();
            if !state.project.has_column(label) {
                return Err(KanbanError::rejected(RejectReason::UnknownColumn(
                    label.to_string(),
                )));
            }
            let column = state.store.column(label);
            let plan = ordering::plan_reorder(&column, ids)?;
            if ordering::is_current_order(&column, ids) {
                debug!(column = %label, "order unchanged, skipping write");
                return Ok(());
            }
            plan
        };

        self.backend
            .reorder_tasks(&plan)
            .await
            .map_err(|err| self.surface("reorder tasks", err))?;
        self.reload_after("reorder tasks")
            .await
            .map_err(|err| self.surface("reorder tasks", err))?;
        info!(column = %label, "column reordered");
        Ok(())
    }

    /// Moves a task to `index` inside its own column.
    #[instrument(skip(self))]
    pub async fn reposition(&self, task_id: Uuid, index: usize) -> KanbanResult<()> {
        let (label, ids) = {
            let state = self.state.lock();
            let task = state
                .store
                .get(task_id)
                .ok_or_else(|| KanbanError::rejected(RejectReason::UnknownTask(task_id)))?;
            let current: Vec<Uuid> = state
                .store
                .column(&task.status)
                .iter()
                .map(|t| t.id)
                .collect();
            let ids = ordering::reposition(&current, task_id, index)
                .ok_or_else(|| KanbanError::rejected(RejectReason::UnknownTask(task_id)))?;
            (task.status.clone(), ids)
        };
        self.reorder(&label, &ids).await
    }

    #[instrument(skip(self))]
    pub async fn add_column(&self, label: &str, at: Option<usize>) -> KanbanResult<Project> {
        let (project_id, next) = {
            let state = self.state.lock();
            let next = columns::with_column_added(&state.project.columns, label, at)?;
            (state.project.id, next)
        };
        self.save_columns(project_id, next, "add the column").await
    }

    /// Removes a column. Its tasks are first moved to the nearest remaining
    /// column, so every task keeps a valid status throughout.
    #[instrument(skip(self))]
    pub async fn remove_column(&self, label: &str) -> KanbanResult<Project> {
        let (project_id, plan, displaced) = {
            let state = self.state.lock();
            let plan = columns::plan_removal(&state.project.columns, label)?;
            let displaced: Vec<Uuid> = state.store.column(label).iter().map(|t| t.id).collect();
            (state.project.id, plan, displaced)
        };

        for task_id in &displaced {
            if let Err(err) = self.backend.set_task_status(*task_id, &plan.fallback).await {
                if let Err(reload_err) = self.reload_after("remove the column").await {
                    warn!(error = %reload_err, "reload after failed column removal");
                }
                return Err(self.surface("remove the column", err));
            }
        }
        if !displaced.is_empty() {
            info!(
                column = %plan.removed,
                fallback = %plan.fallback,
                moved = displaced.len(),
                "reassigned tasks of removed column"
            );
        }

        self.save_columns(project_id, plan.remaining, "remove the column")
            .await
    }

    async fn save_columns(
        &self,
        project_id: Uuid,
        columns: Vec<String>,
        action: &str,
    ) -> KanbanResult<Project> {
        let project = self
            .backend
            .update_project(project_id, ProjectPatch::columns(columns))
            .await
            .map_err(|err| self.surface(action, err))?;
        self.state.lock().project = project.clone();
        self.reload_after(action)
            .await
            .map_err(|err| self.surface(action, err))?;
        Ok(project)
    }

    async fn reload_after(&self, action: &str) -> Result<(), BackendError> {
        let project_id = self.state.lock().project.id;
        let project = self
            .backend
            .get_project(project_id)
            .await?
            .ok_or_else(|| BackendError::not_found("project", project_id))?;
        let tasks = self.backend.list_tasks(project_id).await?;
        {
            let mut state = self.state.lock();
            state.project = project;
            state.store.replace(project_id, tasks);
        }
        debug!(action, "reloaded after mutation");
        Ok(())
    }

    fn checked_status(&self, project: &Project, status: Option<&str>) -> KanbanResult<String> {
        match status {
            None => project
                .first_column()
                .map(ToString::to_string)
                .ok_or_else(|| KanbanError::validation("project has no columns")),
            Some(raw) => columns::resolve_label(&project.columns, raw)
                .map(ToString::to_string)
                .ok_or_else(|| KanbanError::validation(format!("no column named '{raw}'"))),
        }
    }

    fn surface(&self, action: &str, err: BackendError) -> KanbanError {
        warn!(action, error = %err, "backend request failed");
        self.notifier
            .notify_error(&self.settings.failure_notice(action));
        KanbanError::Collaborator(err)
    }
}
