use tracing::debug;
use uuid::Uuid;

use crate::error::{KanbanError, KanbanResult};
use crate::ordering;
use crate::task::Task;

/// Local copy of one project's tasks. It is never patched in place: every
/// mutation is followed by `replace` with a fresh listing.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    generation: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, project_id: Uuid, mut tasks: Vec<Task>) {
        tasks.retain(|t| t.project_id == project_id);
        ordering::sort_for_display(&mut tasks);
        self.tasks = tasks;
        self.generation += 1;
        debug!(
            %project_id,
            count = self.tasks.len(),
            generation = self.generation,
            "task store reloaded"
        );
    }

    /// Bumped on every reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn column(&self, status: &str) -> Vec<&Task> {
        ordering::partition(&self.tasks, status)
    }

    /// Finds the single task whose id starts with `prefix` (hyphens
    /// ignored).
    pub fn resolve_prefix(&self, prefix: &str) -> KanbanResult<&Task> {
        let wanted = prefix.trim().replace('-', "").to_ascii_lowercase();
        if wanted.is_empty() {
            return Err(KanbanError::validation("task id is required"));
        }

        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.simple().to_string().starts_with(&wanted));
        let found = matches
            .next()
            .ok_or_else(|| KanbanError::validation(format!("no task matches '{prefix}'")))?;
        if matches.next().is_some() {
            return Err(KanbanError::validation(format!(
                "'{prefix}' matches more than one task"
            )));
        }
        Ok(found)
    }
}
