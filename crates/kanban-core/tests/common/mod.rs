#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use kanban_core::backend::{Backend, BackendError, BackendResult};
use kanban_core::board::Board;
use kanban_core::datastore::DataStore;
use kanban_core::project::{NewProject, Project, ProjectPatch};
use kanban_core::session::{BoardSettings, Notifier, Session};
use kanban_core::task::{NewTask, Task, TaskPatch};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

/// Wraps a real datastore, recording every call and failing or pausing
/// the ones a test asks for.
pub struct ScriptedBackend {
    inner: Arc<DataStore>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    move_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedBackend {
    pub fn new(inner: Arc<DataStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(vec![]),
            failing: Mutex::new(HashSet::new()),
            move_gate: Mutex::new(None),
        }
    }

    pub fn fail_on(&self, call: &'static str) {
        self.failing.lock().insert(call);
    }

    pub fn recover(&self) {
        self.failing.lock().clear();
    }

    /// `set_task_status` waits for the gate before touching the store.
    pub fn gate_moves(&self, gate: Arc<Notify>) {
        *self.move_gate.lock() = Some(gate);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn forget_calls(&self) {
        self.calls.lock().clear();
    }

    fn enter(&self, call: &'static str) -> BackendResult<()> {
        self.calls.lock().push(call.to_string());
        if self.failing.lock().contains(call) {
            return Err(BackendError::new("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn list_tasks(&self, project_id: Uuid) -> BackendResult<Vec<Task>> {
        self.enter("list_tasks")?;
        self.inner.list_tasks(project_id).await
    }

    async fn create_task(&self, new: NewTask) -> BackendResult<Task> {
        self.enter("create_task")?;
        self.inner.create_task(new).await
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> BackendResult<Task> {
        self.enter("update_task")?;
        self.inner.update_task(id, patch).await
    }

    async fn delete_task(&self, id: Uuid) -> BackendResult<()> {
        self.enter("delete_task")?;
        self.inner.delete_task(id).await
    }

    async fn set_task_status(&self, id: Uuid, status: &str) -> BackendResult<Task> {
        self.enter("set_task_status")?;
        let gate = self.move_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.set_task_status(id, status).await
    }

    async fn reorder_tasks(&self, order: &[(Uuid, i64)]) -> BackendResult<()> {
        self.enter("reorder_tasks")?;
        self.inner.reorder_tasks(order).await
    }

    async fn list_projects(&self, owner_id: Uuid) -> BackendResult<Vec<Project>> {
        self.enter("list_projects")?;
        self.inner.list_projects(owner_id).await
    }

    async fn get_project(&self, id: Uuid) -> BackendResult<Option<Project>> {
        self.enter("get_project")?;
        self.inner.get_project(id).await
    }

    async fn create_project(&self, owner_id: Uuid, new: NewProject) -> BackendResult<Project> {
        self.enter("create_project")?;
        self.inner.create_project(owner_id, new).await
    }

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> BackendResult<Project> {
        self.enter("update_project")?;
        self.inner.update_project(id, patch).await
    }

    async fn delete_project(&self, id: Uuid) -> BackendResult<()> {
        self.enter("delete_project")?;
        self.inner.delete_project(id).await
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

pub struct Fixture {
    _dir: TempDir,
    pub store: Arc<DataStore>,
    pub backend: Arc<ScriptedBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub session: Session,
}

impl Fixture {
    /// Fresh data directory with a signed-in user.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(DataStore::open(dir.path()).expect("open datastore"));
        store.login("ana").expect("login");
        let backend = Arc::new(ScriptedBackend::new(store.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Session::new(
            backend.clone(),
            store.clone(),
            notifier.clone(),
            BoardSettings::default(),
        );
        Self {
            _dir: dir,
            store,
            backend,
            notifier,
            session,
        }
    }

    /// A default three-column board holding `titles` in "To Do", in that
    /// order.
    pub async fn board_with(&self, titles: &[&str]) -> (Board, Vec<Task>) {
        let project = self
            .session
            .create_project(NewProject::new("Launch"))
            .await
            .expect("create project");
        let board = self
            .session
            .open_board(project.id)
            .await
            .expect("open board");

        let mut tasks = Vec::with_capacity(titles.len());
        for title in titles {
            let task = board
                .create_task(board.draft(*title))
                .await
                .expect("create task");
            tasks.push(task);
        }
        self.backend.forget_calls();
        (board, tasks)
    }
}
