use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendError, BackendResult, Identity};
use crate::columns;
use crate::ordering;
use crate::project::{NewProject, Profile, Project, ProjectPatch};
use crate::task::{DEFAULT_CATEGORY, NewTask, Task, TaskPatch};

/// JSON-lines files under one data directory. Every write replaces the
/// whole file through a temp file, so a failed write leaves the previous
/// contents in place.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub profiles_path: PathBuf,
    pub projects_path: PathBuf,
    pub tasks_path: PathBuf,
    pub session_path: PathBuf,
    write_lock: Mutex<()>,
}

/// Who is signed in and which board they last opened.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let profiles_path = data_dir.join("profiles.data");
        let projects_path = data_dir.join("projects.data");
        let tasks_path = data_dir.join("tasks.data");
        let session_path = data_dir.join("session.data");

        for path in [&profiles_path, &projects_path, &tasks_path, &session_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            projects = %projects_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            profiles_path,
            projects_path,
            tasks_path,
            session_path,
            write_lock: Mutex::new(()),
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save_tasks(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_projects(&self) -> anyhow::Result<Vec<Project>> {
        let mut projects: Vec<Project> =
            load_jsonl(&self.projects_path).context("failed to load projects.data")?;
        for project in &mut projects {
            let repaired = columns::repair_columns(&project.columns);
            if repaired != project.columns {
                warn!(
                    project = %project.id,
                    stored = ?project.columns,
                    repaired = ?repaired,
                    "repairing invalid column list"
                );
                project.columns = repaired;
            }
        }
        Ok(projects)
    }

    #[tracing::instrument(skip(self, projects))]
    pub fn save_projects(&self, projects: &[Project]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.projects_path, projects).context("failed to save projects.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_profiles(&self) -> anyhow::Result<Vec<Profile>> {
        load_jsonl(&self.profiles_path).context("failed to load profiles.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn session(&self) -> anyhow::Result<SessionRecord> {
        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed reading {}", self.session_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(SessionRecord::default());
        }
        serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {}", self.session_path.display()))
    }

    #[tracing::instrument(skip(self))]
    pub fn save_session(&self, session: &SessionRecord) -> anyhow::Result<()> {
        let payload = serde_json::to_string(session)?;
        write_atomic(&self.session_path, payload.as_bytes())
            .with_context(|| format!("failed writing {}", self.session_path.display()))
    }

    /// Signs in as `name`, creating the profile on first use.
    #[tracing::instrument(skip(self))]
    pub fn login(&self, name: &str) -> anyhow::Result<Profile> {
        let name = name.trim();
        if name.is_empty() {
            bail!("profile name is required");
        }

        let _guard = self.write_lock.lock();
        let mut profiles = self.load_profiles()?;
        let profile = match profiles.iter().find(|p| p.name == name) {
            Some(existing) => existing.clone(),
            None => {
                let profile = Profile {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    created_at: Utc::now(),
                };
                profiles.push(profile.clone());
                save_jsonl_atomic(&self.profiles_path, &profiles)
                    .context("failed to save profiles.data")?;
                info!(profile = %profile.id, "created profile");
                profile
            }
        };

        let mut session = self.session()?;
        if session.user_id != Some(profile.id) {
            session.project_id = None;
        }
        session.user_id = Some(profile.id);
        self.save_session(&session)?;
        Ok(profile)
    }

    #[tracing::instrument(skip(self))]
    pub fn logout(&self) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        self.save_session(&SessionRecord::default())
    }

    pub fn current_profile(&self) -> anyhow::Result<Option<Profile>> {
        let Some(user_id) = self.session()?.user_id else {
            return Ok(None);
        };
        Ok(self.load_profiles()?.into_iter().find(|p| p.id == user_id))
    }

    pub fn active_project(&self) -> anyhow::Result<Option<Uuid>> {
        Ok(self.session()?.project_id)
    }

    #[tracing::instrument(skip(self))]
    pub fn set_active_project(&self, project_id: Option<Uuid>) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        let mut session = self.session()?;
        session.project_id = project_id;
        self.save_session(&session)
    }

    fn project(&self, id: Uuid) -> anyhow::Result<Project> {
        self.load_projects()?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow!("project not found: {id}"))
    }

    #[tracing::instrument(skip(self, new), fields(project = %new.project_id))]
    fn insert_task(&self, new: NewTask) -> anyhow::Result<Task> {
        let new = new.normalized()?;
        let _guard = self.write_lock.lock();
        let project = self.project(new.project_id)?;
        let status = match new.status {
            Some(status) => status,
            None => project
                .first_column()
                .map(ToString::to_string)
                .ok_or_else(|| anyhow!("project {} has no columns", project.id))?,
        };
        ensure_column(&project, &status)?;

        let mut tasks = self.load_tasks()?;
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: project.id,
            title: new.title,
            description: new.description,
            order_index: ordering::next_order_index(&tasks, project.id, &status),
            status,
            priority: new.priority,
            tags: new.tags,
            category: new.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            color: new.color,
            created_at: now,
            updated_at: now,
        };
        tasks.push(task.clone());
        self.save_tasks(&tasks)?;

        debug!(task = %task.id, status = %task.status, order = task.order_index, "task created");
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch))]
    fn patch_task(&self, id: Uuid, patch: TaskPatch) -> anyhow::Result<Task> {
        let patch = patch.normalized()?;
        let _guard = self.write_lock.lock();
        let mut tasks = self.load_tasks()?;
        let idx = task_index(&tasks, id)?;

        if let Some(status) = patch.status.as_deref() {
            let project = self.project(tasks[idx].project_id)?;
            ensure_column(&project, status)?;
            if tasks[idx].status != status {
                let order = ordering::next_order_index(&tasks, project.id, status);
                tasks[idx].status = status.to_string();
                tasks[idx].order_index = order;
            }
        }

        patch.apply(&mut tasks[idx], Utc::now());
        let updated = tasks[idx].clone();
        self.save_tasks(&tasks)?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    fn move_task(&self, id: Uuid, status: &str) -> anyhow::Result<Task> {
        let _guard = self.write_lock.lock();
        let mut tasks = self.load_tasks()?;
        let idx = task_index(&tasks, id)?;
        let project = self.project(tasks[idx].project_id)?;
        ensure_column(&project, status)?;

        if tasks[idx].status != status {
            let order = ordering::next_order_index(&tasks, project.id, status);
            let task = &mut tasks[idx];
            debug!(from = %task.status, to = %status, order, "moving task");
            task.status = status.to_string();
            task.order_index = order;
            task.updated_at = Utc::now();
        }

        let moved = tasks[idx].clone();
        self.save_tasks(&tasks)?;
        Ok(moved)
    }

    #[tracing::instrument(skip(self))]
    fn remove_task(&self, id: Uuid) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        let mut tasks = self.load_tasks()?;
        let idx = task_index(&tasks, id)?;
        tasks.remove(idx);
        self.save_tasks(&tasks)
    }

    #[tracing::instrument(skip(self, order), fields(count = order.len()))]
    fn apply_order(&self, order: &[(Uuid, i64)]) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        let mut tasks = self.load_tasks()?;
        let positions: HashMap<Uuid, usize> =
            tasks.iter().enumerate().map(|(idx, t)| (t.id, idx)).collect();

        // Resolve every id before touching anything.
        let mut resolved = Vec::with_capacity(order.len());
        for (id, index) in order {
            let idx = positions
                .get(id)
                .copied()
                .ok_or_else(|| anyhow!("task not found: {id}"))?;
            resolved.push((idx, *index));
        }

        let now = Utc::now();
        for (idx, index) in resolved {
            tasks[idx].order_index = index;
            tasks[idx].updated_at = now;
        }
        self.save_tasks(&tasks)
    }

    #[tracing::instrument(skip(self, new))]
    fn insert_project(&self, owner_id: Uuid, new: NewProject) -> anyhow::Result<Project> {
        let new = new.normalized()?;
        let _guard = self.write_lock.lock();
        let mut projects = self.load_projects()?;
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            owner_id,
            title: new.title,
            description: new.description,
            columns: new.columns.unwrap_or_else(columns::default_columns),
            created_at: now,
            updated_at: now,
        };
        projects.push(project.clone());
        self.save_projects(&projects)?;
        info!(project = %project.id, "project created");
        Ok(project)
    }

    #[tracing::instrument(skip(self, patch))]
    fn patch_project(&self, id: Uuid, patch: ProjectPatch) -> anyhow::Result<Project> {
        let patch = patch.normalized()?;
        let _guard = self.write_lock.lock();
        let mut projects = self.load_projects()?;
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow!("project not found: {id}"))?;

        if let Some(next) = patch.columns.as_deref() {
            let tasks = self.load_tasks()?;
            if let Some(orphan) = tasks
                .iter()
                .find(|t| t.project_id == id && !next.contains(&t.status))
            {
                bail!(
                    "column '{}' still holds task {}",
                    orphan.status,
                    orphan.short_id()
                );
            }
        }

        patch.apply(project, Utc::now());
        let updated = project.clone();
        self.save_projects(&projects)?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    fn remove_project(&self, id: Uuid) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();
        let mut projects = self.load_projects()?;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        if projects.len() == before {
            bail!("project not found: {id}");
        }
        self.save_projects(&projects)?;

        let mut tasks = self.load_tasks()?;
        let tasks_before = tasks.len();
        tasks.retain(|t| t.project_id != id);
        if tasks.len() != tasks_before {
            self.save_tasks(&tasks)?;
        }
        info!(project = %id, tasks_removed = tasks_before - tasks.len(), "project deleted");
        Ok(())
    }
}

#[async_trait]
impl Backend for DataStore {
    async fn list_tasks(&self, project_id: Uuid) -> BackendResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .load_tasks()?
            .into_iter()
            .filter(|t| t.project_id == project_id)
            .collect();
        ordering::sort_for_display(&mut tasks);
        Ok(tasks)
    }

    async fn create_task(&self, new: NewTask) -> BackendResult<Task> {
        Ok(self.insert_task(new)?)
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> BackendResult<Task> {
        Ok(self.patch_task(id, patch)?)
    }

    async fn delete_task(&self, id: Uuid) -> BackendResult<()> {
        Ok(self.remove_task(id)?)
    }

    async fn set_task_status(&self, id: Uuid, status: &str) -> BackendResult<Task> {
        Ok(self.move_task(id, status)?)
    }

    async fn reorder_tasks(&self, order: &[(Uuid, i64)]) -> BackendResult<()> {
        Ok(self.apply_order(order)?)
    }

    async fn list_projects(&self, owner_id: Uuid) -> BackendResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .load_projects()?
            .into_iter()
            .filter(|p| p.owner_id == owner_id)
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(&self, id: Uuid) -> BackendResult<Option<Project>> {
        Ok(self.load_projects()?.into_iter().find(|p| p.id == id))
    }

    async fn create_project(&self, owner_id: Uuid, new: NewProject) -> BackendResult<Project> {
        Ok(self.insert_project(owner_id, new)?)
    }

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> BackendResult<Project> {
        Ok(self.patch_project(id, patch)?)
    }

    async fn delete_project(&self, id: Uuid) -> BackendResult<()> {
        Ok(self.remove_project(id)?)
    }
}

impl Identity for DataStore {
    fn current_user(&self) -> BackendResult<Option<Uuid>> {
        let session = self.session().map_err(BackendError::from)?;
        if let Some(user_id) = session.user_id
            && !self.load_profiles()?.iter().any(|p| p.id == user_id)
        {
            warn!(%user_id, "session points at a missing profile");
            return Ok(None);
        }
        Ok(session.user_id)
    }
}

fn task_index(tasks: &[Task], id: Uuid) -> anyhow::Result<usize> {
    tasks
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| anyhow!("task not found: {id}"))
}

fn ensure_column(project: &Project, status: &str) -> anyhow::Result<()> {
    if project.has_column(status) {
        Ok(())
    } else {
        Err(anyhow!(
            "project '{}' has no column named '{status}'",
            project.title
        ))
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let mut payload = Vec::new();
    for item in items {
        serde_json::to_writer(&mut payload, item)?;
        payload.push(b'\n');
    }
    write_atomic(path, &payload)
}

fn write_atomic(path: &Path, payload: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(payload)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn login_reuses_profile_and_resets_board_on_user_switch() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");

        let ana = store.login("ana").expect("login");
        store.set_active_project(Some(Uuid::new_v4())).expect("set project");
        let again = store.login("ana").expect("login again");
        assert_eq!(ana.id, again.id);
        assert!(store.active_project().expect("session").is_some());

        let bo = store.login("bo").expect("login bo");
        assert_ne!(bo.id, ana.id);
        assert_eq!(store.active_project().expect("session"), None);
        assert_eq!(store.current_user().expect("identity"), Some(bo.id));

        store.logout().expect("logout");
        assert_eq!(store.current_user().expect("identity"), None);
        assert!(store.login("  ").is_err());
    }

    #[test]
    fn reorder_with_unknown_id_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let owner = Uuid::new_v4();
        let project = store
            .insert_project(owner, NewProject::new("Board"))
            .expect("project");
        let a = store
            .insert_task(NewTask::new(project.id, "A"))
            .expect("task a");
        let b = store
            .insert_task(NewTask::new(project.id, "B"))
            .expect("task b");

        let err = store
            .apply_order(&[(b.id, 0), (Uuid::new_v4(), 1), (a.id, 2)])
            .expect_err("unknown id");
        assert!(err.to_string().contains("task not found"));

        let tasks = store.load_tasks().expect("tasks");
        assert_eq!(tasks[0].order_index, 0);
        assert_eq!(tasks[1].order_index, 1);
    }

    #[test]
    fn column_update_refused_while_tasks_reference_it() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let project = store
            .insert_project(Uuid::new_v4(), NewProject::new("Board"))
            .expect("project");
        let mut new = NewTask::new(project.id, "In progress");
        new.status = Some("Doing".to_string());
        store.insert_task(new).expect("task");

        let err = store
            .patch_project(
                project.id,
                ProjectPatch::columns(vec!["To Do".to_string(), "Done".to_string()]),
            )
            .expect_err("column in use");
        assert!(err.to_string().contains("Doing"));
    }

    #[test]
    fn stored_column_list_is_repaired_on_load() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let project = store
            .insert_project(Uuid::new_v4(), NewProject::new("Board"))
            .expect("project");

        let text = fs::read_to_string(&store.projects_path).expect("read projects");
        let broken = text.replace(
            r#""columns":["To Do","Doing","Done"]"#,
            r#""columns":["To Do","To Do","Doing"," ","Done"]"#,
        );
        assert_ne!(broken, text);
        fs::write(&store.projects_path, broken).expect("write projects");

        let loaded = store.project(project.id).expect("load project");
        assert_eq!(loaded.columns, vec!["To Do", "Doing", "Done"]);
    }
}
