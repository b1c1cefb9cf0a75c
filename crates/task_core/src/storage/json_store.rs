use crate::batch::MutationKind;
use crate::error::AppError;
use crate::model::{StatusScope, Task, TaskStatus};
use crate::storage::{TaskGateway, TaskRef, check_transition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "tasks.json";
const STORE_ENV_VAR: &str = "TASKBATCH_STORE_PATH";

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    tasks: Vec<Task>,
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("taskbatch").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskbatch")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_tasks(path: &Path) -> Result<Vec<Task>, AppError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredTasks =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    Ok(stored.tasks)
}

pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        tasks: tasks.to_vec(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}

/// Hands out working-set ids the way TaskWarrior does: pending and waiting
/// tasks are numbered from 1 in file order, everything else has none.
fn renumber(tasks: &mut [Task]) {
    let mut next = 1;
    for task in tasks {
        if matches!(task.status, TaskStatus::Pending | TaskStatus::Waiting) {
            task.id = Some(next);
            next += 1;
        } else {
            task.id = None;
        }
    }
}

/// File-backed store holding every task in one JSON document.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl TaskGateway for JsonStore {
    fn get_by_id(&self, target: &TaskRef) -> Result<Option<Task>, AppError> {
        let tasks = load_tasks(&self.path)?;
        Ok(tasks.into_iter().find(|task| target.matches(task)))
    }

    fn get_all(&self, scope: StatusScope) -> Result<Vec<Task>, AppError> {
        let tasks = load_tasks(&self.path)?;
        Ok(tasks
            .into_iter()
            .filter(|task| scope.includes(task.status))
            .collect())
    }

    fn save(&self, task: &Task, mutation: MutationKind) -> Result<Task, AppError> {
        let mut tasks = load_tasks(&self.path)?;
        let index = tasks
            .iter()
            .position(|stored| stored.uuid == task.uuid)
            .ok_or_else(|| AppError::not_found("task not found"))?;

        check_transition(&tasks[index], mutation)?;
        tasks[index] = task.clone();
        renumber(&mut tasks);
        save_tasks(&self.path, &tasks)?;

        Ok(tasks.swap_remove(index))
    }

    fn purge(&self) -> Result<usize, AppError> {
        let mut tasks = load_tasks(&self.path)?;
        let before = tasks.len();
        tasks.retain(|task| task.status != TaskStatus::Deleted);
        let purged = before - tasks.len();

        if purged > 0 {
            renumber(&mut tasks);
            save_tasks(&self.path, &tasks)?;
        }

        Ok(purged)
    }
}
