use crate::batch::MutationKind;
use crate::config::{Backend, Config};
use crate::error::AppError;
use crate::model::{StatusScope, Task, TaskStatus};
use std::fmt;
use uuid::Uuid;

pub mod json_store;
pub mod taskwarrior;

/// How a caller points at one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    /// Working-set number. Only reliable while the task is pending.
    Id(u32),
    Uuid(String),
}

impl TaskRef {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }

        if trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return trimmed
                .parse::<u32>()
                .map(Self::Id)
                .map_err(|_| AppError::invalid_input(format!("id '{trimmed}' is out of range")));
        }

        Uuid::try_parse(trimmed)
            .map(|uuid| Self::Uuid(uuid.hyphenated().to_string()))
            .map_err(|_| AppError::invalid_input(format!("invalid task identifier '{trimmed}'")))
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::Id(id) => task.id == Some(*id),
            Self::Uuid(uuid) => task.uuid.eq_ignore_ascii_case(uuid),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Uuid(uuid) => f.write_str(uuid),
        }
    }
}

/// Boundary to the task store.
///
/// Implementations convert whatever the store speaks into [`Task`] records.
/// A store that cannot be reached at all reports [`AppError::Unavailable`].
pub trait TaskGateway {
    fn get_by_id(&self, target: &TaskRef) -> Result<Option<Task>, AppError>;

    fn get_all(&self, scope: StatusScope) -> Result<Vec<Task>, AppError>;

    /// Persists `task`, which already carries the effect of `mutation`.
    /// Returns the record as stored, or [`AppError::Rejected`] when the store
    /// refuses the transition.
    fn save(&self, task: &Task, mutation: MutationKind) -> Result<Task, AppError>;

    /// Permanently removes deleted tasks and returns how many were removed.
    fn purge(&self) -> Result<usize, AppError>;
}

/// Transition rules of the underlying store, checked against the record as
/// it was stored before the write.
pub fn check_transition(stored: &Task, mutation: MutationKind) -> Result<(), AppError> {
    match (mutation, stored.status) {
        (MutationKind::Complete, TaskStatus::Completed) => {
            Err(AppError::rejected("task is already completed"))
        }
        (MutationKind::Complete, TaskStatus::Deleted) => {
            Err(AppError::rejected("deleted task cannot be completed"))
        }
        (MutationKind::Delete, TaskStatus::Deleted) => {
            Err(AppError::rejected("task is already deleted"))
        }
        (MutationKind::Start, TaskStatus::Completed) => {
            Err(AppError::rejected("completed task cannot be started"))
        }
        (MutationKind::Start, TaskStatus::Deleted) => {
            Err(AppError::rejected("deleted task cannot be started"))
        }
        (MutationKind::Start, _) if stored.is_active() => {
            Err(AppError::rejected("task is already active"))
        }
        (MutationKind::Stop, _) if !stored.is_active() => {
            Err(AppError::rejected("task is not active"))
        }
        _ => Ok(()),
    }
}

pub fn open_gateway(config: &Config) -> Result<Box<dyn TaskGateway>, AppError> {
    match config.backend()? {
        Backend::Json => {
            let path = match config.store_path.as_deref() {
                Some(path) => path.into(),
                None => json_store::store_path()?,
            };
            Ok(Box::new(json_store::JsonStore::new(path)))
        }
        Backend::Taskwarrior => Ok(Box::new(taskwarrior::TaskwarriorCli::new(
            config.task_command.as_deref().unwrap_or(taskwarrior::DEFAULT_COMMAND),
        ))),
    }
}
