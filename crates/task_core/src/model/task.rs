use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub entry: Option<String>,
    pub description: String,
}

/// One task as seen by the batch engine.
///
/// `id` is the store's working-set number and is only stable while the task
/// is pending. Anything that has to survive a status change must use `uuid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<u32>,
    pub uuid: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub wait: Option<String>,
    #[serde(default)]
    pub until: Option<String>,
    #[serde(default)]
    pub urgency: f64,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub depends: BTreeSet<String>,
    #[serde(default)]
    pub recur: Option<String>,
}

impl Task {
    pub fn new<U: Into<String>, D: Into<String>>(uuid: U, description: D) -> Self {
        Self {
            id: None,
            uuid: uuid.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            project: None,
            priority: None,
            tags: BTreeSet::new(),
            entry: None,
            modified: None,
            due: None,
            start: None,
            end: None,
            wait: None,
            until: None,
            urgency: 0.0,
            annotations: Vec::new(),
            depends: BTreeSet::new(),
            recur: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    /// Label used in ledgers and log lines: the working-set id while one
    /// exists, the uuid otherwise.
    pub fn label(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => self.uuid.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
    Waiting,
    Recurring,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
            Self::Waiting => "waiting",
            Self::Recurring => "recurring",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "deleted" => Ok(Self::Deleted),
            "waiting" => Ok(Self::Waiting),
            "recurring" => Ok(Self::Recurring),
            other => Err(AppError::invalid_input(format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    H,
    M,
    L,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::H => "H",
            Self::M => "M",
            Self::L => "L",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "H" => Ok(Self::H),
            "M" => Ok(Self::M),
            "L" => Ok(Self::L),
            other => Err(AppError::invalid_input(format!(
                "priority must be H, M or L, got '{other}'"
            ))),
        }
    }
}
