use crate::error::AppError;
use crate::model::timestamp::{format_timestamp, normalize_timestamp};
use crate::model::{Priority, Task, TaskStatus, nullable_vec};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Complete,
    Uncomplete,
    Delete,
    Start,
    Stop,
    Modify,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Uncomplete => "uncomplete",
            Self::Delete => "delete",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Modify => "modify",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one optional field should change.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    #[default]
    Keep,
    Clear,
    Set(String),
}

impl FieldUpdate {
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            None => Self::Clear,
            Some(value) if value.trim().is_empty() => Self::Clear,
            Some(value) => Self::Set(value),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

// A missing field stays `Keep` through `#[serde(default)]`; a present one is
// either `null`/`""` (clear) or a value.
impl<'de> Deserialize<'de> for FieldUpdate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_option(Option::<String>::deserialize(deserializer)?))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ModifyFields {
    #[serde(default)]
    pub project: FieldUpdate,
    #[serde(default)]
    pub priority: FieldUpdate,
    #[serde(default)]
    pub due: FieldUpdate,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub add_tags: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub remove_tags: Vec<String>,
}

impl ModifyFields {
    pub fn is_empty(&self) -> bool {
        self.project.is_keep()
            && self.priority.is_keep()
            && self.due.is_keep()
            && self.add_tags.is_empty()
            && self.remove_tags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Complete,
    Uncomplete,
    Delete,
    Start,
    Stop,
    Modify(ModifyFields),
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Complete => MutationKind::Complete,
            Self::Uncomplete => MutationKind::Uncomplete,
            Self::Delete => MutationKind::Delete,
            Self::Start => MutationKind::Start,
            Self::Stop => MutationKind::Stop,
            Self::Modify(_) => MutationKind::Modify,
        }
    }

    /// Builds the record that should be saved for `task`.
    ///
    /// Only local preconditions are checked here (well-formed modify values,
    /// uncomplete on a completed task). Status transition rules belong to the
    /// store and are enforced by the gateway on save.
    pub fn apply(&self, task: &Task, now: OffsetDateTime) -> Result<Task, AppError> {
        let stamp = format_timestamp(now)?;
        let mut updated = task.clone();

        match self {
            Self::Complete => {
                updated.status = TaskStatus::Completed;
                updated.end = Some(stamp.clone());
                updated.start = None;
            }
            Self::Uncomplete => {
                if task.status != TaskStatus::Completed {
                    return Err(AppError::invalid_input(format!(
                        "task is not completed (current status: {})",
                        task.status
                    )));
                }
                updated.status = TaskStatus::Pending;
                updated.end = None;
            }
            Self::Delete => {
                updated.status = TaskStatus::Deleted;
                updated.end = Some(stamp.clone());
                updated.start = None;
            }
            Self::Start => {
                updated.start = Some(stamp.clone());
            }
            Self::Stop => {
                updated.start = None;
            }
            Self::Modify(fields) => apply_fields(&mut updated, fields)?,
        }

        updated.modified = Some(stamp);
        Ok(updated)
    }
}

fn apply_fields(task: &mut Task, fields: &ModifyFields) -> Result<(), AppError> {
    match &fields.project {
        FieldUpdate::Keep => {}
        FieldUpdate::Clear => task.project = None,
        FieldUpdate::Set(project) => task.project = Some(project.trim().to_string()),
    }

    match &fields.priority {
        FieldUpdate::Keep => {}
        FieldUpdate::Clear => task.priority = None,
        FieldUpdate::Set(priority) if priority.trim().eq_ignore_ascii_case("none") => {
            task.priority = None
        }
        FieldUpdate::Set(priority) => task.priority = Some(priority.trim().parse::<Priority>()?),
    }

    match &fields.due {
        FieldUpdate::Keep => {}
        FieldUpdate::Clear => task.due = None,
        FieldUpdate::Set(due) => {
            let normalized = normalize_timestamp(due)
                .map_err(|_| AppError::invalid_input(format!("due '{due}' is not a valid timestamp")))?;
            task.due = Some(normalized);
        }
    }

    for tag in &fields.add_tags {
        validate_tag(tag)?;
        task.tags.insert(tag.clone());
    }
    for tag in &fields.remove_tags {
        task.tags.remove(tag);
    }

    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), AppError> {
    if tag.is_empty() {
        return Err(AppError::invalid_input("tag must not be empty"));
    }
    if tag.chars().any(char::is_whitespace) {
        return Err(AppError::invalid_input(format!(
            "tag '{tag}' must not contain whitespace"
        )));
    }
    Ok(())
}
