use crate::model::TaskStatus;
use serde::{Deserialize, Serialize};

/// Optional match constraints used to pick tasks for a batch.
///
/// Values are kept as the caller sent them; interpretation (and rejection of
/// malformed values) happens in [`crate::filter::Predicate`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::model::nullable_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl FilterCriteria {
    /// Which slice of the store has to be fetched to evaluate these criteria.
    ///
    /// An unparseable status falls back to `All`; the predicate then rejects
    /// every task on that dimension.
    pub fn status_scope(&self) -> StatusScope {
        match self.status.as_deref().map(str::parse::<TaskStatus>) {
            Some(Ok(status)) => StatusScope::Only(status),
            _ => StatusScope::All,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.status.is_none()
            && self.project.is_none()
            && self.tags.is_empty()
            && self.priority.is_none()
            && self.description_contains.is_none()
            && self.due_before.is_none()
            && self.due_after.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusScope {
    All,
    Only(TaskStatus),
}

impl StatusScope {
    pub fn includes(self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => expected == status,
        }
    }
}
