//! Filter predicate evaluation.
//!
//! Criteria are compiled once into a [`Predicate`] and then applied to each
//! task. Every provided dimension must hold (logical AND). A dimension whose
//! value cannot be interpreted never matches, so a typo in a bulk filter
//! selects nothing instead of everything.

use crate::model::timestamp::parse_timestamp;
use crate::model::{FilterCriteria, Priority, Task, TaskStatus};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq)]
enum Constraint<T> {
    Any,
    Exactly(T),
    Unsatisfiable,
}

impl<T> Constraint<T> {
    fn from_parse<E>(value: Option<Result<T, E>>) -> Self {
        match value {
            None => Self::Any,
            Some(Ok(parsed)) => Self::Exactly(parsed),
            Some(Err(_)) => Self::Unsatisfiable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    status: Constraint<TaskStatus>,
    project: Option<String>,
    tags: Vec<String>,
    /// `Exactly(None)` selects tasks without a priority.
    priority: Constraint<Option<Priority>>,
    description_contains: Option<String>,
    due_before: Constraint<OffsetDateTime>,
    due_after: Constraint<OffsetDateTime>,
}

impl Predicate {
    pub fn compile(criteria: &FilterCriteria) -> Self {
        Self {
            status: Constraint::from_parse(
                criteria.status.as_deref().map(str::parse::<TaskStatus>),
            ),
            project: criteria.project.clone(),
            tags: criteria.tags.clone(),
            priority: Constraint::from_parse(criteria.priority.as_deref().map(parse_priority)),
            description_contains: criteria.description_contains.clone(),
            due_before: Constraint::from_parse(criteria.due_before.as_deref().map(parse_timestamp)),
            due_after: Constraint::from_parse(criteria.due_after.as_deref().map(parse_timestamp)),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status_matches(task)
            && self.project_matches(task)
            && self.tags_match(task)
            && self.priority_matches(task)
            && self.description_matches(task)
            && self.due_matches(task)
    }

    fn status_matches(&self, task: &Task) -> bool {
        match &self.status {
            Constraint::Any => true,
            Constraint::Exactly(status) => task.status == *status,
            Constraint::Unsatisfiable => false,
        }
    }

    fn project_matches(&self, task: &Task) -> bool {
        match self.project.as_deref() {
            None => true,
            Some(project) => task.project.as_deref() == Some(project),
        }
    }

    fn tags_match(&self, task: &Task) -> bool {
        self.tags.is_empty() || self.tags.iter().any(|tag| task.tags.contains(tag))
    }

    fn priority_matches(&self, task: &Task) -> bool {
        match &self.priority {
            Constraint::Any => true,
            Constraint::Exactly(priority) => task.priority == *priority,
            Constraint::Unsatisfiable => false,
        }
    }

    fn description_matches(&self, task: &Task) -> bool {
        match self.description_contains.as_deref() {
            None => true,
            Some(needle) => task.description.contains(needle),
        }
    }

    fn due_matches(&self, task: &Task) -> bool {
        if matches!(self.due_before, Constraint::Any) && matches!(self.due_after, Constraint::Any)
        {
            return true;
        }

        let due = match task.due.as_deref().map(parse_timestamp) {
            Some(Ok(due)) => due,
            _ => return false,
        };

        let before = match &self.due_before {
            Constraint::Any => true,
            Constraint::Exactly(bound) => due < *bound,
            Constraint::Unsatisfiable => false,
        };
        let after = match &self.due_after {
            Constraint::Any => true,
            Constraint::Exactly(bound) => due > *bound,
            Constraint::Unsatisfiable => false,
        };

        before && after
    }
}

fn parse_priority(value: &str) -> Result<Option<Priority>, crate::error::AppError> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value.parse::<Priority>().map(Some)
}

pub fn matches(task: &Task, criteria: &FilterCriteria) -> bool {
    Predicate::compile(criteria).matches(task)
}

/// Keeps the tasks matching `criteria`, in input order, capped at
/// `criteria.limit`.
pub fn select(tasks: Vec<Task>, criteria: &FilterCriteria) -> Vec<Task> {
    let predicate = Predicate::compile(criteria);
    let limit = criteria.limit.unwrap_or(usize::MAX);
    tasks
        .into_iter()
        .filter(|task| predicate.matches(task))
        .take(limit)
        .collect()
}
