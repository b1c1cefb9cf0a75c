use crate::batch::{ModifyFields, Mutation, MutationKind};
use crate::error::AppError;
use crate::model::FilterCriteria;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Task identifier as it arrives in a request: a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TaskIdentifier {
    Number(u64),
    Text(String),
}

impl fmt::Display for TaskIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Which tasks a batch targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    Ids {
        identifiers: Vec<String>,
        /// Optional uuid per integer id, tried before the id itself.
        uuid_hints: HashMap<String, String>,
    },
    Filter(FilterCriteria),
}

impl TargetSpec {
    pub fn ids<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
            uuid_hints: HashMap::new(),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Ids { .. } => "ids",
            Self::Filter(_) => "filter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchRequest {
    #[serde(rename = "mutationKind", alias = "mutation_kind", alias = "mutation")]
    pub mutation_kind: MutationKind,
    #[serde(default)]
    pub task_ids: Option<Vec<TaskIdentifier>>,
    #[serde(default)]
    pub task_uuids: Option<HashMap<String, String>>,
    #[serde(default)]
    pub filters: Option<FilterCriteria>,
    #[serde(default, rename = "modifyFields", alias = "modify_fields")]
    pub modify_fields: Option<ModifyFields>,
}

impl BatchRequest {
    pub fn new(mutation_kind: MutationKind) -> Self {
        Self {
            mutation_kind,
            task_ids: None,
            task_uuids: None,
            filters: None,
            modify_fields: None,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|err| AppError::invalid_input(format!("malformed batch request: {err}")))
    }

    /// Validates the request shape and splits it into what to do and to whom.
    pub fn into_parts(self) -> Result<(Mutation, TargetSpec), AppError> {
        let target = match (self.task_ids, self.filters) {
            (Some(_), Some(_)) => {
                return Err(AppError::invalid_input(
                    "provide either task_ids or filters, not both",
                ));
            }
            (None, None) => {
                return Err(AppError::invalid_input(
                    "either task_ids or filters must be provided",
                ));
            }
            (Some(ids), None) => TargetSpec::Ids {
                identifiers: ids.iter().map(ToString::to_string).collect(),
                uuid_hints: self.task_uuids.unwrap_or_default(),
            },
            (None, Some(filters)) => TargetSpec::Filter(filters),
        };

        let fields = self.modify_fields.unwrap_or_default();
        let mutation = match self.mutation_kind {
            MutationKind::Modify if fields.is_empty() => {
                return Err(AppError::invalid_input(
                    "modify requires at least one field to change",
                ));
            }
            MutationKind::Modify => Mutation::Modify(fields),
            kind if !fields.is_empty() => {
                return Err(AppError::invalid_input(format!(
                    "modifyFields cannot be used with {kind}"
                )));
            }
            MutationKind::Complete => Mutation::Complete,
            MutationKind::Uncomplete => Mutation::Uncomplete,
            MutationKind::Delete => Mutation::Delete,
            MutationKind::Start => Mutation::Start,
            MutationKind::Stop => Mutation::Stop,
        };

        Ok((mutation, target))
    }
}
