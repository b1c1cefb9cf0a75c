//! Batch operation engine.
//!
//! One invocation resolves its targets, applies a single mutation to each of
//! them in order and records the outcome per target. A failing target never
//! stops the rest of the batch; only a store that cannot be reached while
//! resolving targets aborts the whole call.

mod ledger;
mod mutation;
mod request;

pub use ledger::{BatchLedger, Counts, LedgerEntry, Outcome};
pub use mutation::{FieldUpdate, ModifyFields, Mutation, MutationKind};
pub use request::{BatchRequest, TargetSpec, TaskIdentifier};

use crate::error::AppError;
use crate::filter;
use crate::model::{FilterCriteria, Task, TaskStatus};
use crate::storage::{TaskGateway, TaskRef};
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tracing::{debug, info, info_span, warn};

const NOT_FOUND: &str = "task not found";
const ID_CAVEAT: &str = "integer ids are not stable for non-pending tasks; target by uuid instead";

struct Target {
    identifier: String,
    resolved: Result<Task, String>,
    warning: Option<String>,
}

pub struct BatchEngine<'a> {
    gateway: &'a dyn TaskGateway,
}

impl<'a> BatchEngine<'a> {
    pub fn new(gateway: &'a dyn TaskGateway) -> Self {
        Self { gateway }
    }

    pub fn execute_batch(
        &self,
        mutation: &Mutation,
        target: &TargetSpec,
    ) -> Result<BatchLedger, AppError> {
        self.execute_batch_at(mutation, target, OffsetDateTime::now_utc())
    }

    /// Same as [`Self::execute_batch`] with an explicit clock for the
    /// timestamps written by the mutation.
    pub fn execute_batch_at(
        &self,
        mutation: &Mutation,
        target: &TargetSpec,
        now: OffsetDateTime,
    ) -> Result<BatchLedger, AppError> {
        let span = info_span!("batch", mutation = %mutation.kind(), mode = target.mode());
        let _guard = span.enter();

        let targets = self.resolve(mutation.kind(), target)?;
        debug!(targets = targets.len(), "targets resolved");

        let ledger = self.apply(mutation, targets, now);
        let counts = ledger.counts();
        info!(
            attempted = counts.attempted,
            succeeded = counts.succeeded,
            failed = counts.failed,
            "batch finished"
        );

        Ok(ledger)
    }

    fn resolve(&self, kind: MutationKind, target: &TargetSpec) -> Result<Vec<Target>, AppError> {
        match target {
            TargetSpec::Ids {
                identifiers,
                uuid_hints,
            } => self.resolve_ids(kind, identifiers, uuid_hints),
            TargetSpec::Filter(criteria) => self.resolve_filter(criteria),
        }
    }

    fn resolve_ids(
        &self,
        kind: MutationKind,
        identifiers: &[String],
        uuid_hints: &HashMap<String, String>,
    ) -> Result<Vec<Target>, AppError> {
        let mut targets = Vec::with_capacity(identifiers.len());
        let mut seen = HashSet::new();

        for raw in identifiers {
            let identifier = raw.trim().to_string();
            let hint = uuid_hints.get(&identifier).map(String::as_str);
            let (resolved, by_integer) = self.lookup(&identifier, hint)?;

            let warning = match &resolved {
                Ok(task) if by_integer && task.status != TaskStatus::Pending => {
                    Some(ID_CAVEAT.to_string())
                }
                _ if by_integer && kind == MutationKind::Uncomplete => Some(ID_CAVEAT.to_string()),
                _ => None,
            };

            if let Ok(task) = &resolved
                && !seen.insert(task.uuid.clone())
            {
                debug!(%identifier, uuid = %task.uuid, "skipping duplicate target");
                continue;
            }

            targets.push(Target {
                identifier,
                resolved,
                warning,
            });
        }

        Ok(targets)
    }

    /// Looks one identifier up. The outer error aborts the batch; the inner
    /// one is a per-target failure. The flag tells whether the task was found
    /// through a bare integer id.
    fn lookup(
        &self,
        identifier: &str,
        uuid_hint: Option<&str>,
    ) -> Result<(Result<Task, String>, bool), AppError> {
        if let Some(hint) = uuid_hint
            && let Ok(reference @ TaskRef::Uuid(_)) = TaskRef::parse(hint)
        {
            match self.gateway.get_by_id(&reference) {
                Ok(Some(task)) => return Ok((Ok(task), false)),
                Ok(None) => debug!(identifier, hint, "uuid hint did not resolve"),
                Err(err) if err.is_unavailable() => return Err(err),
                Err(err) => debug!(identifier, hint, error = %err, "uuid hint lookup failed"),
            }
        }

        let reference = match TaskRef::parse(identifier) {
            Ok(reference) => reference,
            Err(_) => return Ok((Err("invalid task identifier".to_string()), false)),
        };
        let by_integer = matches!(reference, TaskRef::Id(_));

        match self.gateway.get_by_id(&reference) {
            Ok(Some(task)) => Ok((Ok(task), by_integer)),
            Ok(None) => Ok((Err(NOT_FOUND.to_string()), by_integer)),
            Err(err) if err.is_unavailable() => Err(err),
            Err(err) => Ok((Err(err.message().to_string()), by_integer)),
        }
    }

    fn resolve_filter(&self, criteria: &FilterCriteria) -> Result<Vec<Target>, AppError> {
        let candidates = self.gateway.get_all(criteria.status_scope())?;
        let total = candidates.len();
        let selected = filter::select(candidates, criteria);
        debug!(candidates = total, selected = selected.len(), limit = ?criteria.limit, "filter evaluated");

        Ok(selected
            .into_iter()
            .map(|task| Target {
                identifier: task.label(),
                resolved: Ok(task),
                warning: None,
            })
            .collect())
    }

    fn apply(&self, mutation: &Mutation, targets: Vec<Target>, now: OffsetDateTime) -> BatchLedger {
        let kind = mutation.kind();
        let mut ledger = BatchLedger::new(kind);

        for target in targets {
            let task = match target.resolved {
                Ok(task) => task,
                Err(reason) => {
                    warn!(identifier = %target.identifier, %reason, "target not resolved");
                    ledger.record_failure(target.identifier, None, reason, target.warning);
                    continue;
                }
            };

            let result = mutation
                .apply(&task, now)
                .and_then(|updated| self.gateway.save(&updated, kind));

            match result {
                Ok(saved) => {
                    debug!(identifier = %target.identifier, uuid = %saved.uuid, "mutation applied");
                    ledger.record_success(target.identifier, Some(saved.uuid), target.warning);
                }
                Err(err) => {
                    warn!(identifier = %target.identifier, uuid = %task.uuid, error = %err, "mutation failed");
                    ledger.record_failure(
                        target.identifier,
                        Some(task.uuid),
                        err.message().to_string(),
                        target.warning,
                    );
                }
            }
        }

        ledger
    }
}
