use crate::batch::{BatchLedger, MutationKind, Outcome};
use serde::Serialize;

/// Caller-facing summary of one batch invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub mutation: MutationKind,
    pub counts: ReportCounts,
    pub results: Vec<ResultItem>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultItem {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl BatchReport {
    pub fn from_ledger(ledger: &BatchLedger) -> Self {
        let counts = ledger.counts();

        let results = ledger
            .entries
            .iter()
            .map(|entry| {
                let (outcome, reason) = match &entry.outcome {
                    Outcome::Success => ("success", None),
                    Outcome::Failure { reason } => ("failure", Some(reason.clone())),
                };
                ResultItem {
                    identifier: entry.identifier.clone(),
                    uuid: entry.uuid.clone(),
                    outcome,
                    reason,
                    warning: entry.warning.clone(),
                }
            })
            .collect();

        let errors = ledger
            .failures()
            .map(|(entry, reason)| format!("task {}: {reason}", entry.identifier))
            .collect();

        Self {
            success: counts.failed == 0,
            mutation: ledger.mutation,
            counts: ReportCounts {
                attempted: counts.attempted,
                succeeded: counts.succeeded,
                failed: counts.failed,
            },
            results,
            errors,
        }
    }

    pub fn to_json(&self) -> Result<String, crate::error::AppError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::BatchReport;
    use crate::batch::{BatchLedger, MutationKind};
    use serde_json::json;

    #[test]
    fn partial_failure_lists_errors_and_is_not_successful() {
        let mut ledger = BatchLedger::new(MutationKind::Complete);
        ledger.record_success("1".to_string(), Some("u-1".to_string()), None);
        ledger.record_success("2".to_string(), Some("u-2".to_string()), None);
        ledger.record_failure("999".to_string(), None, "task not found".to_string(), None);

        let report = BatchReport::from_ledger(&ledger);

        assert!(!report.success);
        assert_eq!(report.counts.attempted, 3);
        assert_eq!(report.counts.failed, 1);
        assert_eq!(report.errors, vec!["task 999: task not found".to_string()]);
    }

    #[test]
    fn empty_ledger_is_a_success() {
        let report = BatchReport::from_ledger(&BatchLedger::new(MutationKind::Delete));

        assert!(report.success);
        assert_eq!(report.counts.attempted, 0);
        assert!(report.results.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn serializes_to_the_documented_shape() {
        let mut ledger = BatchLedger::new(MutationKind::Uncomplete);
        ledger.record_success(
            "4".to_string(),
            Some("u-4".to_string()),
            Some("use uuids".to_string()),
        );
        ledger.record_failure(
            "u-5".to_string(),
            Some("u-5".to_string()),
            "task is not completed (current status: pending)".to_string(),
            None,
        );

        let value = serde_json::to_value(BatchReport::from_ledger(&ledger)).unwrap();

        assert_eq!(
            value,
            json!({
                "success": false,
                "mutation": "uncomplete",
                "counts": {"attempted": 2, "succeeded": 1, "failed": 1},
                "results": [
                    {"identifier": "4", "uuid": "u-4", "outcome": "success", "warning": "use uuids"},
                    {
                        "identifier": "u-5",
                        "uuid": "u-5",
                        "outcome": "failure",
                        "reason": "task is not completed (current status: pending)"
                    }
                ],
                "errors": ["task u-5: task is not completed (current status: pending)"]
            })
        );
    }
}
