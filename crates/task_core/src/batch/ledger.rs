use crate::batch::MutationKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// The identifier as the caller gave it, or the task label for filter targets.
    pub identifier: String,
    pub uuid: Option<String>,
    pub outcome: Outcome,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Per-invocation record of what happened to each target. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLedger {
    pub mutation: MutationKind,
    pub entries: Vec<LedgerEntry>,
}

impl BatchLedger {
    pub fn new(mutation: MutationKind) -> Self {
        Self {
            mutation,
            entries: Vec::new(),
        }
    }

    pub fn record_success(
        &mut self,
        identifier: String,
        uuid: Option<String>,
        warning: Option<String>,
    ) {
        self.entries.push(LedgerEntry {
            identifier,
            uuid,
            outcome: Outcome::Success,
            warning,
        });
    }

    pub fn record_failure(
        &mut self,
        identifier: String,
        uuid: Option<String>,
        reason: String,
        warning: Option<String>,
    ) {
        self.entries.push(LedgerEntry {
            identifier,
            uuid,
            outcome: Outcome::Failure { reason },
            warning,
        });
    }

    pub fn counts(&self) -> Counts {
        let succeeded = self
            .entries
            .iter()
            .filter(|entry| entry.outcome.is_success())
            .count();
        Counts {
            attempted: self.entries.len(),
            succeeded,
            failed: self.entries.len() - succeeded,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&LedgerEntry, &str)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            Outcome::Failure { reason } => Some((entry, reason.as_str())),
            Outcome::Success => None,
        })
    }
}
