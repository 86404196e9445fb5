/// Type-safe wrappers and outcome enums shared by the ledger and the worker pool
///
/// Labels are validated at construction time so every log line and report carries
/// a usable identifier.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Label must not be blank")]
    LabelBlank,
}

/// Human-readable identifier for a caller, account holder or job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Create a label, rejecting blank input
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::LabelBlank);
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Label {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Label {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier assigned to every submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a single withdrawal attempt
///
/// None of these are errors: `Rejected` is a business-rule outcome and `Deferred`
/// means the caller found the account busy and went on without waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WithdrawalOutcome {
    /// Amount was debited; carries the balance left afterwards
    Completed { balance: u64 },

    /// Balance check failed; nothing was debited
    Rejected { reason: String },

    /// Guard was held by another caller; no balance check was made
    Deferred { caller: Label },
}

impl WithdrawalOutcome {
    pub fn insufficient_balance() -> Self {
        WithdrawalOutcome::Rejected {
            reason: INSUFFICIENT_BALANCE_REASON.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, WithdrawalOutcome::Completed { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, WithdrawalOutcome::Rejected { .. })
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, WithdrawalOutcome::Deferred { .. })
    }

    /// Short name used as a metrics label and in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            WithdrawalOutcome::Completed { .. } => "completed",
            WithdrawalOutcome::Rejected { .. } => "rejected",
            WithdrawalOutcome::Deferred { .. } => "deferred",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Accepting submissions
    Open,
    /// Submissions refused, queue draining
    Closing,
    /// Every worker has exited and the queue is empty
    Terminated,
}

impl PoolState {
    pub fn accepts_submissions(&self) -> bool {
        matches!(self, PoolState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_trims_whitespace() {
        let label = Label::new("  Papa ").unwrap();
        assert_eq!(label.as_str(), "Papa");
    }

    #[test]
    fn test_label_blank() {
        assert_eq!(Label::new("   "), Err(ValidationError::LabelBlank));
        assert_eq!(Label::new(""), Err(ValidationError::LabelBlank));
    }

    #[test]
    fn test_long_label_accepted() {
        let long_string = "a".repeat(500);
        let label = Label::try_from(long_string.clone()).unwrap();
        assert_eq!(label.as_str(), long_string);
    }

    #[test]
    fn test_label_rejects_blank_on_deserialize() {
        let result: Result<Label, _> = serde_json::from_str("\"  \"");
        assert!(result.is_err());
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_withdrawal_outcome_serialization() {
        let outcome = WithdrawalOutcome::Deferred {
            caller: Label::new("Mummy").unwrap(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"outcome\":\"deferred\""));
        assert!(json.contains("Mummy"));

        let rejected = WithdrawalOutcome::insufficient_balance();
        assert!(rejected.is_rejected());
        assert_eq!(rejected.kind(), "rejected");
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_pool_state_accepts_submissions() {
        assert!(PoolState::Open.accepts_submissions());
        assert!(!PoolState::Closing.accepts_submissions());
        assert!(!PoolState::Terminated.accepts_submissions());
    }
}
