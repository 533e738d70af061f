//! The persisted scoped sync run record.
//!
//! `processing` is the only non-terminal state. `success` and `failed`
//! accept no further transition; a caller wanting another attempt starts a
//! new run.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::CoreError;

use super::operation::OperationLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Processing,
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error descriptor attached to a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunError {
    pub name: String,
    pub message: String,
    pub trace_id: Option<String>,
}

impl SyncRunError {
    pub fn from_core(err: &CoreError, trace_id: Option<String>) -> Self {
        Self {
            name: err.name().to_owned(),
            message: err.to_string(),
            trace_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub client_id: String,
    pub connection_id: String,
    pub status: SyncStatus,
    /// External account ids the run was restricted to. Empty means the
    /// adapter reconciled the full remote catalog.
    pub requested_accounts: Vec<String>,
    #[serde(default)]
    pub operations: OperationLog,
    pub error: Option<SyncRunError>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub completed_at: Option<OffsetDateTime>,
}

impl SyncRun {
    pub fn processing(
        client_id: impl Into<String>,
        connection_id: impl Into<String>,
        requested_accounts: Vec<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: client_id.into(),
            connection_id: connection_id.into(),
            status: SyncStatus::Processing,
            requested_accounts,
            operations: OperationLog::default(),
            error: None,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        }
    }

    pub fn succeed(&mut self, operations: OperationLog) -> Result<(), CoreError> {
        self.transition(SyncStatus::Success)?;
        self.operations = operations;
        Ok(())
    }

    /// Mark the run failed. Operations already recorded stay on the record.
    pub fn fail(&mut self, error: SyncRunError) -> Result<(), CoreError> {
        self.transition(SyncStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    fn transition(&mut self, to: SyncStatus) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        self.completed_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_processing() {
        let run = SyncRun::processing("client-1", "conn-1", vec!["wallet-1".into()]);
        assert_eq!(run.status, SyncStatus::Processing);
        assert!(run.completed_at.is_none());
        assert!(run.error.is_none());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut run = SyncRun::processing("client-1", "conn-1", Vec::new());
        run.succeed(OperationLog::default()).unwrap();
        assert_eq!(run.status, SyncStatus::Success);
        assert!(run.completed_at.is_some());

        let err = run
            .fail(SyncRunError {
                name: "ProviderError".into(),
                message: "late failure".into(),
                trace_id: None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: "success",
                to: "failed"
            }
        ));
        assert_eq!(run.status, SyncStatus::Success);
        assert!(run.error.is_none());
    }

    #[test]
    fn failure_captures_error_descriptor() {
        let mut run = SyncRun::processing("client-1", "conn-1", Vec::new());
        let cause = CoreError::Persistence("write rejected".into());
        run.fail(SyncRunError::from_core(&cause, Some("trace-1".into())))
            .unwrap();

        let error = run.error.as_ref().expect("failed run carries an error");
        assert_eq!(error.name, "PersistenceError");
        assert_eq!(error.message, "persistence failure: write rejected");
        assert_eq!(error.trace_id.as_deref(), Some("trace-1"));
    }

    #[test]
    fn record_serializes_stable_contract() {
        let run = SyncRun::processing("client-1", "conn-1", Vec::new());
        let json = serde_json::to_value(&run).unwrap();
        for field in [
            "id",
            "client_id",
            "connection_id",
            "status",
            "requested_accounts",
            "created_at",
            "completed_at",
            "error",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["status"], "processing");
    }
}
