//! Sync run state machine and run log record.
//!
//! A run moves strictly forward through [`RunStage`]; `Failed` is reachable
//! from any non-terminal stage. Non-fatal errors accumulate on the run while
//! it continues.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStage {
    Started,
    CategoriesSynced,
    MembersSynced,
    InterestsSynced,
    PaymentsProcessed,
    ViewsRefreshed,
    Completed,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::CategoriesSynced => "categories-synced",
            Self::MembersSynced => "members-synced",
            Self::InterestsSynced => "interests-synced",
            Self::PaymentsProcessed => "payments-processed",
            Self::ViewsRefreshed => "views-refreshed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// The only stage a successful step may move to.
    pub fn successor(&self) -> Option<RunStage> {
        match self {
            Self::Started => Some(Self::CategoriesSynced),
            Self::CategoriesSynced => Some(Self::MembersSynced),
            Self::MembersSynced => Some(Self::InterestsSynced),
            Self::InterestsSynced => Some(Self::PaymentsProcessed),
            Self::PaymentsProcessed => Some(Self::ViewsRefreshed),
            Self::ViewsRefreshed => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunStateError {
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: RunStage, to: RunStage },

    #[error("run already finished as {0}")]
    Finished(RunStage),
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub categories: usize,
    pub members: usize,
    pub interests_fetched: usize,
    /// Bulk records replaced by the richer multi-payer re-fetch.
    pub interests_replaced: usize,
    /// Top-level records dropped because they are nested under a parent.
    pub interests_nested: usize,
    pub interests_upserted: usize,
    pub payments_extracted: usize,
    pub payments_inserted: usize,
    pub payers_created: usize,
    pub payers_reclassified: usize,
}

/// A non-fatal error, tagged with the table and chunk it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub scope: String,
    pub chunk: Option<usize>,
    pub message: String,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk {
            Some(chunk) => write!(f, "{}[{}]: {}", self.scope, chunk, self.message),
            None => write!(f, "{}: {}", self.scope, self.message),
        }
    }
}

/// One row of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stage: RunStage,
    pub stats: RunStats,
    pub errors: Vec<RunError>,
    /// Set when the run failed.
    pub failure: Option<String>,
}

impl SyncRun {
    pub fn new(id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            completed_at: None,
            stage: RunStage::Started,
            stats: RunStats::default(),
            errors: Vec::new(),
            failure: None,
        }
    }

    /// Move to `next`, which must be the current stage's successor.
    pub fn advance(&mut self, next: RunStage) -> Result<(), RunStateError> {
        if self.stage.is_terminal() {
            return Err(RunStateError::Finished(self.stage));
        }
        if self.stage.successor() != Some(next) {
            return Err(RunStateError::IllegalTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        if next == RunStage::Completed {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark the run failed. Has no effect once the run is terminal.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.stage.is_terminal() {
            return;
        }
        self.stage = RunStage::Failed;
        self.failure = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn record_error(&mut self, scope: &str, chunk: Option<usize>, message: impl Into<String>) {
        self.errors.push(RunError {
            scope: scope.to_string(),
            chunk,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: [RunStage; 6] = [
        RunStage::CategoriesSynced,
        RunStage::MembersSynced,
        RunStage::InterestsSynced,
        RunStage::PaymentsProcessed,
        RunStage::ViewsRefreshed,
        RunStage::Completed,
    ];

    #[test]
    fn walks_the_linear_path() {
        let mut run = SyncRun::new(1, Utc::now());
        for stage in PATH {
            run.advance(stage).unwrap();
        }
        assert_eq!(run.stage, RunStage::Completed);
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut run = SyncRun::new(1, Utc::now());
        let err = run.advance(RunStage::MembersSynced).unwrap_err();
        assert_eq!(
            err,
            RunStateError::IllegalTransition {
                from: RunStage::Started,
                to: RunStage::MembersSynced
            }
        );
        assert_eq!(run.stage, RunStage::Started);
    }

    #[test]
    fn failed_is_reachable_from_any_stage() {
        for (i, _) in PATH.iter().enumerate().take(PATH.len() - 1) {
            let mut run = SyncRun::new(1, Utc::now());
            for stage in &PATH[..i] {
                run.advance(*stage).unwrap();
            }
            run.fail("boom");
            assert_eq!(run.stage, RunStage::Failed);
            assert_eq!(run.failure.as_deref(), Some("boom"));
        }
    }

    #[test]
    fn terminal_runs_do_not_move() {
        let mut run = SyncRun::new(1, Utc::now());
        run.fail("first");
        run.fail("second");
        assert_eq!(run.failure.as_deref(), Some("first"));
        assert_eq!(
            run.advance(RunStage::CategoriesSynced),
            Err(RunStateError::Finished(RunStage::Failed))
        );
    }

    #[test]
    fn errors_accumulate() {
        let mut run = SyncRun::new(1, Utc::now());
        run.record_error("payments", Some(2), "constraint violated");
        run.record_error("views", None, "refresh failed");
        assert_eq!(run.errors.len(), 2);
        assert_eq!(run.errors[0].to_string(), "payments[2]: constraint violated");
        assert_eq!(run.errors[1].to_string(), "views: refresh failed");
    }

    #[test]
    fn stage_serializes_kebab_case() {
        let json = serde_json::to_string(&RunStage::PaymentsProcessed).unwrap();
        assert_eq!(json, "\"payments-processed\"");
    }
}
