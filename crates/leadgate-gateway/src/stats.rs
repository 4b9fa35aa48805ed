//! Intake counters reported on `/status`
//!
//! Ledger commit conflicts and failures happen after the caller was already
//! told "Success", so these counters are where they become visible.

use leadgate_core::{CommitStatus, IntakeError, IntakeOutcome, IntakeReport};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared across handlers
#[derive(Debug, Default)]
pub struct IntakeStats {
    requests: AtomicU64,
    admitted: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    config_errors: AtomicU64,
    upstream_failures: AtomicU64,
    commit_conflicts: AtomicU64,
    commit_failures: AtomicU64,
}

/// Point-in-time copy of [`IntakeStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeStatsSnapshot {
    pub requests: u64,
    pub admitted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub config_errors: u64,
    pub upstream_failures: u64,
    pub commit_conflicts: u64,
    pub commit_failures: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl IntakeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        bump(&self.requests);
    }

    /// Request refused before it reached the coordinator
    pub fn record_rejection(&self) {
        bump(&self.rejected);
    }

    pub fn record_config_error(&self) {
        bump(&self.config_errors);
    }

    pub fn record_report(&self, report: &IntakeReport) {
        match &report.outcome {
            IntakeOutcome::Duplicate => bump(&self.duplicates),
            IntakeOutcome::Admitted { commit } => {
                bump(&self.admitted);
                match commit {
                    CommitStatus::Committed { .. } => {}
                    CommitStatus::Conflict => bump(&self.commit_conflicts),
                    CommitStatus::Failed { .. } => bump(&self.commit_failures),
                }
            }
        }
    }

    pub fn record_error(&self, error: &IntakeError) {
        match error {
            IntakeError::BadRequest(_) => bump(&self.rejected),
            IntakeError::Config(_) => bump(&self.config_errors),
            IntakeError::LedgerRead(_) | IntakeError::Dispatch(_) | IntakeError::LedgerWrite(_) => {
                bump(&self.upstream_failures)
            }
        }
    }

    pub fn snapshot(&self) -> IntakeStatsSnapshot {
        IntakeStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            config_errors: self.config_errors.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            commit_conflicts: self.commit_conflicts.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
        }
    }
}
