//! Intake coordinator
//!
//! One pass per inbound request:
//!
//! ```text
//! Start -> LedgerRead -> MembershipCheck -> Rejected (duplicate)
//!                                        -> DispatchFire -> DispatchFailed
//!                                                        -> LedgerAppend -> CommitOk
//!                                                                        -> CommitConflict
//!                                                                        -> CommitFailed
//! ```
//!
//! The dispatch fires before the ledger commit and cannot be rolled back, so
//! the commit is best effort: a conflict or failure there is reported through
//! [`CommitStatus`] and the logs, while the caller still sees `Admitted`.
//!
//! Two concurrent requests for the same new identifier can both pass the
//! membership check before either commits, and both will dispatch. The store's
//! CAS only keeps the ledger itself consistent.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{Credential, IntakeConfig};
use crate::dispatch::{DispatchTrigger, NoopDispatcher, Payload};
use crate::github::GitHubClient;
use crate::ledger::{LedgerStore, VersionToken, WriteOutcome};
use crate::membership::{self, Identifier};
use crate::{IntakeError, Result};

/// Stages of an intake pass, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    Start,
    LedgerRead,
    MembershipCheck,
    Rejected,
    DispatchFire,
    DispatchFailed,
    LedgerAppend,
    CommitOk,
    CommitConflict,
    CommitFailed,
}

impl std::fmt::Display for IntakeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntakeStage::Start => "start",
            IntakeStage::LedgerRead => "ledger_read",
            IntakeStage::MembershipCheck => "membership_check",
            IntakeStage::Rejected => "rejected",
            IntakeStage::DispatchFire => "dispatch_fire",
            IntakeStage::DispatchFailed => "dispatch_failed",
            IntakeStage::LedgerAppend => "ledger_append",
            IntakeStage::CommitOk => "commit_ok",
            IntakeStage::CommitConflict => "commit_conflict",
            IntakeStage::CommitFailed => "commit_failed",
        };
        write!(f, "{}", name)
    }
}

/// Validated intake request
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeRequest {
    /// Gating identifier, as received
    pub identifier: String,

    /// Full request body, forwarded verbatim with the dispatch
    pub payload: Payload,
}

impl IntakeRequest {
    pub fn new(identifier: impl Into<String>, payload: Payload) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
        }
    }

    /// Build from a JSON body, reading the identifier from `identifier_field`
    ///
    /// The body must be an object and the field a non-blank string.
    pub fn from_json(body: Value, identifier_field: &str) -> Result<Self> {
        let payload = match body {
            Value::Object(map) => map,
            _ => {
                return Err(IntakeError::BadRequest(
                    "Request body must be a JSON object".to_string(),
                ))
            }
        };

        let identifier = match payload.get(identifier_field) {
            Some(Value::String(s)) if Identifier::parse(s).is_some() => s.clone(),
            Some(Value::String(s)) => {
                return Err(IntakeError::BadRequest(identifier_problem(identifier_field, s)))
            }
            Some(Value::Null) | None => {
                return Err(IntakeError::BadRequest(format!(
                    "{} is required",
                    capitalize(identifier_field)
                )))
            }
            Some(_) => {
                return Err(IntakeError::BadRequest(format!(
                    "{} must be a string",
                    capitalize(identifier_field)
                )))
            }
        };

        Ok(Self {
            identifier,
            payload,
        })
    }
}

/// Why `raw` is not a usable identifier
fn identifier_problem(field: &str, raw: &str) -> String {
    if raw.trim().is_empty() {
        format!("{} is required", capitalize(field))
    } else {
        format!("{} must be a single line of text", capitalize(field))
    }
}

/// Commit message recorded with the ledger append for `identifier`
pub fn commit_message(identifier: &Identifier) -> String {
    format!("chore: add {} to used emails", identifier)
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What happened to the best-effort ledger commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    Committed { version: VersionToken },
    Conflict,
    Failed { reason: String },
}

impl CommitStatus {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitStatus::Committed { .. })
    }

    pub fn stage(&self) -> IntakeStage {
        match self {
            CommitStatus::Committed { .. } => IntakeStage::CommitOk,
            CommitStatus::Conflict => IntakeStage::CommitConflict,
            CommitStatus::Failed { .. } => IntakeStage::CommitFailed,
        }
    }
}

/// Caller-visible result of a successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Dispatch fired. `commit` says whether the ledger recorded it.
    Admitted { commit: CommitStatus },
    /// Identifier already in the ledger. Nothing fired, nothing written.
    Duplicate,
}

/// Outcome plus the normalized identifier it concerns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeReport {
    pub identifier: String,
    pub outcome: IntakeOutcome,
}

impl IntakeReport {
    pub fn is_admitted(&self) -> bool {
        matches!(self.outcome, IntakeOutcome::Admitted { .. })
    }

    /// Terminal stage reached
    pub fn stage(&self) -> IntakeStage {
        match &self.outcome {
            IntakeOutcome::Admitted { commit } => commit.stage(),
            IntakeOutcome::Duplicate => IntakeStage::Rejected,
        }
    }
}

/// Runs the read, check, fire, commit sequence against a store and trigger
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct IntakeCoordinator {
    ledger: Box<dyn LedgerStore>,
    dispatcher: Box<dyn DispatchTrigger>,
    event_type: String,
}

impl IntakeCoordinator {
    pub fn new(
        ledger: impl LedgerStore + 'static,
        dispatcher: impl DispatchTrigger + 'static,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            ledger: Box::new(ledger),
            dispatcher: Box::new(dispatcher),
            event_type: event_type.into(),
        }
    }

    /// Coordinator backed by the GitHub repository named in `config`
    ///
    /// In dry-run mode the ledger is still read and written but dispatches
    /// are only logged.
    pub fn from_config(config: &IntakeConfig, credential: Credential) -> Result<Self> {
        let client = Arc::new(GitHubClient::new(config, credential)?);
        tracing::info!(
            "Intake ledger: {}:{} (dispatch {}{})",
            config.repository(),
            config.ledger_path,
            config.event_type,
            if config.dry_run { ", dry run" } else { "" }
        );

        Ok(if config.dry_run {
            Self::new(client, NoopDispatcher, config.event_type.clone())
        } else {
            Self::new(client.clone(), client, config.event_type.clone())
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Run one intake pass
    pub async fn run(&self, request: &IntakeRequest) -> Result<IntakeReport> {
        // Start
        let Some(identifier) = Identifier::parse(&request.identifier) else {
            return Err(IntakeError::BadRequest(identifier_problem(
                "identifier",
                &request.identifier,
            )));
        };

        // LedgerRead: fail closed
        let snapshot = self.ledger.read_ledger().await.map_err(|e| {
            tracing::error!("Intake stopped at {}: {}", IntakeStage::LedgerRead, e);
            e
        })?;

        // MembershipCheck
        if membership::is_member(&snapshot.content, identifier.as_str()) {
            tracing::info!("Identifier {} already used, rejecting", identifier);
            return Ok(IntakeReport {
                identifier: identifier.into_string(),
                outcome: IntakeOutcome::Duplicate,
            });
        }

        // DispatchFire: the identifier is only spent once the trigger went out
        if let Err(e) = self.dispatcher.fire(&self.event_type, &request.payload).await {
            tracing::error!("Intake stopped at {}: {}", IntakeStage::DispatchFailed, e);
            return Err(e);
        }
        tracing::info!("Dispatched {} for {}", self.event_type, identifier);

        // LedgerAppend
        let content = membership::append_identifier(&snapshot.content, &identifier);
        let commit = match self
            .ledger
            .write_ledger(&content, snapshot.version.as_ref(), &commit_message(&identifier))
            .await
        {
            Ok(WriteOutcome::Committed { version }) => CommitStatus::Committed { version },
            Ok(WriteOutcome::Conflict) => CommitStatus::Conflict,
            Err(e) => CommitStatus::Failed {
                reason: e.to_string(),
            },
        };

        match &commit {
            CommitStatus::Committed { version } => {
                tracing::info!("Ledger updated with {} at {}", identifier, version);
            }
            CommitStatus::Conflict => {
                tracing::warn!(
                    "Ledger write conflicted after dispatch; {} not recorded",
                    identifier
                );
            }
            CommitStatus::Failed { reason } => {
                tracing::warn!(
                    "Ledger write failed after dispatch; {} not recorded: {}",
                    identifier,
                    reason
                );
            }
        }

        Ok(IntakeReport {
            identifier: identifier.into_string(),
            outcome: IntakeOutcome::Admitted { commit },
        })
    }
}

impl std::fmt::Debug for IntakeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeCoordinator")
            .field("event_type", &self.event_type)
            .finish()
    }
}
