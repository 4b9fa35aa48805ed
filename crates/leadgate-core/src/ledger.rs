//! Ledger store abstraction
//!
//! The ledger is one text blob at a fixed path in a remote content store.
//! Reads return a version token; writes must present the token they read and
//! are rejected as a conflict when someone else committed in between.
//!
//! The token is opaque. For the GitHub Contents API it is the blob `sha`; the
//! in-memory store uses a counter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Result;

/// Opaque version of the ledger as last seen by a reader
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(pub String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger content plus the version it was read at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub content: String,

    /// `None` when the ledger does not exist yet
    pub version: Option<VersionToken>,
}

impl LedgerSnapshot {
    /// Snapshot of a ledger that has never been written
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn exists(&self) -> bool {
        self.version.is_some()
    }
}

/// Result of a conditional write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Write accepted, ledger is now at `version`
    Committed { version: VersionToken },
    /// Another writer committed since the supplied version was read
    Conflict,
}

/// Versioned read and compare-and-swap write of the ledger
///
/// Implementations do not retry. A conflict is a normal result, not an error.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current content and version. A missing ledger reads as empty with no version.
    async fn read_ledger(&self) -> Result<LedgerSnapshot>;

    /// Replace the ledger if it is still at `version` (`None`: only if it does not exist)
    ///
    /// `message` describes the change for stores that keep history.
    async fn write_ledger(
        &self,
        content: &str,
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<WriteOutcome>;
}

#[async_trait]
impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    async fn read_ledger(&self) -> Result<LedgerSnapshot> {
        (**self).read_ledger().await
    }

    async fn write_ledger(
        &self,
        content: &str,
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<WriteOutcome> {
        (**self).write_ledger(content, version, message).await
    }
}

/// In-process ledger store with numeric versions
///
/// Same CAS contract as the remote store. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: RwLock<Option<StoredLedger>>,
}

#[derive(Debug, Clone)]
struct StoredLedger {
    content: String,
    version: u64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `content` at version 1
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(Some(StoredLedger {
                content: content.into(),
                version: 1,
            })),
        }
    }

    /// Current content, bypassing the version check
    pub async fn content(&self) -> Option<String> {
        self.state.read().await.as_ref().map(|s| s.content.clone())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn read_ledger(&self) -> Result<LedgerSnapshot> {
        let state = self.state.read().await;
        Ok(match state.as_ref() {
            Some(stored) => LedgerSnapshot {
                content: stored.content.clone(),
                version: Some(VersionToken::new(stored.version.to_string())),
            },
            None => LedgerSnapshot::empty(),
        })
    }

    async fn write_ledger(
        &self,
        content: &str,
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<WriteOutcome> {
        let mut state = self.state.write().await;

        let current = state.as_ref().map(|s| s.version);
        let expected = version.map(|v| v.as_str().parse::<u64>().unwrap_or(0));
        if current != expected {
            tracing::debug!(
                "Memory ledger conflict: expected {:?}, current {:?}",
                expected,
                current
            );
            return Ok(WriteOutcome::Conflict);
        }

        let next = current.map_or(1, |v| v + 1);
        tracing::debug!("Memory ledger at version {}: {}", next, message);
        *state = Some(StoredLedger {
            content: content.to_string(),
            version: next,
        });

        Ok(WriteOutcome::Committed {
            version: VersionToken::new(next.to_string()),
        })
    }
}
