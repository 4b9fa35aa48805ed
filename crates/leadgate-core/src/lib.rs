//! Leadgate Core - email-gated dispatch idempotency ledger
//!
//! Lets each email address trigger the downstream lead-scraping automation
//! at most once. Admitted addresses are recorded in a plain-text ledger kept
//! in a GitHub repository and updated with a version-checked
//! read-modify-write.
//!
//! # Architecture
//!
//! ```text
//!            IntakeRequest
//!                  │
//!       ┌──────────▼──────────┐
//!       │  IntakeCoordinator  │
//!       └──┬───────┬───────┬──┘
//!          │       │       │
//!   ┌──────▼─┐ ┌───▼────┐ ┌▼──────────────┐
//!   │ Ledger │ │Member- │ │   Dispatch    │
//!   │ Store  │ │ ship   │ │   Trigger     │
//!   └──────┬─┘ └────────┘ └┬──────────────┘
//!          │               │
//!       ┌──▼───────────────▼──┐
//!       │    GitHubClient     │  Contents API + repository_dispatch
//!       └─────────────────────┘
//! ```

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod github;
pub mod ledger;
pub mod membership;

pub use config::{Credential, IntakeConfig};
pub use coordinator::{
    CommitStatus, IntakeCoordinator, IntakeOutcome, IntakeReport, IntakeRequest, IntakeStage,
};
pub use dispatch::{DispatchTrigger, NoopDispatcher, Payload};
pub use error::{IntakeError, Result, UpstreamFailure};
pub use github::GitHubClient;
pub use ledger::{LedgerSnapshot, LedgerStore, MemoryLedgerStore, VersionToken, WriteOutcome};
pub use membership::Identifier;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
