//! Intake configuration and credential resolution

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{IntakeError, Result};

/// Default GitHub REST endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Environment variables consulted for the bearer credential, in order
pub const DEFAULT_CREDENTIAL_SOURCES: &[&str] =
    &["VITE_GITHUB_TOKEN", "GITHUB_TOKEN", "VERCEL_WEBSITE_WEBHOOK"];

/// Where the ledger lives, what gets dispatched, and how long to wait
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// REST API base URL (no trailing slash)
    pub api_base_url: String,

    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Ledger path inside the repository
    pub ledger_path: String,

    /// `event_type` sent with each dispatch
    pub event_type: String,

    /// Body field holding the gating identifier
    pub identifier_field: String,

    /// Environment variables checked for the credential, first non-empty wins
    pub credential_sources: Vec<String>,

    /// Whole-request timeout for outbound calls
    pub request_timeout_secs: u64,

    /// Connect timeout for outbound calls
    pub connect_timeout_secs: u64,

    /// Largest ledger the client will read or write
    pub max_ledger_bytes: usize,

    /// Log dispatches instead of firing them
    pub dry_run: bool,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            owner: "Inovisionn".to_string(),
            repo: "inovsionn-website-onepage".to_string(),
            ledger_path: "agent/used_emails.txt".to_string(),
            event_type: "scrape_leads".to_string(),
            identifier_field: "email".to_string(),
            credential_sources: DEFAULT_CREDENTIAL_SOURCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            max_ledger_bytes: 1024 * 1024, // Contents API ceiling
            dry_run: false,
        }
    }
}

impl IntakeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the repository from an `owner/name` string
    pub fn with_repository(mut self, full_name: &str) -> Result<Self> {
        let (owner, repo) = parse_repository(full_name)?;
        self.owner = owner;
        self.repo = repo;
        Ok(self)
    }

    /// Set the API base URL
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the ledger path
    pub fn with_ledger_path(mut self, path: impl Into<String>) -> Self {
        self.ledger_path = path.into();
        self
    }

    /// Set the dispatch event type
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Enable or disable dry-run dispatch
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// `owner/name`
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check the fields the client cannot work without
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(IntakeError::Config("repository owner and name are required".into()));
        }
        if self.ledger_path.trim().is_empty() {
            return Err(IntakeError::Config("ledger path is required".into()));
        }
        if self.event_type.trim().is_empty() {
            return Err(IntakeError::Config("event type is required".into()));
        }
        if self.identifier_field.is_empty() {
            return Err(IntakeError::Config("identifier field is required".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(IntakeError::Config("request timeout must be positive".into()));
        }
        Ok(())
    }

    /// Resolve the bearer credential from the process environment
    pub fn resolve_credential(&self) -> Result<Credential> {
        Credential::resolve(&self.credential_sources, |name| std::env::var(name).ok())
    }
}

fn parse_repository(full_name: &str) -> Result<(String, String)> {
    match full_name.trim().split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(IntakeError::Config(format!(
            "repository must look like owner/name, got {:?}",
            full_name
        ))),
    }
}

/// Static bearer credential for the store and dispatch API
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    source: String,
}

impl Credential {
    pub fn new(token: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            source: source.into(),
        }
    }

    /// Walk `sources` in order and take the first non-blank value `lookup` returns
    pub fn resolve<F>(sources: &[String], lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        sources
            .iter()
            .find_map(|name| {
                lookup(name)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|token| Self::new(token, name.clone()))
            })
            .ok_or_else(|| {
                IntakeError::Config(format!(
                    "credential missing (checked {})",
                    sources.join(", ")
                ))
            })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Name of the source the token came from
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("source", &self.source)
            .field("token", &"<redacted>")
            .finish()
    }
}
