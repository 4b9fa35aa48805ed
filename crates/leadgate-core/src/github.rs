//! GitHub client - ledger store and dispatch trigger over the REST API
//!
//! The ledger is a file read and written through the Contents API, whose blob
//! `sha` doubles as the version token: a `PUT` naming a stale `sha` is
//! rejected with `409 Conflict`. Dispatches are `repository_dispatch` events.
//!
//! ```text
//! GET  /repos/{owner}/{repo}/contents/{path}   -> {content: base64, sha}
//! PUT  /repos/{owner}/{repo}/contents/{path}   <- {message, content, sha?}
//! POST /repos/{owner}/{repo}/dispatches        <- {event_type, client_payload}
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::{Credential, IntakeConfig};
use crate::dispatch::{DispatchTrigger, Payload};
use crate::ledger::{LedgerSnapshot, LedgerStore, VersionToken, WriteOutcome};
use crate::{IntakeError, Result, UpstreamFailure};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("leadgate/", env!("CARGO_PKG_VERSION"));

/// Contents API read response (fields we use)
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Contents API create/update request
#[derive(Debug, Serialize)]
struct UpdateContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Contents API create/update response
#[derive(Debug, Deserialize)]
struct UpdateContentsResponse {
    content: CommittedFile,
}

#[derive(Debug, Deserialize)]
struct CommittedFile {
    sha: String,
}

/// Repository dispatch request
#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    event_type: &'a str,
    client_payload: &'a Payload,
}

/// GitHub REST client bound to one repository and ledger path
pub struct GitHubClient {
    /// HTTP client with timeouts applied
    http_client: reqwest::Client,

    /// API base URL
    base_url: String,

    owner: String,
    repo: String,
    ledger_path: String,

    /// Bearer credential
    credential: Credential,

    /// Refuse to read or write ledgers larger than this
    max_ledger_bytes: usize,
}

impl GitHubClient {
    /// Create a client for the repository and ledger named in `config`
    pub fn new(config: &IntakeConfig, credential: Credential) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IntakeError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            ledger_path: config.ledger_path.trim_start_matches('/').to_string(),
            credential,
            max_ledger_bytes: config.max_ledger_bytes,
        })
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, self.owner, self.repo, self.ledger_path
        )
    }

    fn dispatches_url(&self) -> String {
        format!("{}/repos/{}/{}/dispatches", self.base_url, self.owner, self.repo)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(self.credential.token())
            .header(ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    fn decode_content(&self, file: &ContentsResponse) -> std::result::Result<String, String> {
        match file.encoding.as_deref() {
            None | Some("base64") => {}
            // Files past the API's size ceiling come back with encoding "none"
            Some(other) => return Err(format!("unsupported content encoding {:?}", other)),
        }

        // The API wraps base64 at 60 columns
        let compact: String = file
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| format!("invalid base64 content: {}", e))?;

        if bytes.len() > self.max_ledger_bytes {
            return Err(format!(
                "ledger is {} bytes, limit is {}",
                bytes.len(),
                self.max_ledger_bytes
            ));
        }

        String::from_utf8(bytes).map_err(|e| format!("ledger is not valid UTF-8: {}", e))
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("repository", &format!("{}/{}", self.owner, self.repo))
            .field("ledger_path", &self.ledger_path)
            .field("credential", &self.credential)
            .finish()
    }
}

#[async_trait]
impl LedgerStore for GitHubClient {
    async fn read_ledger(&self) -> Result<LedgerSnapshot> {
        let response = self
            .request(Method::GET, self.contents_url())
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| IntakeError::LedgerRead(e.into()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!("Ledger {} not found, treating as empty", self.ledger_path);
            return Ok(LedgerSnapshot::empty());
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("GitHub API error reading ledger: {} - {}", status, error_text);
            return Err(IntakeError::LedgerRead(UpstreamFailure::status(
                status.as_u16(),
                error_text,
            )));
        }

        let file: ContentsResponse = response
            .json()
            .await
            .map_err(|e| IntakeError::LedgerRead(e.into()))?;
        let content = self
            .decode_content(&file)
            .map_err(|detail| IntakeError::LedgerRead(UpstreamFailure::transport(detail)))?;

        tracing::debug!(
            "Read ledger {} at {} ({} bytes)",
            self.ledger_path,
            file.sha,
            content.len()
        );

        Ok(LedgerSnapshot {
            content,
            version: Some(VersionToken::new(file.sha)),
        })
    }

    async fn write_ledger(
        &self,
        content: &str,
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<WriteOutcome> {
        if content.len() > self.max_ledger_bytes {
            return Err(IntakeError::LedgerWrite(UpstreamFailure::transport(format!(
                "ledger would grow to {} bytes, limit is {}",
                content.len(),
                self.max_ledger_bytes
            ))));
        }

        let request = UpdateContentsRequest {
            message,
            content: BASE64.encode(content.as_bytes()),
            sha: version.map(|v| v.as_str()),
        };

        let response = self
            .request(Method::PUT, self.contents_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| IntakeError::LedgerWrite(e.into()))?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let committed: UpdateContentsResponse = response
                    .json()
                    .await
                    .map_err(|e| IntakeError::LedgerWrite(e.into()))?;
                Ok(WriteOutcome::Committed {
                    version: VersionToken::new(committed.content.sha),
                })
            }
            StatusCode::CONFLICT => Ok(WriteOutcome::Conflict),
            // Creating without a sha while the file exists: someone created it first
            StatusCode::UNPROCESSABLE_ENTITY if version.is_none() => Ok(WriteOutcome::Conflict),
            _ => {
                let error_text = response.text().await.unwrap_or_default();
                tracing::error!("GitHub API error writing ledger: {} - {}", status, error_text);
                Err(IntakeError::LedgerWrite(UpstreamFailure::status(
                    status.as_u16(),
                    error_text,
                )))
            }
        }
    }
}

#[async_trait]
impl DispatchTrigger for GitHubClient {
    async fn fire(&self, event_type: &str, payload: &Payload) -> Result<()> {
        let request = DispatchRequest {
            event_type,
            client_payload: payload,
        };

        let response = self
            .request(Method::POST, self.dispatches_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| IntakeError::Dispatch(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("GitHub API error: {} - {}", status, error_text);
            return Err(IntakeError::Dispatch(UpstreamFailure::status(
                status.as_u16(),
                error_text,
            )));
        }

        Ok(())
    }
}
