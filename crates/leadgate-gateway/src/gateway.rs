//! Main Gateway implementation
//!
//! Serves the intake endpoint in front of the dispatch ledger.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use leadgate_core::{IntakeCoordinator, IntakeError, IntakeOutcome, IntakeRequest};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{message_response, MessageBody};
use crate::stats::IntakeStats;
use crate::{GatewayError, Result};

/// Caller-facing messages, kept identical to what the web form expects
pub const SUCCESS_MESSAGE: &str = "Success";
pub const LIMIT_REACHED_MESSAGE: &str = "LIMIT_REACHED";

/// Gateway state shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,

    /// `None` when no credential resolved; every intake then fails with 500
    pub coordinator: Option<Arc<IntakeCoordinator>>,

    pub stats: Arc<IntakeStats>,
    pub started_at: DateTime<Utc>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl GatewayState {
    /// Resolve the credential from the environment and wire the GitHub-backed coordinator
    ///
    /// A missing credential is not fatal here: the server still starts and
    /// answers intakes with a configuration error, without touching GitHub.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config
            .intake
            .validate()
            .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;

        let coordinator = match config.intake.resolve_credential() {
            Ok(credential) => {
                tracing::info!("Using GitHub credential from {}", credential.source());
                let coordinator = IntakeCoordinator::from_config(&config.intake, credential)
                    .map_err(|e| GatewayError::InvalidConfig(e.to_string()))?;
                Some(Arc::new(coordinator))
            }
            Err(e) => {
                tracing::error!("GitHub token missing, intake disabled: {}", e);
                None
            }
        };

        Ok(Self::with_coordinator(config, coordinator))
    }

    /// State around an already-built coordinator
    pub fn with_coordinator(config: GatewayConfig, coordinator: Option<Arc<IntakeCoordinator>>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            coordinator,
            stats: Arc::new(IntakeStats::new()),
            started_at: Utc::now(),
            shutdown_tx,
        }
    }
}

/// Main Gateway
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a gateway with configuration, resolving the credential from the environment
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Ok(Self::with_state(GatewayState::new(config)?))
    }

    /// Create a gateway around prepared state
    pub fn with_state(state: GatewayState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route(
                "/intake",
                post(Self::handle_intake).fallback(Self::handle_method_not_allowed),
            )
            .route("/health", get(Self::handle_health))
            .route("/status", get(Self::handle_status))
            .layer(DefaultBodyLimit::max(self.state.config.max_body_bytes))
            .layer(CatchPanicLayer::custom(Self::handle_panic))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone());

        if self.state.config.tracing {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Start the gateway server and run until [`Gateway::shutdown`] is called
    pub async fn start(&self) -> Result<()> {
        let mut shutdown_rx = self.state.shutdown_tx.subscribe();
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        tracing::info!("Leadgate gateway starting on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }

    /// Shutdown the gateway
    pub fn shutdown(&self) {
        let _ = self.state.shutdown_tx.send(());
        tracing::info!("Gateway shutdown initiated");
    }

    // HTTP handlers

    async fn handle_health() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "healthy",
            "version": crate::VERSION
        }))
    }

    async fn handle_status(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        let intake = &state.config.intake;

        Json(serde_json::json!({
            "version": crate::VERSION,
            "started_at": state.started_at,
            "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
            "credential_configured": state.coordinator.is_some(),
            "repository": intake.repository(),
            "ledger_path": intake.ledger_path,
            "event_type": intake.event_type,
            "dry_run": intake.dry_run,
            "intake": state.stats.snapshot(),
        }))
    }

    async fn handle_method_not_allowed() -> Response {
        message_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    async fn handle_intake(
        State(state): State<Arc<GatewayState>>,
        body: std::result::Result<Bytes, BytesRejection>,
    ) -> Result<(StatusCode, Json<MessageBody>)> {
        let span = tracing::info_span!("intake", request_id = %Uuid::new_v4());
        Self::process_intake(state, body).instrument(span).await
    }

    async fn process_intake(
        state: Arc<GatewayState>,
        body: std::result::Result<Bytes, BytesRejection>,
    ) -> Result<(StatusCode, Json<MessageBody>)> {
        state.stats.record_request();

        // Checked before the body so a misconfigured server never calls out
        let Some(coordinator) = state.coordinator.clone() else {
            state.stats.record_config_error();
            return Err(GatewayError::CredentialMissing(format!(
                "checked {}",
                state.config.intake.credential_sources.join(", ")
            )));
        };

        let body = match body {
            Ok(body) => body,
            Err(rejection) => {
                state.stats.record_rejection();
                return Err(if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    GatewayError::PayloadTooLarge(state.config.max_body_bytes)
                } else {
                    GatewayError::InvalidRequest(rejection.body_text())
                });
            }
        };

        let result = match Self::parse_request(&state, &body) {
            Ok(request) => coordinator.run(&request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                state.stats.record_report(&report);
                match report.outcome {
                    IntakeOutcome::Admitted { .. } => {
                        Ok((StatusCode::OK, Json(MessageBody::new(SUCCESS_MESSAGE))))
                    }
                    IntakeOutcome::Duplicate => Ok((
                        StatusCode::FORBIDDEN,
                        Json(MessageBody::new(LIMIT_REACHED_MESSAGE)),
                    )),
                }
            }
            Err(e) => {
                state.stats.record_error(&e);
                Err(e.into())
            }
        }
    }

    fn parse_request(state: &GatewayState, body: &[u8]) -> std::result::Result<IntakeRequest, IntakeError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| IntakeError::BadRequest("Request body must be valid JSON".to_string()))?;
        IntakeRequest::from_json(value, &state.config.intake.identifier_field)
    }

    fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
        let detail = if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "unknown panic".to_string()
        };
        tracing::error!("Handler panicked: {}", detail);
        message_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}
