//! Dispatch trigger
//!
//! Fires one external event per call. There is no retry here: a failed fire
//! must reach the caller, who may already have told a user a run is starting.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::Result;

/// Arbitrary JSON object forwarded with a dispatch
pub type Payload = Map<String, Value>;

/// One-shot external event trigger
#[async_trait]
pub trait DispatchTrigger: Send + Sync {
    /// Send `event_type` with `payload` exactly once
    async fn fire(&self, event_type: &str, payload: &Payload) -> Result<()>;
}

#[async_trait]
impl<T: DispatchTrigger + ?Sized> DispatchTrigger for Arc<T> {
    async fn fire(&self, event_type: &str, payload: &Payload) -> Result<()> {
        (**self).fire(event_type, payload).await
    }
}

/// Dispatcher that only logs. Backs dry-run mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

#[async_trait]
impl DispatchTrigger for NoopDispatcher {
    async fn fire(&self, event_type: &str, payload: &Payload) -> Result<()> {
        tracing::info!(
            "Dry run: skipping dispatch of {} ({} payload fields)",
            event_type,
            payload.len()
        );
        Ok(())
    }
}
