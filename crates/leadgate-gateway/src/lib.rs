//! Leadgate Gateway - HTTP intake for the dispatch ledger
//!
//! Exposes the intake coordinator from `leadgate-core` as a small JSON API
//! consumed by the lead-scanner web form.
//!
//! # Endpoints
//!
//! ```text
//! POST /intake   {email, ...fields}  ->  200 Success | 403 LIMIT_REACHED
//!                                        400 | 405 | 413 | 500 | 502 | 504
//! GET  /health
//! GET  /status   version, uptime, intake counters
//! ```
//!
//! Ledger write conflicts after a successful dispatch never change the
//! response; they show up in the logs and in the `/status` counters.

pub mod config;
pub mod error;
pub mod gateway;
pub mod stats;

pub use config::GatewayConfig;
pub use error::{GatewayError, MessageBody, Result};
pub use gateway::{Gateway, GatewayState, LIMIT_REACHED_MESSAGE, SUCCESS_MESSAGE};
pub use stats::{IntakeStats, IntakeStatsSnapshot};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8787;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";
