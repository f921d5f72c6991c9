//! Library root for `lina-bot`.
//!
//! Lina is a VK community chat bot built around a dice-notation engine:
//! - Receives community callback events over a webhook
//! - Normalizes them into typed messages and checks for a bot mention
//! - Fans addressed messages out to independently triggered command handlers
//! - Rolls dice notation (`3d6+2`, `2d20kh`, ...) with keep-high/keep-low
//!
//! The architecture is built around extensible traits that allow for
//! different implementations of each service, and an explicit handler
//! registry constructed once at startup.

#[deny(missing_docs)]
pub mod base;
pub mod dice;
pub mod dispatch;
pub mod handler;
pub mod message;
pub mod runtime;
pub mod server;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Builds the runtime (VK client, handler registry, dispatcher) and serves
/// the webhook until shutdown.
pub async fn start(config: Config) -> Void {
    info!("Starting lina-bot ...");

    let runtime = runtime::Runtime::new(config)?;

    server::serve(runtime).await
}
