//! Fan-out of one inbound message to every registered handler.
//!
//! Each handler's trigger check, content production, and delivery run as one
//! sequence under the configured wall-clock timeout. Failures in one handler
//! never abort its siblings, and every failure leaves a log record.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{ADMIN_PERMISSION_REQUIRED, HandlerError, Reply, URI_TOO_LONG, Void},
    },
    handler::MessageHandler,
    message::NewMessage,
    service::vk::VkClient,
};

/// Pacing delay between parts of a multi-part reply, to respect upstream
/// rate limits.
const PART_PACING: Duration = Duration::from_secs(1);

/// How one handler's turn ended. Logged, and asserted on in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler declined the message.
    NotTriggered,
    /// Content was produced and delivered.
    Delivered,
    /// The fallback sticker was delivered instead of content.
    Fallback,
    /// The handler hit a permission wall; nothing was delivered.
    Suppressed,
    /// An unexpected error ended the turn; nothing was delivered.
    Failed,
    /// The timeout elapsed; the fallback sticker was delivered.
    TimedOut,
}

/// Holds the handler registry and fans messages out to it.
pub struct Dispatcher {
    handlers: Vec<Arc<dyn MessageHandler>>,
    vk: VkClient,
    timeout: Duration,
    fallback_sticker_id: u32,
}

impl Dispatcher {
    pub fn new(handlers: Vec<Arc<dyn MessageHandler>>, vk: VkClient, config: &Config) -> Self {
        Self {
            handlers,
            vk,
            timeout: Duration::from_secs(config.handler_timeout_secs),
            fallback_sticker_id: config.fallback_sticker_id,
        }
    }

    /// Runs every handler against the message concurrently. The returned
    /// outcomes are in registry order; execution order is not guaranteed.
    #[instrument(skip_all, fields(peer_id = message.peer_id))]
    pub async fn dispatch(&self, message: &NewMessage) -> Vec<DispatchOutcome> {
        let turns = self.handlers.iter().map(|handler| self.run_handler(handler.as_ref(), message));

        join_all(turns).await
    }

    /// One handler's full turn, bounded by the configured timeout. A timeout
    /// abandons the turn and is answered like a fallback, logged distinctly.
    async fn run_handler(&self, handler: &dyn MessageHandler, message: &NewMessage) -> DispatchOutcome {
        match tokio::time::timeout(self.timeout, self.attempt(handler, message)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Handler {} timed out after {:?}", handler.name(), self.timeout);
                self.send_fallback(message.peer_id).await;
                DispatchOutcome::TimedOut
            }
        }
    }

    async fn attempt(&self, handler: &dyn MessageHandler, message: &NewMessage) -> DispatchOutcome {
        if !handler.is_triggered(message).await {
            return DispatchOutcome::NotTriggered;
        }

        info!("Handler {} triggered by: {}", handler.name(), message.display_content());

        let reply = match handler.produce(message).await {
            Ok(reply) => reply,
            Err(err) => return self.fail_turn(handler, message, err).await,
        };

        if let Err(err) = self.deliver(message.peer_id, &reply).await {
            return self.fail_turn(handler, message, HandlerError::from_api(err)).await;
        }

        DispatchOutcome::Delivered
    }

    /// Translates a handler failure into its externally observable action.
    async fn fail_turn(&self, handler: &dyn MessageHandler, message: &NewMessage, err: HandlerError) -> DispatchOutcome {
        match err {
            HandlerError::Fallback(reason) => {
                info!("Handler {} fell back: {reason}", handler.name());
                self.send_fallback(message.peer_id).await;
                DispatchOutcome::Fallback
            }
            HandlerError::Platform(platform) if platform.code == ADMIN_PERMISSION_REQUIRED => {
                warn!("Handler {} needs conversation admin rights: {platform}", handler.name());
                DispatchOutcome::Suppressed
            }
            HandlerError::Platform(platform) if platform.code == URI_TOO_LONG => {
                info!("Handler {} reply was too long: {platform}", handler.name());
                self.send_fallback(message.peer_id).await;
                DispatchOutcome::Fallback
            }
            HandlerError::Platform(platform) => {
                error!("Handler {} hit a platform error: {platform}", handler.name());
                DispatchOutcome::Failed
            }
            HandlerError::Other(err) => {
                error!("Handler {} failed: {err}", handler.name());
                DispatchOutcome::Failed
            }
        }
    }

    /// Delivers reply content; multi-part replies go out strictly in order
    /// with a pacing delay between parts.
    async fn deliver(&self, peer_id: i64, reply: &Reply) -> Void {
        match reply {
            Reply::Text(text) => self.vk.send_message(peer_id, text).await,
            Reply::Sticker(sticker_id) => self.vk.send_sticker(peer_id, *sticker_id).await,
            Reply::Parts(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(PART_PACING).await;
                    }
                    self.vk.send_message(peer_id, part).await?;
                }
                Ok(())
            }
        }
    }

    /// The degraded answer. A failure here is logged and goes no further.
    async fn send_fallback(&self, peer_id: i64) {
        if let Err(err) = self.vk.send_sticker(peer_id, self.fallback_sticker_id).await {
            error!("Failed to deliver the fallback sticker: {err}");
        }
    }
}
