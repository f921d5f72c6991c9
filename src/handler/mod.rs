//! Command handlers and the handler registry.
//!
//! Every command conforms to [`MessageHandler`]: a trigger test plus content
//! production. Handlers are constructed once at startup with whatever
//! immutable state they need (configuration, the VK client, a roll source)
//! and collected into a registry the dispatcher fans messages out to. The
//! registry never changes during steady-state operation.

pub mod dice;
pub mod simple;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    base::{
        config::Config,
        types::{HandlerError, Reply},
    },
    dice::RollSource,
    message::NewMessage,
    service::vk::VkClient,
};

/// The capability set every command handler implements.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Stable name for log records.
    fn name(&self) -> &'static str;

    /// Substring triggers consulted by the default `is_triggered`.
    fn triggers(&self) -> &[&str] {
        &[]
    }

    /// True when this handler should answer the message.
    ///
    /// The default matches any trigger phrase as a substring of `raw_text`.
    /// A message whose `raw_text` is unset was not addressed to the bot and
    /// never triggers.
    async fn is_triggered(&self, message: &NewMessage) -> bool {
        let Some(raw_text) = &message.raw_text else {
            return false;
        };

        self.triggers().iter().any(|t| raw_text.contains(t))
    }

    /// Produce reply content for a triggered message.
    async fn produce(&self, message: &NewMessage) -> Result<Reply, HandlerError>;
}

/// Builds the full handler set. Called once at startup; the resulting
/// collection is read-only thereafter.
pub fn registry(config: &Config, vk: VkClient, rolls: Arc<dyn RollSource>) -> Vec<Arc<dyn MessageHandler>> {
    vec![
        Arc::new(dice::DiceHandler::new(rolls)),
        Arc::new(simple::GreetingHandler::new(config)),
        Arc::new(simple::HelpHandler),
        Arc::new(simple::ChooseHandler),
        Arc::new(simple::WhoHandler::new(config, vk)),
    ]
}
