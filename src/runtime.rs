//! Runtime services and the message-routing decision.
//!
//! The runtime classifies each inbound event: confirmation challenges are
//! answered with the configured code, and new messages are checked against
//! the mention pattern. Only messages that address the bot get `raw_text`
//! populated and reach the dispatcher; everything else is dropped silently,
//! which is the expected "not addressed to me" case, not an error.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::{Instrument, debug, info, instrument};

use crate::{
    base::{
        config::Config,
        types::{EventError, Res},
    },
    dice::{CryptoRollSource, RollSource},
    dispatch::Dispatcher,
    handler,
    message::{InboundEvent, NewMessage},
    service::vk::VkClient,
};

/// The webhook response body for a routed new message, regardless of how
/// many handlers fired.
pub const OK_BODY: &str = "ok";

/// Runtime service context that can be shared across the application.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The VK client instance.
    pub vk: VkClient,
    /// The dispatcher holding the handler registry.
    pub dispatcher: Arc<Dispatcher>,
    mention: Regex,
}

impl Runtime {
    /// Create the production runtime.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Res<Self> {
        let vk = VkClient::http(&config);
        Self::with_services(config, vk, Arc::new(CryptoRollSource))
    }

    /// Create a runtime over explicit service implementations. Tests inject
    /// mock clients and scripted roll sources here.
    pub fn with_services(config: Config, vk: VkClient, rolls: Arc<dyn RollSource>) -> Res<Self> {
        let handlers = handler::registry(&config, vk.clone(), rolls);
        let dispatcher = Arc::new(Dispatcher::new(handlers, vk.clone(), &config));
        let mention = mention_pattern(config.group_id, &config.bot_names_lowercase())?;

        Ok(Self { config, vk, dispatcher, mention })
    }

    /// Processes one webhook delivery and returns the required response body.
    ///
    /// Dispatch runs detached; the webhook answer does not wait for handlers.
    #[instrument(skip(self, payload))]
    pub fn handle_callback(&self, type_tag: &str, payload: &Value) -> Result<String, EventError> {
        let event = InboundEvent::normalize(type_tag, payload)?;

        match event {
            InboundEvent::Confirmation => {
                info!("Answering confirmation challenge.");
                Ok(self.config.confirmation_code.clone())
            }
            InboundEvent::NewMessage(message) => {
                self.route_new_message(message);
                Ok(OK_BODY.to_string())
            }
        }
    }

    fn route_new_message(&self, mut message: NewMessage) {
        let Some(raw_text) = strip_mention(&self.mention, &message.text) else {
            debug!("Dropping message that does not address the bot: {message}");
            return;
        };

        message.raw_text = Some(raw_text);
        info!("Accepted message: {message}");

        let dispatcher = self.dispatcher.clone();
        tokio::spawn(
            async move {
                let outcomes = dispatcher.dispatch(&message).await;
                debug!("Dispatch finished: {outcomes:?}");
            }
            .in_current_span(),
        );
    }
}

/// Builds the mention pattern: the `[club<id>|...]` mention token or any
/// configured display name, as a whole word.
pub fn mention_pattern(group_id: u64, names_lowercase: &[String]) -> Res<Regex> {
    let mut alternatives = vec![format!(r"\[club{group_id}\|[^\]]*\]")];
    alternatives.extend(names_lowercase.iter().map(|n| regex::escape(n)));

    let pattern = format!(r"(?:^|\s)({})(?:[\s,.!?:;]|$)", alternatives.join("|"));
    Ok(Regex::new(&pattern)?)
}

/// Returns the text with the first mention token removed, or `None` when the
/// bot was not addressed.
pub fn strip_mention(pattern: &Regex, text: &str) -> Option<String> {
    let token = pattern.captures(text)?.get(1)?;

    let before = text[..token.start()].trim_end();
    let after = text[token.end()..].trim_start().trim_start_matches([',', '.', '!', '?', ':', ';']).trim_start();

    Some(match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (_, true) => before.to_string(),
        _ => format!("{before} {after}"),
    })
}
