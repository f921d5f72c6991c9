//! Word-triggered handlers: greeting, help, random choice, and the
//! conversation-member picker.

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::{
    base::{
        config::Config,
        types::{HandlerError, Reply},
    },
    handler::MessageHandler,
    message::NewMessage,
    service::vk::VkClient,
};

/// Greets the sender, with a warmer answer for the admin and configured
/// friends.
pub struct GreetingHandler {
    admin_id: i64,
    friends: Vec<i64>,
}

impl GreetingHandler {
    pub fn new(config: &Config) -> Self {
        Self {
            admin_id: config.admin_id,
            friends: config.friends.clone(),
        }
    }
}

#[async_trait]
impl MessageHandler for GreetingHandler {
    fn name(&self) -> &'static str {
        "greeting"
    }

    fn triggers(&self) -> &[&str] {
        &["hello", "привет"]
    }

    async fn produce(&self, message: &NewMessage) -> Result<Reply, HandlerError> {
        let text = if message.from_id == self.admin_id {
            "hello, master! always at your service.".to_string()
        } else if self.friends.contains(&message.from_id) {
            "hello, friend!".to_string()
        } else {
            "hello!".to_string()
        };

        Ok(Reply::Text(text))
    }
}

/// Lists the commands; a multi-part reply delivered with pacing.
pub struct HelpHandler;

#[async_trait]
impl MessageHandler for HelpHandler {
    fn name(&self) -> &'static str {
        "help"
    }

    fn triggers(&self) -> &[&str] {
        &["help", "помощь"]
    }

    async fn produce(&self, _message: &NewMessage) -> Result<Reply, HandlerError> {
        Ok(Reply::Parts(vec![
            "i can roll dice: mention me with notation like 2d6+1, d20, 4d6kh3.".to_string(),
            "i can choose for you: \"choose tea, coffee or sleep\".".to_string(),
            "ask \"who ...\" in a group chat and i will name someone.".to_string(),
        ]))
    }
}

/// Picks one of the comma- or `or`-separated alternatives after the trigger.
pub struct ChooseHandler;

impl ChooseHandler {
    fn alternatives(raw_text: &str) -> Vec<&str> {
        let Some(pos) = raw_text.find("choose") else {
            return Vec::new();
        };

        raw_text[pos + "choose".len()..]
            .split(',')
            .flat_map(|part| part.split(" or "))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    }
}

#[async_trait]
impl MessageHandler for ChooseHandler {
    fn name(&self) -> &'static str {
        "choose"
    }

    fn triggers(&self) -> &[&str] {
        &["choose"]
    }

    async fn produce(&self, message: &NewMessage) -> Result<Reply, HandlerError> {
        let raw_text = message.raw_text.as_deref().unwrap_or_default();
        let alternatives = Self::alternatives(raw_text);

        if alternatives.len() < 2 {
            return Err(HandlerError::Fallback(format!("nothing to choose between in {raw_text:?}")));
        }

        let pick = alternatives[rand::rng().random_range(0..alternatives.len())];
        Ok(Reply::Text(format!("i choose {pick}!")))
    }
}

/// Names a random member of a group conversation.
///
/// Fetching the member list needs conversation admin rights; when VK refuses
/// with code 917 the dispatcher suppresses the handler silently.
pub struct WhoHandler {
    peer_id_threshold: i64,
    vk: VkClient,
}

impl WhoHandler {
    pub fn new(config: &Config, vk: VkClient) -> Self {
        Self {
            peer_id_threshold: config.peer_id_threshold,
            vk,
        }
    }
}

#[async_trait]
impl MessageHandler for WhoHandler {
    fn name(&self) -> &'static str {
        "who"
    }

    fn triggers(&self) -> &[&str] {
        &["who", "кто"]
    }

    async fn produce(&self, message: &NewMessage) -> Result<Reply, HandlerError> {
        if !message.is_group_chat(self.peer_id_threshold) {
            return Ok(Reply::Text("there are only the two of us here.".to_string()));
        }

        let members = self.vk.get_conversation_members(message.peer_id).await.map_err(HandlerError::from_api)?;

        if members.is_empty() {
            return Err(HandlerError::Fallback("conversation has no members".to_string()));
        }

        let pick = &members[rand::rng().random_range(0..members.len())];
        debug!("Picked member {} of {}", pick.id, members.len());

        Ok(Reply::Text(format!("i think it is {}.", pick.full_name())))
    }
}
