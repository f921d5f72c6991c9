//! reqwest-backed implementation of the VK API client.

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{PlatformError, Res, Void},
};

use super::{GenericVkClient, UserProfile, VkClient};

const API_URL: &str = "https://api.vk.com/method";
const API_VERSION: &str = "5.92";

// Extra methods on `VkClient` applied by the http implementation.

impl VkClient {
    /// Creates the production VK client from configuration.
    pub fn http(config: &Config) -> Self {
        Self::new(std::sync::Arc::new(HttpVkClient::new(config)))
    }
}

/// VK API response envelope: either a `response` payload or an `error`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    response: Option<Value>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error_code: i64,
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct ConversationMembers {
    profiles: Vec<UserProfile>,
}

/// reqwest-based VK client.
pub struct HttpVkClient {
    client: reqwest::Client,
    access_token: String,
}

impl HttpVkClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: config.vk_access_token.clone(),
        }
    }

    /// Calls one VK API method and unwraps the response envelope.
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Res<Value> {
        let url = format!("{API_URL}/{method}");

        let envelope: ApiEnvelope = self
            .client
            .get(&url)
            .query(&[("access_token", self.access_token.as_str()), ("v", API_VERSION)])
            .query(params)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = envelope.error {
            return Err(PlatformError::new(error.error_code, error.error_msg).into());
        }

        envelope.response.ok_or_else(|| anyhow::anyhow!("vk response for {method} had neither response nor error"))
    }

    /// VK deduplicates sends by `random_id`; a fresh draw per call keeps
    /// retried webhook deliveries from being collapsed.
    fn random_id() -> i64 {
        rand::rng().random_range(10_000..=99_999)
    }
}

#[async_trait]
impl GenericVkClient for HttpVkClient {
    #[instrument(skip(self, text))]
    async fn send_message(&self, peer_id: i64, text: &str) -> Void {
        info!("Sending message to peer {peer_id} ...");

        self.call(
            "messages.send",
            &[
                ("peer_id", peer_id.to_string()),
                ("message", text.to_string()),
                ("random_id", Self::random_id().to_string()),
            ],
        )
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_sticker(&self, peer_id: i64, sticker_id: u32) -> Void {
        info!("Sending sticker to peer {peer_id} ...");

        self.call(
            "messages.send",
            &[
                ("peer_id", peer_id.to_string()),
                ("sticker_id", sticker_id.to_string()),
                ("random_id", Self::random_id().to_string()),
            ],
        )
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_conversation_members(&self, peer_id: i64) -> Res<Vec<UserProfile>> {
        let response = self.call("messages.getConversationMembers", &[("peer_id", peer_id.to_string())]).await?;

        let members: ConversationMembers = serde_json::from_value(response)?;
        Ok(members.profiles)
    }
}
