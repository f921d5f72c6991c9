//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default per-handler timeout, in seconds.
fn default_handler_timeout_secs() -> u64 {
    5
}

/// Default peer-id threshold separating group conversations from one-to-one
/// chats (VK convention: group peers start at 2e9).
fn default_peer_id_threshold() -> i64 {
    2_000_000_000
}

/// Default sticker sent when a handler fails or times out.
fn default_fallback_sticker_id() -> u32 {
    8471
}

/// Default listen address for the webhook server.
fn default_listen_addr() -> String {
    "127.0.0.1:13666".to_string()
}

fn default_friends() -> Vec<i64> {
    Vec::new()
}

/// Configuration for the lina-bot application.
///
/// Deserialization happens on [`ConfigInner`]; this wrapper only adds cheap
/// cloning, so it is constructed by hand in [`Config::load`].
#[derive(Debug, Clone)]
pub struct Config {
    /// The shared configuration values.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The actual configuration values, deserialized from environment variables
/// and the optional TOML file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// VK community (group) identifier (`GROUP_ID`).
    pub group_id: u64,
    /// Display names the bot answers to, matched as whole words (`BOT_NAMES`).
    pub bot_names: Vec<String>,
    /// VK access token for the community (`VK_ACCESS_TOKEN`).
    pub vk_access_token: String,
    /// Confirmation code echoed back on the callback handshake
    /// (`CONFIRMATION_CODE`).
    pub confirmation_code: String,
    /// User id of the bot's admin (`ADMIN_ID`).
    pub admin_id: i64,
    /// User ids greeted as friends (`FRIENDS`).
    #[serde(default = "default_friends")]
    pub friends: Vec<i64>,
    /// Wall-clock budget for one handler's trigger-produce-deliver sequence
    /// (`HANDLER_TIMEOUT_SECS`).
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    /// Peer ids at or above this value denote group conversations
    /// (`PEER_ID_THRESHOLD`).
    #[serde(default = "default_peer_id_threshold")]
    pub peer_id_threshold: i64,
    /// Sticker delivered as the degraded fallback reply
    /// (`FALLBACK_STICKER_ID`).
    #[serde(default = "default_fallback_sticker_id")]
    pub fallback_sticker_id: u32,
    /// Webhook server bind address (`LISTEN_ADDR`).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Config {
    /// Loads configuration from the `LINA_*` environment and, when present,
    /// a TOML file, then validates it.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("LINA"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new("config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name("config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        if result.bot_names.is_empty() {
            return Err(anyhow::anyhow!("At least one bot display name must be configured."));
        }

        if result.handler_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Handler timeout must be non-zero."));
        }

        Ok(result)
    }

    /// Lowercased bot display names; inbound text is case-folded at
    /// construction, so matching happens in lowercase throughout.
    pub fn bot_names_lowercase(&self) -> Vec<String> {
        self.bot_names.iter().map(|n| n.to_lowercase()).collect()
    }
}
