//! Outbound VK API integration.
//!
//! This module provides functionality for talking to the VK platform:
//! - Sending messages and stickers to a peer
//! - Fetching conversation member lists
//!
//! It defines the `GenericVkClient` trait that can be implemented for
//! different transports, with a default reqwest-based implementation.

pub mod http;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;

use crate::base::types::{Res, Void};

// Traits.

/// Generic VK API trait that clients must implement.
///
/// Every operation may fail with a [`crate::base::types::PlatformError`]
/// carrying the numeric VK error code; the dispatcher interprets the codes.
#[async_trait]
pub trait GenericVkClient: Send + Sync + 'static {
    /// Send a text message to a peer.
    async fn send_message(&self, peer_id: i64, text: &str) -> Void;

    /// Send a sticker to a peer.
    async fn send_sticker(&self, peer_id: i64, sticker_id: u32) -> Void;

    /// Get the member profiles of a group conversation.
    ///
    /// Requires the community to be a conversation admin; VK reports code 917
    /// otherwise.
    async fn get_conversation_members(&self, peer_id: i64) -> Res<Vec<UserProfile>>;
}

// Structs.

/// VK client handle for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct VkClient {
    inner: Arc<dyn GenericVkClient>,
}

impl Deref for VkClient {
    type Target = dyn GenericVkClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl VkClient {
    pub fn new(inner: Arc<dyn GenericVkClient>) -> Self {
        Self { inner }
    }
}

/// A conversation member profile, tolerant of extra platform fields.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub online: i64,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
