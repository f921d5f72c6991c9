//! Common result aliases, reply content, and the error taxonomy.

use thiserror::Error;

/// The crate-wide error type.
pub type Err = anyhow::Error;
/// The crate-wide result type.
pub type Res<T> = Result<T, Err>;
/// A result carrying no value.
pub type Void = Res<()>;

/// VK error code for "admin permission required".
pub const ADMIN_PERMISSION_REQUIRED: i64 = 917;

/// VK error code for "request URI too long".
pub const URI_TOO_LONG: i64 = 414;

/// Failure to turn an inbound webhook payload into a typed event.
///
/// Both variants are client errors at the HTTP boundary: the webhook delivery
/// was bad, the process keeps running.
#[derive(Debug, Error)]
pub enum EventError {
    /// The `type` tag of the delivery was not understood.
    #[error("unrecognized event type: {0}")]
    UnrecognizedEventType(String),
    /// The new-message payload was missing required fields.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// An error reported by the VK API, carrying the platform error code.
#[derive(Debug, Clone, Error)]
#[error("vk error {code}: {message}")]
pub struct PlatformError {
    /// The numeric VK error code.
    pub code: i64,
    /// The error message reported by the platform.
    pub message: String,
}

impl PlatformError {
    /// Creates a platform error from a code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Content produced by a handler for delivery to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A single text message.
    Text(String),
    /// A multi-part reply, delivered in order with a pacing delay between parts.
    Parts(Vec<String>),
    /// A sticker by its VK sticker id.
    Sticker(u32),
}

impl HandlerError {
    /// Classifies an error coming back from the VK client, recovering the
    /// platform error code when there is one.
    pub fn from_api(err: anyhow::Error) -> Self {
        match err.downcast::<PlatformError>() {
            Ok(platform) => Self::Platform(platform),
            Err(other) => Self::Other(other),
        }
    }
}

/// Failure modes a handler can signal from `produce`.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler could not produce a valid reply (e.g. malformed dice
    /// notation); the dispatcher answers with the fallback sticker.
    #[error("fallback: {0}")]
    Fallback(String),
    /// The VK API reported a failure; interpreted per-code by the dispatcher.
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// Anything else; logged and skipped without aborting sibling handlers.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
