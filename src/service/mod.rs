//! Service integrations for external APIs.
//!
//! Each service module defines a generic trait and a concrete implementation,
//! allowing for extensibility and easy testing.

pub mod vk;
