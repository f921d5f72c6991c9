//! Core components, types, and utilities for lina-bot.
//!
//! This module contains fundamental building blocks used throughout the
//! application:
//! - Configuration handling and environment variables.
//! - Common types, reply content, and the error taxonomy.

pub mod config;
pub mod types;
