// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Omniroute messaging gateway.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Omniroute workspace. All channel
//! adapters implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::OmnirouteError;
pub use traits::ChannelAdapter;
pub use types::{
    Channel, ChannelType, Conversation, Credentials, Direction, EventType, Lead, MediaPayload,
    Message, MessageStatus, OutboundContent, SendResult, UserWebhook, WebhookLog,
};
