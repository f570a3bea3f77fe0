// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `omniroute-core::types` for use across
//! the dispatch and webhook crates. This module re-exports them for
//! convenience within the storage crate.

pub use omniroute_core::types::{
    Channel, Conversation, Lead, Message, UserWebhook, WebhookLog,
};
