// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait implemented by each protocol client.

use async_trait::async_trait;

use crate::error::OmnirouteError;
use crate::types::{ChannelType, MediaPayload, SendResult};

/// One outbound protocol adapter.
///
/// `target` is adapter-specific: a phone/JID for the WhatsApp variants, a
/// PSID/IGSID for Meta, a chat id for Telegram. Implementations encapsulate
/// every provider quirk, including response-shape parsing -- callers only
/// ever see [`SendResult`].
///
/// The set of implementations is closed: the dispatcher enumerates them by
/// [`ChannelType`]; this is not a plugin surface.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel type this adapter serves.
    fn channel_type(&self) -> ChannelType;

    /// Send plain text. Returns the provider message id.
    async fn send_text(&self, target: &str, text: &str) -> Result<SendResult, OmnirouteError>;

    /// Send media (image, video, audio, document), optionally captioned.
    async fn send_media(
        &self,
        target: &str,
        media: &MediaPayload,
    ) -> Result<SendResult, OmnirouteError>;
}
