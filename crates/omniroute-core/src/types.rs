// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the dispatch path, channel adapters, and storage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::OmnirouteError;

/// The closed set of supported channel types.
///
/// Each variant selects exactly one protocol adapter at dispatch time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// WhatsApp via a self-hosted Evolution API instance.
    Whatsapp,
    /// WhatsApp Cloud API (Meta Graph).
    WhatsappCloud,
    Instagram,
    Facebook,
    Telegram,
}

impl ChannelType {
    /// Instagram and Facebook share the Meta Send API and credential shape.
    pub fn is_meta(self) -> bool {
        matches!(self, ChannelType::Instagram | ChannelType::Facebook)
    }
}

/// Message direction relative to the CRM.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

/// Delivery status of a message. Transitions `pending -> sent -> delivered -> read`
/// are driven by provider callbacks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Conversation lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
    Pending,
    Snoozed,
}

/// Internal event types fanned out to user webhooks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum EventType {
    #[strum(serialize = "message.received")]
    #[serde(rename = "message.received")]
    MessageReceived,
    #[strum(serialize = "message.sent")]
    #[serde(rename = "message.sent")]
    MessageSent,
    #[strum(serialize = "message.updated")]
    #[serde(rename = "message.updated")]
    MessageUpdated,
    #[strum(serialize = "message.deleted")]
    #[serde(rename = "message.deleted")]
    MessageDeleted,
    #[strum(serialize = "conversation.created")]
    #[serde(rename = "conversation.created")]
    ConversationCreated,
    #[strum(serialize = "conversation.updated")]
    #[serde(rename = "conversation.updated")]
    ConversationUpdated,
    #[strum(serialize = "conversation.resolved")]
    #[serde(rename = "conversation.resolved")]
    ConversationResolved,
    #[strum(serialize = "conversation.reopened")]
    #[serde(rename = "conversation.reopened")]
    ConversationReopened,
    #[strum(serialize = "contact.created")]
    #[serde(rename = "contact.created")]
    ContactCreated,
    #[strum(serialize = "contact.updated")]
    #[serde(rename = "contact.updated")]
    ContactUpdated,
    #[strum(serialize = "channel.connected")]
    #[serde(rename = "channel.connected")]
    ChannelConnected,
    #[strum(serialize = "channel.disconnected")]
    #[serde(rename = "channel.disconnected")]
    ChannelDisconnected,
    #[strum(serialize = "channel.qr_updated")]
    #[serde(rename = "channel.qr_updated")]
    ChannelQrUpdated,
    #[strum(serialize = "whatsapp.connection.update")]
    #[serde(rename = "whatsapp.connection.update")]
    WhatsappConnectionUpdate,
    #[strum(serialize = "whatsapp.presence.update")]
    #[serde(rename = "whatsapp.presence.update")]
    WhatsappPresenceUpdate,
    #[strum(serialize = "whatsapp.groups.update")]
    #[serde(rename = "whatsapp.groups.update")]
    WhatsappGroupsUpdate,
}

/// Per-channel-type credential set, decoded from the channel's stored blob.
///
/// This is a closed tagged union: each variant carries only the fields its
/// adapter requires. `Meta::page_id` is the one mutable field -- absent at
/// channel creation and filled in by lazy discovery at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Evolution {
        instance_id: String,
    },
    WhatsappCloud {
        phone_number_id: String,
        access_token: String,
    },
    Meta {
        access_token: String,
        page_id: Option<String>,
    },
    Telegram {
        bot_token: String,
    },
}

impl Credentials {
    /// Decode a stored credential blob for the given channel type.
    ///
    /// Tolerates defensive double-encoding: a blob stored as a JSON string
    /// whose content is itself JSON is parsed a second time. Missing required
    /// fields produce a [`OmnirouteError::ChannelConfig`] naming the field.
    pub fn from_blob(channel_type: ChannelType, raw: &str) -> Result<Self, OmnirouteError> {
        let mut value: Value =
            serde_json::from_str(raw).map_err(|e| OmnirouteError::ChannelConfig {
                message: format!("credentials are not valid JSON: {e}"),
            })?;

        if let Value::String(inner) = &value {
            value = serde_json::from_str(inner).map_err(|e| OmnirouteError::ChannelConfig {
                message: format!("double-encoded credentials are not valid JSON: {e}"),
            })?;
        }

        match channel_type {
            ChannelType::Whatsapp => Ok(Credentials::Evolution {
                instance_id: require_field(&value, "instance_id")?,
            }),
            ChannelType::WhatsappCloud => Ok(Credentials::WhatsappCloud {
                phone_number_id: require_field(&value, "phone_number_id")?,
                access_token: require_field(&value, "access_token")?,
            }),
            ChannelType::Instagram | ChannelType::Facebook => {
                // Older channel rows stored the token under `page_access_token`.
                let access_token = str_field(&value, "access_token")
                    .or_else(|| str_field(&value, "page_access_token"))
                    .ok_or_else(|| OmnirouteError::ChannelConfig {
                        message: "missing credential field `access_token`".into(),
                    })?;
                Ok(Credentials::Meta {
                    access_token,
                    page_id: str_field(&value, "page_id"),
                })
            }
            ChannelType::Telegram => Ok(Credentials::Telegram {
                bot_token: require_field(&value, "bot_token")?,
            }),
        }
    }

    /// Encode back to the stored blob form (used when persisting a
    /// discovered `page_id`).
    pub fn to_blob(&self) -> String {
        let value = match self {
            Credentials::Evolution { instance_id } => serde_json::json!({
                "instance_id": instance_id,
            }),
            Credentials::WhatsappCloud {
                phone_number_id,
                access_token,
            } => serde_json::json!({
                "phone_number_id": phone_number_id,
                "access_token": access_token,
            }),
            Credentials::Meta {
                access_token,
                page_id,
            } => match page_id {
                Some(page_id) => serde_json::json!({
                    "access_token": access_token,
                    "page_id": page_id,
                }),
                None => serde_json::json!({ "access_token": access_token }),
            },
            Credentials::Telegram { bot_token } => serde_json::json!({
                "bot_token": bot_token,
            }),
        };
        value.to_string()
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn require_field(value: &Value, key: &str) -> Result<String, OmnirouteError> {
    str_field(value, key).ok_or_else(|| OmnirouteError::ChannelConfig {
        message: format!("missing credential field `{key}`"),
    })
}

/// Normalized result of one provider send call.
///
/// Each adapter extracts `external_id` from its own response shape
/// (`key.id`, `messages[0].id`, `message_id`, `result.message_id`) and keeps
/// the raw body for diagnostics. Nothing outside the adapter re-parses
/// provider responses.
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Provider-assigned message identifier.
    pub external_id: String,
    /// Raw provider response body.
    pub raw: Value,
}

/// Media to deliver through an adapter.
#[derive(Debug, Clone, Default)]
pub struct MediaPayload {
    /// Publicly fetchable URL of the media object.
    pub url: String,
    /// MIME type as recorded by the CRM (e.g. `image/png`, `audio/webm`).
    pub mime_type: String,
    /// Optional caption accompanying the media.
    pub caption: Option<String>,
    /// Local file bytes, when the gateway still holds them. Adapters that
    /// support uploads prefer this over the URL.
    pub buffer: Option<Vec<u8>>,
    /// Original file name, for upload forms.
    pub file_name: Option<String>,
}

/// Content of an outbound send request. Text, media, or both
/// (text doubles as the media caption when both are present).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutboundContent {
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
}

impl OutboundContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty)
            && self.media_url.as_deref().is_none_or(str::is_empty)
    }
}

// --- Domain records (canonical shapes shared by storage and dispatch) ---

/// A configured connection to one external provider for one CRM user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub user_id: String,
    pub channel_type: ChannelType,
    pub name: String,
    pub status: String,
    /// Opaque per-type credential blob; decode with [`Credentials::from_blob`].
    pub credentials: String,
    pub created_at: String,
}

/// A canonical conversation between a CRM user and one remote party.
///
/// `(user_id, channel_id, remote_identifier)` is unique. The
/// `remote_identifier` format is channel-type specific (WhatsApp JID,
/// Telegram chat id, Meta PSID/IGSID) and is never reused across types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub remote_identifier: String,
    pub lead_id: Option<String>,
    pub status: ConversationStatus,
    pub unread_count: i64,
    /// JSON object with contact metadata (`contact_name`, avatar, ...).
    pub metadata: Option<String>,
    pub last_message_at: Option<String>,
}

/// A CRM lead record. Only the fields the dispatch path touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub last_contact_at: Option<String>,
}

/// A message persisted against a conversation. Immutable once written
/// except for status transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub channel_type: ChannelType,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub status: MessageStatus,
    pub external_id: Option<String>,
    pub metadata: Option<String>,
    pub sent_at: String,
}

/// A user-registered webhook subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWebhook {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub events: Vec<EventType>,
    /// Static headers added to every delivery.
    pub headers: std::collections::HashMap<String, String>,
    pub secret: Option<String>,
    /// Channel filter; empty means all channels.
    pub channel_ids: Vec<String>,
    pub is_active: bool,
    pub trigger_count: i64,
    pub last_triggered_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
}

/// One recorded webhook delivery attempt. Capped at the 100 most recent
/// rows per webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: i64,
    pub webhook_id: String,
    pub event: String,
    pub payload: String,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}
