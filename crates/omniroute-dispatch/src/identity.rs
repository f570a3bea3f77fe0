// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification and resolution of opaque recipient identifiers.
//!
//! A send request names its recipient with one string that may be a stored
//! conversation id, a provider chat id, or a raw phone number. Classification
//! is deterministic (first match wins): canonical UUID, then anything with an
//! `@`, then phone-shaped input. A UUID that matches no conversation falls
//! back to lead-id lookup -- one identifier space doubles for two entity
//! kinds, kept from the original schema but made explicit in [`Resolution`].

use std::sync::Arc;

use omniroute_core::types::{Channel, ChannelType, Conversation};
use omniroute_core::OmnirouteError;
use omniroute_storage::queries::{channels, conversations, leads};
use omniroute_storage::Database;
use tracing::debug;

/// WhatsApp user JID suffix appended to normalized phone numbers.
const WA_USER_SUFFIX: &str = "@s.whatsapp.net";

/// What an input string looks like, before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKind {
    /// Canonical 8-4-4-4-12 UUID: a conversation id (or, failing that, a lead id).
    ConversationId(String),
    /// Contains `@`: a provider chat id (WhatsApp JID or opaque Meta/other id).
    ProviderChatId(String),
    /// Phone-shaped: normalized to a WhatsApp JID.
    PhoneNumber(String),
}

/// Classify an identifier. Returns `None` for input that is none of the
/// three shapes (empty, free text, ...).
pub fn classify(input: &str) -> Option<IdentityKind> {
    let input = input.trim();
    if is_canonical_uuid(input) {
        return Some(IdentityKind::ConversationId(input.to_string()));
    }
    if input.contains('@') {
        return Some(IdentityKind::ProviderChatId(input.to_string()));
    }
    if is_phone_shaped(input) {
        return Some(IdentityKind::PhoneNumber(normalize_to_jid(input)));
    }
    None
}

/// The canonical 36-character hex-with-hyphens form only. Braced, URN, or
/// compact UUID renderings are not recipient identifiers in this system.
fn is_canonical_uuid(input: &str) -> bool {
    let bytes = input.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    for (i, b) in bytes.iter().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if *b != b'-' {
                    return false;
                }
            }
            _ => {
                if !b.is_ascii_hexdigit() {
                    return false;
                }
            }
        }
    }
    true
}

/// Phone-shaped: at least one digit, and nothing but digits and common
/// dialing punctuation.
fn is_phone_shaped(input: &str) -> bool {
    !input.is_empty()
        && input.chars().any(|c| c.is_ascii_digit())
        && input
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

/// Strip non-digits and append the WhatsApp user suffix:
/// `"+258 84 321 0987"` becomes `"258843210987@s.whatsapp.net"`.
pub fn normalize_to_jid(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits}{WA_USER_SUFFIX}")
}

/// Inverse of [`normalize_to_jid`]: the part before `@`.
pub fn extract_phone(jid: &str) -> &str {
    jid.split('@').next().unwrap_or(jid)
}

/// Everything the dispatcher needs to send: the channel, the provider-side
/// identifier, and -- when one already exists -- the conversation row.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// Existing conversation, or `None` when the send will create one
    /// (find-or-create keyed by `(user_id, channel_id, remote_identifier)`).
    pub conversation: Option<Conversation>,
    pub channel: Channel,
    pub remote_identifier: String,
    pub lead_id: Option<String>,
}

/// Tagged resolution result.
///
/// The UUID fallback from conversation to lead is explicit here rather than
/// silent: callers can tell which entity kind matched.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The identifier led to a conversation context (an existing row, or a
    /// phone/JID recipient the send will create a row for).
    Conversation(DispatchContext),
    /// The identifier was a lead id; the context was derived from the
    /// lead's phone number.
    Lead(DispatchContext),
    /// Neither conversation nor lead nor valid phone could be derived.
    NotFound,
}

/// Resolves identifiers against the store for one user scope.
pub struct IdentityResolver {
    db: Arc<Database>,
}

impl IdentityResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Resolve `input` to a dispatch context.
    pub async fn resolve(
        &self,
        user_id: &str,
        input: &str,
    ) -> Result<Resolution, OmnirouteError> {
        match classify(input) {
            Some(IdentityKind::ConversationId(id)) => self.resolve_uuid(user_id, &id).await,
            Some(IdentityKind::ProviderChatId(remote)) => {
                self.resolve_remote(user_id, &remote).await
            }
            Some(IdentityKind::PhoneNumber(jid)) => self.resolve_remote(user_id, &jid).await,
            None => Ok(Resolution::NotFound),
        }
    }

    async fn resolve_uuid(&self, user_id: &str, id: &str) -> Result<Resolution, OmnirouteError> {
        if let Some(conversation) = conversations::get_conversation(&self.db, user_id, id).await? {
            let channel = self.load_channel(&conversation.channel_id).await?;
            let remote_identifier = conversation.remote_identifier.clone();
            let lead_id = conversation.lead_id.clone();
            return Ok(Resolution::Conversation(DispatchContext {
                conversation: Some(conversation),
                channel,
                remote_identifier,
                lead_id,
            }));
        }

        // Secondary fallback: the same UUID space holds lead ids.
        let Some(lead) = leads::get_lead(&self.db, user_id, id).await? else {
            return Ok(Resolution::NotFound);
        };
        let Some(phone) = lead.phone.as_deref().filter(|p| !p.is_empty()) else {
            debug!(lead_id = %lead.id, "lead matched but has no phone");
            return Ok(Resolution::NotFound);
        };

        let jid = normalize_to_jid(phone);
        match self.remote_context(user_id, &jid).await? {
            Some(mut context) => {
                context.lead_id = Some(lead.id);
                Ok(Resolution::Lead(context))
            }
            None => Ok(Resolution::NotFound),
        }
    }

    async fn resolve_remote(
        &self,
        user_id: &str,
        remote: &str,
    ) -> Result<Resolution, OmnirouteError> {
        match self.remote_context(user_id, remote).await? {
            Some(context) => Ok(Resolution::Conversation(context)),
            None => Ok(Resolution::NotFound),
        }
    }

    /// Build a context for a provider-side identifier: an existing
    /// conversation's channel when one matches, otherwise the user's default
    /// phone-capable channel for WhatsApp-shaped identifiers.
    async fn remote_context(
        &self,
        user_id: &str,
        remote: &str,
    ) -> Result<Option<DispatchContext>, OmnirouteError> {
        if let Some(conversation) =
            conversations::find_by_remote_identifier(&self.db, user_id, remote).await?
        {
            let channel = self.load_channel(&conversation.channel_id).await?;
            let lead_id = conversation.lead_id.clone();
            return Ok(Some(DispatchContext {
                remote_identifier: conversation.remote_identifier.clone(),
                conversation: Some(conversation),
                channel,
                lead_id,
            }));
        }

        // First contact. A WhatsApp JID can be routed through the user's
        // default WhatsApp channel; an opaque PSID/IGSID cannot name its
        // channel, so it stays unresolved.
        if !remote.ends_with(WA_USER_SUFFIX) {
            return Ok(None);
        }
        let channel = channels::find_first_by_types(
            &self.db,
            user_id,
            &[ChannelType::Whatsapp, ChannelType::WhatsappCloud],
        )
        .await?;
        Ok(channel.map(|channel| DispatchContext {
            conversation: None,
            channel,
            remote_identifier: remote.to_string(),
            lead_id: None,
        }))
    }

    async fn load_channel(&self, channel_id: &str) -> Result<Channel, OmnirouteError> {
        channels::get_channel(&self.db, channel_id)
            .await?
            .ok_or_else(|| OmnirouteError::NotFound {
                entity: "channel".into(),
                id: channel_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_wins_over_other_shapes() {
        // All-digits-with-dashes in canonical positions is still a UUID.
        let id = "12345678-1234-1234-1234-123456789012";
        assert_eq!(
            classify(id),
            Some(IdentityKind::ConversationId(id.to_string()))
        );

        let id = "a1b2c3d4-e5f6-7a8b-9c0d-e1f2a3b4c5d6";
        assert_eq!(
            classify(id),
            Some(IdentityKind::ConversationId(id.to_string()))
        );
    }

    #[test]
    fn at_sign_classifies_as_provider_chat_id() {
        for id in [
            "258843210987@s.whatsapp.net",
            "120363041234567890@g.us",
            "98765432101234@lid",
            "opaque-meta-id@anything",
        ] {
            assert_eq!(
                classify(id),
                Some(IdentityKind::ProviderChatId(id.to_string())),
                "misclassified {id}"
            );
        }
    }

    #[test]
    fn phone_shapes_normalize_to_jid() {
        assert_eq!(
            classify("+258 84 321 0987"),
            Some(IdentityKind::PhoneNumber(
                "258843210987@s.whatsapp.net".to_string()
            ))
        );
        assert_eq!(
            classify("258843210987"),
            Some(IdentityKind::PhoneNumber(
                "258843210987@s.whatsapp.net".to_string()
            ))
        );
    }

    #[test]
    fn junk_is_unclassified() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("   "), None);
        assert_eq!(classify("maria from support"), None);
        assert_eq!(classify("++--"), None);
        // Near-UUID: wrong hyphen positions.
        assert_eq!(classify("a1b2c3d4e-5f6-7a8b-9c0d-e1f2a3b4c5d6"), None);
    }

    #[test]
    fn normalize_and_extract_round_trip() {
        let jid = normalize_to_jid("+258 84 321 0987");
        assert_eq!(jid, "258843210987@s.whatsapp.net");
        assert_eq!(extract_phone(&jid), "258843210987");
        assert_eq!(normalize_to_jid(extract_phone(&jid)), jid);
    }

    #[test]
    fn extract_phone_passes_through_bare_numbers() {
        assert_eq!(extract_phone("258843210987"), "258843210987");
    }
}
