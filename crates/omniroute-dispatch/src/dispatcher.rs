// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound send orchestration and inbound recording.
//!
//! `send` runs resolve identity -> resolve credentials -> select adapter ->
//! deliver -> persist, producing a uniform [`Message`] regardless of
//! provider. A provider failure surfaces to the caller with nothing
//! persisted; a persistence failure after a successful provider send is
//! logged and swallowed -- the send already happened and history recording
//! is best-effort.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use omniroute_config::model::{EvolutionConfig, GraphConfig, OmnirouteConfig, TelegramConfig};
use omniroute_core::types::{
    ChannelType, Conversation, ConversationStatus, Credentials, Direction, EventType,
    MediaPayload, Message, MessageStatus, OutboundContent,
};
use omniroute_core::{ChannelAdapter, OmnirouteError};
use omniroute_evolution::EvolutionClient;
use omniroute_hooks::WebhookDispatcher;
use omniroute_meta::GraphClient;
use omniroute_storage::queries::{conversations, leads, messages};
use omniroute_storage::{now_iso, Database};
use omniroute_telegram::TelegramClient;
use omniroute_whatsapp_cloud::CloudApiClient;

use crate::credentials::CredentialResolver;
use crate::identity::{self, DispatchContext, IdentityResolver, Resolution};

/// An inbound provider message to record against a conversation.
#[derive(Debug, Clone, Default)]
pub struct InboundContent {
    pub text: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub external_id: Option<String>,
    /// Display name the provider supplied for the remote party.
    pub contact_name: Option<String>,
}

/// The conversation routing and dispatch engine.
///
/// Explicitly constructed with its store, webhook queue, and provider
/// configuration -- no global state.
pub struct MessageDispatcher {
    db: Arc<Database>,
    identity: IdentityResolver,
    credentials: CredentialResolver,
    hooks: Arc<WebhookDispatcher>,
    evolution: EvolutionConfig,
    graph: GraphConfig,
    telegram: TelegramConfig,
    timeout: Duration,
}

impl MessageDispatcher {
    pub fn new(
        db: Arc<Database>,
        config: &OmnirouteConfig,
        hooks: Arc<WebhookDispatcher>,
    ) -> Self {
        let http = reqwest::Client::new();
        Self {
            identity: IdentityResolver::new(Arc::clone(&db)),
            credentials: CredentialResolver::new(
                Arc::clone(&db),
                http,
                &config.graph.base_url,
            ),
            db,
            hooks,
            evolution: config.evolution.clone(),
            graph: config.graph.clone(),
            telegram: config.telegram.clone(),
            timeout: Duration::from_secs(config.http.timeout_secs),
        }
    }

    /// Send text and/or media to whatever `raw_identifier` resolves to.
    pub async fn send(
        &self,
        user_id: &str,
        raw_identifier: &str,
        content: OutboundContent,
    ) -> Result<Message, OmnirouteError> {
        if content.is_empty() {
            return Err(OmnirouteError::Validation(
                "message requires text or media_url".into(),
            ));
        }

        let context = match self.identity.resolve(user_id, raw_identifier).await? {
            Resolution::Conversation(context) => context,
            Resolution::Lead(context) => {
                debug!(raw_identifier, "identifier resolved via lead fallback");
                context
            }
            Resolution::NotFound => {
                return Err(OmnirouteError::NotFound {
                    entity: "recipient".into(),
                    id: raw_identifier.to_string(),
                });
            }
        };

        let credentials = self.credentials.resolve(&context.channel).await?;
        let adapter = self.build_adapter(context.channel.channel_type, credentials)?;
        let target = adapter_target(context.channel.channel_type, &context.remote_identifier);

        let text = content.text.as_deref().filter(|t| !t.is_empty());
        let result = match content.media_url.as_deref().filter(|u| !u.is_empty()) {
            Some(media_url) => {
                let media = MediaPayload {
                    url: media_url.to_string(),
                    mime_type: content
                        .media_type
                        .clone()
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    caption: text.map(String::from),
                    buffer: None,
                    file_name: None,
                };
                adapter.send_media(&target, &media).await?
            }
            None => {
                // is_empty() above guarantees text is present here.
                adapter.send_text(&target, text.unwrap_or_default()).await?
            }
        };

        let mut message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: context
                .conversation
                .as_ref()
                .map(|c| c.id.clone())
                .unwrap_or_default(),
            direction: Direction::Out,
            channel_type: context.channel.channel_type,
            content: content.text.clone().unwrap_or_default(),
            media_url: content.media_url.clone(),
            media_type: content.media_type.clone(),
            status: MessageStatus::Sent,
            external_id: Some(result.external_id.clone()),
            metadata: None,
            sent_at: now_iso(),
        };

        // The provider accepted the message; from here on failures must not
        // turn a delivered send into an error for the caller.
        match self.persist_outbound(user_id, &context, &mut message).await {
            Ok((conversation, created)) => {
                if created {
                    self.enqueue_conversation_created(&context, &conversation);
                }
                self.hooks.enqueue(
                    user_id,
                    EventType::MessageSent,
                    json!({
                        "message": message,
                        "conversation": {"id": conversation.id},
                    }),
                    Some(&context.channel.id),
                );
            }
            Err(e) => {
                warn!(
                    external_id = %result.external_id,
                    error = %e,
                    "message sent but history recording failed"
                );
            }
        }

        Ok(message)
    }

    /// Record an inbound provider message, creating the conversation on
    /// first contact.
    pub async fn record_inbound(
        &self,
        user_id: &str,
        channel_id: &str,
        remote_identifier: &str,
        inbound: InboundContent,
    ) -> Result<Message, OmnirouteError> {
        let channel = omniroute_storage::queries::channels::get_channel(&self.db, channel_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| OmnirouteError::NotFound {
                entity: "channel".into(),
                id: channel_id.to_string(),
            })?;

        let template = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            channel_id: channel.id.clone(),
            remote_identifier: remote_identifier.to_string(),
            lead_id: None,
            status: ConversationStatus::Open,
            unread_count: 0,
            metadata: merge_contact_metadata(None, inbound.contact_name.as_deref()),
            last_message_at: None,
        };
        let (conversation, created) = conversations::find_or_create(&self.db, &template).await?;

        if !created {
            let merged = merge_contact_metadata(
                conversation.metadata.as_deref(),
                inbound.contact_name.as_deref(),
            );
            if merged != conversation.metadata
                && let Some(metadata) = &merged
            {
                conversations::update_metadata(&self.db, &conversation.id, metadata).await?;
            }
        }

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            direction: Direction::In,
            channel_type: channel.channel_type,
            content: inbound.text.clone(),
            media_url: inbound.media_url.clone(),
            media_type: inbound.media_type.clone(),
            status: MessageStatus::Delivered,
            external_id: inbound.external_id.clone(),
            metadata: None,
            sent_at: now_iso(),
        };
        messages::insert_message(&self.db, &message).await?;
        conversations::increment_unread(&self.db, &conversation.id).await?;
        conversations::touch_last_message(&self.db, &conversation.id, &message.sent_at).await?;

        if created {
            self.hooks.enqueue(
                user_id,
                EventType::ConversationCreated,
                json!({"conversation": conversation}),
                Some(&channel.id),
            );
        }
        self.hooks.enqueue(
            user_id,
            EventType::MessageReceived,
            json!({
                "message": message,
                "conversation": {"id": conversation.id},
            }),
            Some(&channel.id),
        );

        Ok(message)
    }

    /// Persist the outbound message and its bookkeeping. Returns the owning
    /// conversation and whether this send created it.
    async fn persist_outbound(
        &self,
        user_id: &str,
        context: &DispatchContext,
        message: &mut Message,
    ) -> Result<(Conversation, bool), OmnirouteError> {
        let (conversation, created) = match &context.conversation {
            Some(conversation) => (conversation.clone(), false),
            None => {
                let metadata = match &context.lead_id {
                    Some(lead_id) => leads::get_lead(&self.db, user_id, lead_id)
                        .await?
                        .and_then(|lead| merge_contact_metadata(None, lead.name.as_deref())),
                    None => None,
                };
                let template = Conversation {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    channel_id: context.channel.id.clone(),
                    remote_identifier: context.remote_identifier.clone(),
                    lead_id: context.lead_id.clone(),
                    status: ConversationStatus::Open,
                    unread_count: 0,
                    metadata,
                    last_message_at: None,
                };
                conversations::find_or_create(&self.db, &template).await?
            }
        };

        message.conversation_id = conversation.id.clone();
        messages::insert_message(&self.db, message).await?;
        conversations::touch_last_message(&self.db, &conversation.id, &message.sent_at).await?;

        if let Some(lead_id) = conversation.lead_id.as_ref().or(context.lead_id.as_ref()) {
            leads::touch_last_contact(&self.db, lead_id, &message.sent_at).await?;
        }

        Ok((conversation, created))
    }

    fn enqueue_conversation_created(
        &self,
        context: &DispatchContext,
        conversation: &Conversation,
    ) {
        self.hooks.enqueue(
            &conversation.user_id,
            EventType::ConversationCreated,
            json!({"conversation": conversation}),
            Some(&context.channel.id),
        );
    }

    /// Instantiate the protocol adapter for the resolved credentials.
    fn build_adapter(
        &self,
        channel_type: ChannelType,
        credentials: Credentials,
    ) -> Result<Box<dyn ChannelAdapter>, OmnirouteError> {
        match credentials {
            Credentials::Evolution { instance_id } => {
                let base_url = self.evolution.base_url.as_deref().ok_or_else(|| {
                    OmnirouteError::ChannelConfig {
                        message: "evolution.base_url is not configured".into(),
                    }
                })?;
                let api_key = self.evolution.api_key.as_deref().ok_or_else(|| {
                    OmnirouteError::ChannelConfig {
                        message: "evolution.api_key is not configured".into(),
                    }
                })?;
                Ok(Box::new(EvolutionClient::new(
                    base_url,
                    api_key,
                    &instance_id,
                    self.timeout,
                )?))
            }
            Credentials::WhatsappCloud {
                phone_number_id,
                access_token,
            } => Ok(Box::new(CloudApiClient::new(
                &self.graph.base_url,
                &phone_number_id,
                &access_token,
                self.timeout,
            )?)),
            Credentials::Meta {
                access_token,
                page_id,
            } => Ok(Box::new(GraphClient::new(
                &self.graph.base_url,
                &access_token,
                page_id,
                channel_type,
                self.timeout,
            )?)),
            Credentials::Telegram { bot_token } => Ok(Box::new(TelegramClient::new(
                &self.telegram.base_url,
                &bot_token,
                self.timeout,
            )?)),
        }
    }
}

/// Map a stored remote identifier to the adapter's target form.
///
/// Cloud API targets are bare phone numbers even though the conversation
/// stores a JID; every other adapter consumes the identifier as stored.
fn adapter_target(channel_type: ChannelType, remote_identifier: &str) -> String {
    match channel_type {
        ChannelType::WhatsappCloud => identity::extract_phone(remote_identifier).to_string(),
        _ => remote_identifier.to_string(),
    }
}

/// Merge an incoming contact name into a conversation metadata blob.
///
/// A numeric-looking incoming name never overwrites an already-known
/// non-numeric display name -- providers hand back raw ids as names, and
/// those must not clobber a resolved contact.
pub fn merge_contact_metadata(
    existing: Option<&str>,
    contact_name: Option<&str>,
) -> Option<String> {
    let mut object = existing
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .filter(|v| v.is_object())
        .unwrap_or_else(|| json!({}));

    if let Some(incoming) = contact_name.filter(|n| !n.is_empty()) {
        let existing_name = object
            .get("contact_name")
            .and_then(|v| v.as_str())
            .filter(|n| !n.is_empty());
        let keep_existing = is_numeric_name(incoming)
            && existing_name.is_some_and(|name| !is_numeric_name(name));
        if !keep_existing {
            object["contact_name"] = json!(incoming);
        }
    }

    if object.as_object().is_some_and(|o| o.is_empty()) {
        existing.map(String::from)
    } else {
        Some(object.to_string())
    }
}

/// Phone-number-shaped "names": digits with dialing punctuation only.
fn is_numeric_name(name: &str) -> bool {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' ' | '(' | ')'))
        .collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use omniroute_config::model::WebhookConfig;
    use omniroute_test_utils::{fixtures, TestStore};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server_uri: &str) -> OmnirouteConfig {
        let mut config = OmnirouteConfig::default();
        config.evolution.base_url = Some(server_uri.to_string());
        config.evolution.api_key = Some("evo-key".to_string());
        config.graph.base_url = server_uri.to_string();
        config.telegram.base_url = server_uri.to_string();
        config
    }

    async fn dispatcher_for(store: &TestStore, server_uri: &str) -> MessageDispatcher {
        let hooks = WebhookDispatcher::new(Arc::clone(&store.db), &WebhookConfig::default())
            .unwrap();
        MessageDispatcher::new(Arc::clone(&store.db), &test_config(server_uri), hooks)
    }

    // --- metadata merge ---

    #[test]
    fn numeric_name_never_overwrites_known_name() {
        let existing = r#"{"contact_name":"Maria"}"#;
        let merged = merge_contact_metadata(Some(existing), Some("258843210987")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["contact_name"], "Maria");
    }

    #[test]
    fn real_name_replaces_numeric_placeholder() {
        let existing = r#"{"contact_name":"258843210987"}"#;
        let merged = merge_contact_metadata(Some(existing), Some("Maria")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["contact_name"], "Maria");
    }

    #[test]
    fn numeric_name_is_accepted_when_nothing_known() {
        let merged = merge_contact_metadata(None, Some("258843210987")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["contact_name"], "258843210987");
    }

    #[test]
    fn merge_preserves_unrelated_keys() {
        let existing = r#"{"contact_name":"Maria","avatar":"https://cdn.example/a.png"}"#;
        let merged = merge_contact_metadata(Some(existing), Some("Maria L.")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["contact_name"], "Maria L.");
        assert_eq!(value["avatar"], "https://cdn.example/a.png");
    }

    #[test]
    fn no_name_leaves_metadata_untouched() {
        assert_eq!(merge_contact_metadata(None, None), None);
        let existing = r#"{"contact_name":"Maria"}"#;
        assert_eq!(
            merge_contact_metadata(Some(existing), None).as_deref(),
            Some(existing)
        );
    }

    #[test]
    fn adapter_target_strips_jid_for_cloud_only() {
        assert_eq!(
            adapter_target(ChannelType::WhatsappCloud, "258843210987@s.whatsapp.net"),
            "258843210987"
        );
        assert_eq!(
            adapter_target(ChannelType::Whatsapp, "258843210987@s.whatsapp.net"),
            "258843210987@s.whatsapp.net"
        );
        assert_eq!(adapter_target(ChannelType::Telegram, "987654"), "987654");
    }

    // --- send ---

    #[tokio::test]
    async fn send_requires_text_or_media() {
        let store = TestStore::open().await;
        let dispatcher = dispatcher_for(&store, "http://unused.invalid").await;

        let err = dispatcher
            .send("u-1", "258843210987", OutboundContent::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OmnirouteError::Validation(_)));
    }

    #[tokio::test]
    async fn unresolvable_recipient_is_not_found() {
        let store = TestStore::open().await;
        let dispatcher = dispatcher_for(&store, "http://unused.invalid").await;

        let err = dispatcher
            .send("u-1", "not a recipient", OutboundContent::text("Oi!"))
            .await
            .unwrap_err();
        assert!(matches!(err, OmnirouteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn send_text_to_cloud_conversation_by_uuid() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::cloud_channel("ch-cloud", "1050", "tok"))
            .await;
        let conversation_id = fixtures::conversation_id();
        store
            .seed_conversation(&fixtures::conversation(
                &conversation_id,
                "ch-cloud",
                "258843210987@s.whatsapp.net",
            ))
            .await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1050/messages"))
            .and(body_partial_json(serde_json::json!({
                "to": "258843210987",
                "type": "text",
                "text": {"body": "Oi!"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "wamid.SCENARIO"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&store, &server.uri()).await;
        let message = dispatcher
            .send("u-1", &conversation_id, OutboundContent::text("Oi!"))
            .await
            .unwrap();

        assert_eq!(message.channel_type, ChannelType::WhatsappCloud);
        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(message.external_id.as_deref(), Some("wamid.SCENARIO"));
        assert_eq!(message.conversation_id, conversation_id);

        let stored = messages::get_messages_for_conversation(&store.db, &conversation_id, None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].external_id.as_deref(), Some("wamid.SCENARIO"));
    }

    #[tokio::test]
    async fn provider_failure_persists_nothing() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::cloud_channel("ch-cloud", "1050", "tok"))
            .await;
        let conversation_id = fixtures::conversation_id();
        store
            .seed_conversation(&fixtures::conversation(
                &conversation_id,
                "ch-cloud",
                "258843210987@s.whatsapp.net",
            ))
            .await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1050/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"message": "backend down"}
            })))
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&store, &server.uri()).await;
        let err = dispatcher
            .send("u-1", &conversation_id, OutboundContent::text("Oi!"))
            .await
            .unwrap_err();
        assert!(matches!(err, OmnirouteError::ExternalApi { .. }));

        let stored = messages::get_messages_for_conversation(&store.db, &conversation_id, None)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn phone_send_creates_conversation_via_default_channel() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::whatsapp_channel("ch-wa", "inst-7"))
            .await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/inst-7"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "key": {"id": "3EB0NEW"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&store, &server.uri()).await;
        let message = dispatcher
            .send("u-1", "+258 84 321 0987", OutboundContent::text("Oi!"))
            .await
            .unwrap();
        assert_eq!(message.channel_type, ChannelType::Whatsapp);
        assert_eq!(message.external_id.as_deref(), Some("3EB0NEW"));

        // The conversation was created as a side effect, keyed by the JID.
        let conversation = conversations::find_by_remote_identifier(
            &store.db,
            "u-1",
            "258843210987@s.whatsapp.net",
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(conversation.channel_id, "ch-wa");
        assert_eq!(message.conversation_id, conversation.id);
    }

    #[tokio::test]
    async fn lead_uuid_fallback_sends_and_touches_lead() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::whatsapp_channel("ch-wa", "inst-7"))
            .await;
        let lead_id = fixtures::conversation_id();
        store
            .seed_lead(&fixtures::lead(&lead_id, Some("Maria"), Some("258843210987")))
            .await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendText/inst-7"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "key": {"id": "3EB0LEAD"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&store, &server.uri()).await;
        let message = dispatcher
            .send("u-1", &lead_id, OutboundContent::text("Oi!"))
            .await
            .unwrap();
        assert_eq!(message.external_id.as_deref(), Some("3EB0LEAD"));

        let lead = leads::get_lead(&store.db, "u-1", &lead_id)
            .await
            .unwrap()
            .unwrap();
        assert!(lead.last_contact_at.is_some());

        // The created conversation is linked to the lead and carries its name.
        let conversation = conversations::find_by_remote_identifier(
            &store.db,
            "u-1",
            "258843210987@s.whatsapp.net",
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(conversation.lead_id.as_deref(), Some(lead_id.as_str()));
        assert!(conversation.metadata.unwrap().contains("Maria"));
    }

    #[tokio::test]
    async fn media_send_uses_text_as_caption() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::whatsapp_channel("ch-wa", "inst-7"))
            .await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message/sendMedia/inst-7"))
            .and(body_partial_json(serde_json::json!({
                "media": "https://cdn.example.com/pic.png",
                "caption": "look at this",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "key": {"id": "3EB0MEDIA"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = dispatcher_for(&store, &server.uri()).await;
        let content = OutboundContent {
            text: Some("look at this".into()),
            media_url: Some("https://cdn.example.com/pic.png".into()),
            media_type: Some("image/png".into()),
        };
        let message = dispatcher
            .send("u-1", "258843210987", content)
            .await
            .unwrap();
        assert_eq!(message.media_url.as_deref(), Some("https://cdn.example.com/pic.png"));
        assert_eq!(message.content, "look at this");
    }

    // --- record_inbound ---

    #[tokio::test]
    async fn inbound_creates_conversation_and_counts_unread() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::whatsapp_channel("ch-wa", "inst-7"))
            .await;

        let dispatcher = dispatcher_for(&store, "http://unused.invalid").await;
        let inbound = InboundContent {
            text: "Ola".into(),
            contact_name: Some("Maria".into()),
            external_id: Some("3EB0IN".into()),
            ..Default::default()
        };
        let message = dispatcher
            .record_inbound("u-1", "ch-wa", "258843210987@s.whatsapp.net", inbound)
            .await
            .unwrap();
        assert_eq!(message.direction, Direction::In);

        let conversation = conversations::find_by_remote_identifier(
            &store.db,
            "u-1",
            "258843210987@s.whatsapp.net",
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(conversation.unread_count, 1);
        assert!(conversation.metadata.unwrap().contains("Maria"));
    }

    #[tokio::test]
    async fn inbound_numeric_name_keeps_resolved_contact() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::whatsapp_channel("ch-wa", "inst-7"))
            .await;

        let dispatcher = dispatcher_for(&store, "http://unused.invalid").await;
        let named = InboundContent {
            text: "first".into(),
            contact_name: Some("Maria".into()),
            ..Default::default()
        };
        dispatcher
            .record_inbound("u-1", "ch-wa", "258843210987@s.whatsapp.net", named)
            .await
            .unwrap();

        let renamed = InboundContent {
            text: "second".into(),
            contact_name: Some("258843210987".into()),
            ..Default::default()
        };
        dispatcher
            .record_inbound("u-1", "ch-wa", "258843210987@s.whatsapp.net", renamed)
            .await
            .unwrap();

        let conversation = conversations::find_by_remote_identifier(
            &store.db,
            "u-1",
            "258843210987@s.whatsapp.net",
        )
        .await
        .unwrap()
        .unwrap();
        let metadata: serde_json::Value =
            serde_json::from_str(&conversation.metadata.unwrap()).unwrap();
        assert_eq!(metadata["contact_name"], "Maria");
        assert_eq!(conversation.unread_count, 2);
    }

    #[tokio::test]
    async fn inbound_rejects_foreign_channel() {
        let store = TestStore::open().await;
        store
            .seed_channel(&fixtures::whatsapp_channel("ch-wa", "inst-7"))
            .await;

        let dispatcher = dispatcher_for(&store, "http://unused.invalid").await;
        let err = dispatcher
            .record_inbound(
                "u-other",
                "ch-wa",
                "258843210987@s.whatsapp.net",
                InboundContent {
                    text: "Ola".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OmnirouteError::NotFound { .. }));
    }
}
