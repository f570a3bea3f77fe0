// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seeded temp-database harness.
//!
//! `TestStore` opens a fresh migrated SQLite database in a temp directory
//! and offers seeding helpers; `fixtures` builds entities with sensible
//! defaults so tests only state what they care about.

use std::sync::Arc;

use omniroute_core::types::{
    Channel, ChannelType, Conversation, ConversationStatus, Lead, UserWebhook,
};
use omniroute_storage::queries::{channels, conversations, leads, webhooks};
use omniroute_storage::{now_iso, Database};

/// A migrated temp database plus the directory keeping it alive.
pub struct TestStore {
    pub db: Arc<Database>,
    _dir: tempfile::TempDir,
}

impl TestStore {
    /// Open a fresh database in a temp directory.
    pub async fn open() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap())
            .await
            .expect("open test database");
        Self {
            db: Arc::new(db),
            _dir: dir,
        }
    }

    pub async fn seed_channel(&self, channel: &Channel) {
        channels::create_channel(&self.db, channel)
            .await
            .expect("seed channel");
    }

    pub async fn seed_conversation(&self, conversation: &Conversation) {
        conversations::create_conversation(&self.db, conversation)
            .await
            .expect("seed conversation");
    }

    pub async fn seed_lead(&self, lead: &Lead) {
        leads::create_lead(&self.db, lead).await.expect("seed lead");
    }

    pub async fn seed_webhook(&self, webhook: &UserWebhook) {
        webhooks::create_webhook(&self.db, webhook)
            .await
            .expect("seed webhook");
    }
}

/// Entity builders with test defaults (`user_id = "u-1"` throughout).
pub mod fixtures {
    use super::*;

    pub const USER: &str = "u-1";

    pub fn channel(id: &str, channel_type: ChannelType, credentials: &str) -> Channel {
        Channel {
            id: id.to_string(),
            user_id: USER.to_string(),
            channel_type,
            name: format!("{channel_type} channel"),
            status: "connected".to_string(),
            credentials: credentials.to_string(),
            created_at: now_iso(),
        }
    }

    pub fn whatsapp_channel(id: &str, instance_id: &str) -> Channel {
        channel(
            id,
            ChannelType::Whatsapp,
            &format!(r#"{{"instance_id":"{instance_id}"}}"#),
        )
    }

    pub fn cloud_channel(id: &str, phone_number_id: &str, access_token: &str) -> Channel {
        channel(
            id,
            ChannelType::WhatsappCloud,
            &format!(
                r#"{{"phone_number_id":"{phone_number_id}","access_token":"{access_token}"}}"#
            ),
        )
    }

    pub fn instagram_channel(id: &str, access_token: &str, page_id: Option<&str>) -> Channel {
        let credentials = match page_id {
            Some(page_id) => {
                format!(r#"{{"access_token":"{access_token}","page_id":"{page_id}"}}"#)
            }
            None => format!(r#"{{"access_token":"{access_token}"}}"#),
        };
        channel(id, ChannelType::Instagram, &credentials)
    }

    pub fn telegram_channel(id: &str, bot_token: &str) -> Channel {
        channel(
            id,
            ChannelType::Telegram,
            &format!(r#"{{"bot_token":"{bot_token}"}}"#),
        )
    }

    pub fn conversation(id: &str, channel_id: &str, remote_identifier: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            user_id: USER.to_string(),
            channel_id: channel_id.to_string(),
            remote_identifier: remote_identifier.to_string(),
            lead_id: None,
            status: ConversationStatus::Open,
            unread_count: 0,
            metadata: None,
            last_message_at: Some(now_iso()),
        }
    }

    pub fn lead(id: &str, name: Option<&str>, phone: Option<&str>) -> Lead {
        Lead {
            id: id.to_string(),
            user_id: USER.to_string(),
            name: name.map(String::from),
            phone: phone.map(String::from),
            last_contact_at: None,
        }
    }

    /// A fresh conversation id in canonical UUID form.
    pub fn conversation_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
