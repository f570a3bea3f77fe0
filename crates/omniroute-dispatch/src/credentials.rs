// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential resolution with lazy Meta page-id discovery.
//!
//! For every channel type but Instagram/Facebook this is a pure decode of
//! the stored blob. Meta channels missing a `page_id` trigger the discovery
//! chain at send time; the discovered id is written back to the channel so
//! future sends skip the round-trips. Discovery per channel is serialized
//! behind an async mutex, so concurrent first sends on one channel perform
//! the HTTP calls at most once.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use omniroute_core::types::{Channel, Credentials};
use omniroute_core::OmnirouteError;
use omniroute_storage::queries::channels;
use omniroute_storage::Database;

/// Resolves a channel's stored credentials into the typed union.
pub struct CredentialResolver {
    db: Arc<Database>,
    http: reqwest::Client,
    graph_base_url: String,
    discovery_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialResolver {
    pub fn new(db: Arc<Database>, http: reqwest::Client, graph_base_url: &str) -> Self {
        Self {
            db,
            http,
            graph_base_url: graph_base_url.trim_end_matches('/').to_string(),
            discovery_locks: DashMap::new(),
        }
    }

    /// Decode `channel`'s credentials, performing page-id discovery for
    /// Meta channels that never resolved one.
    pub async fn resolve(&self, channel: &Channel) -> Result<Credentials, OmnirouteError> {
        let credentials = Credentials::from_blob(channel.channel_type, &channel.credentials)?;

        match credentials {
            Credentials::Meta {
                access_token,
                page_id: None,
            } => self.discover_and_persist(channel, access_token).await,
            other => Ok(other),
        }
    }

    async fn discover_and_persist(
        &self,
        channel: &Channel,
        access_token: String,
    ) -> Result<Credentials, OmnirouteError> {
        let lock = self
            .discovery_locks
            .entry(channel.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-read under the lock: a concurrent send may have finished
        // discovery while this one waited.
        let fresh = channels::get_channel(&self.db, &channel.id)
            .await?
            .ok_or_else(|| OmnirouteError::NotFound {
                entity: "channel".into(),
                id: channel.id.clone(),
            })?;
        if let Credentials::Meta {
            page_id: Some(page_id),
            access_token,
        } = Credentials::from_blob(fresh.channel_type, &fresh.credentials)?
        {
            return Ok(Credentials::Meta {
                access_token,
                page_id: Some(page_id),
            });
        }

        let page_id = omniroute_meta::discovery::discover_page_id(
            &self.http,
            &self.graph_base_url,
            &access_token,
        )
        .await?;

        let resolved = Credentials::Meta {
            access_token,
            page_id,
        };

        if let Credentials::Meta {
            page_id: Some(page_id),
            ..
        } = &resolved
        {
            channels::update_channel_credentials(&self.db, &channel.id, &resolved.to_blob())
                .await?;
            debug!(channel_id = %channel.id, page_id, "persisted discovered page id");
        }

        Ok(resolved)
    }
}
