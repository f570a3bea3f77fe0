// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User webhook subscriptions and delivery logs.
//!
//! `events`, `headers`, and `channel_ids` are stored as JSON text columns;
//! matching decodes them in Rust rather than relying on SQLite JSON
//! functions.

use std::collections::HashMap;

use omniroute_core::types::EventType;
use omniroute_core::OmnirouteError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{UserWebhook, WebhookLog};

const WEBHOOK_COLUMNS: &str = "id, user_id, url, events, headers, secret, channel_ids, \
     is_active, trigger_count, last_triggered_at, last_error, created_at";

fn row_to_webhook(row: &rusqlite::Row<'_>) -> Result<UserWebhook, rusqlite::Error> {
    let events_json: String = row.get(3)?;
    let headers_json: String = row.get(4)?;
    let channel_ids_json: String = row.get(6)?;
    let bad_json = |idx: usize, detail: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            detail.into(),
        )
    };
    let events: Vec<EventType> = serde_json::from_str(&events_json)
        .map_err(|e| bad_json(3, format!("invalid events array: {e}")))?;
    let headers: HashMap<String, String> = serde_json::from_str(&headers_json)
        .map_err(|e| bad_json(4, format!("invalid headers object: {e}")))?;
    let channel_ids: Vec<String> = serde_json::from_str(&channel_ids_json)
        .map_err(|e| bad_json(6, format!("invalid channel_ids array: {e}")))?;

    Ok(UserWebhook {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        events,
        headers,
        secret: row.get(5)?,
        channel_ids,
        is_active: row.get::<_, i64>(7)? != 0,
        trigger_count: row.get(8)?,
        last_triggered_at: row.get(9)?,
        last_error: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Insert a webhook subscription.
pub async fn create_webhook(db: &Database, webhook: &UserWebhook) -> Result<(), OmnirouteError> {
    let w = webhook.clone();
    let events = serde_json::to_string(&w.events).map_err(OmnirouteError::storage)?;
    let headers = serde_json::to_string(&w.headers).map_err(OmnirouteError::storage)?;
    let channel_ids = serde_json::to_string(&w.channel_ids).map_err(OmnirouteError::storage)?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_webhooks (id, user_id, url, events, headers, secret,
                                            channel_ids, is_active, trigger_count,
                                            last_triggered_at, last_error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    w.id,
                    w.user_id,
                    w.url,
                    events,
                    headers,
                    w.secret,
                    channel_ids,
                    w.is_active as i64,
                    w.trigger_count,
                    w.last_triggered_at,
                    w.last_error,
                    w.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a webhook by ID.
pub async fn get_webhook(db: &Database, id: &str) -> Result<Option<UserWebhook>, OmnirouteError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WEBHOOK_COLUMNS} FROM user_webhooks WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_webhook);
            match result {
                Ok(w) => Ok(Some(w)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the active webhooks of a user that subscribe to `event`, honoring
/// their channel filters.
///
/// A webhook matches when `is_active`, its `events` array contains the event,
/// and its `channel_ids` filter is empty (all channels) or contains the
/// event's channel id. Disabled webhooks are excluded in SQL so they never
/// reach the dispatch wave.
pub async fn find_active_by_event(
    db: &Database,
    user_id: &str,
    event: EventType,
    channel_id: Option<&str>,
) -> Result<Vec<UserWebhook>, OmnirouteError> {
    let user_id = user_id.to_string();
    let channel_id = channel_id.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WEBHOOK_COLUMNS} FROM user_webhooks
                 WHERE user_id = ?1 AND is_active = 1
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_webhook)?;

            let mut matches = Vec::new();
            for row in rows {
                let webhook = row?;
                if !webhook.events.contains(&event) {
                    continue;
                }
                let channel_matches = webhook.channel_ids.is_empty()
                    || channel_id
                        .as_ref()
                        .is_some_and(|id| webhook.channel_ids.contains(id));
                if channel_matches {
                    matches.push(webhook);
                }
            }
            Ok(matches)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Outcome of a single delivery attempt, for the log row and webhook counters.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub event: String,
    pub payload: String,
    pub response_status: Option<i64>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

/// Record one delivery attempt: insert a log row, prune the webhook's log to
/// `retention` rows, and update `trigger_count`/`last_triggered_at`/`last_error`
/// in the same transaction.
pub async fn record_delivery(
    db: &Database,
    webhook_id: &str,
    record: &DeliveryRecord,
    retention: u32,
    timestamp: &str,
) -> Result<(), OmnirouteError> {
    let webhook_id = webhook_id.to_string();
    let record = record.clone();
    let timestamp = timestamp.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO webhook_logs (webhook_id, event, payload, response_status,
                                           response_body, error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    webhook_id,
                    record.event,
                    record.payload,
                    record.response_status,
                    record.response_body,
                    record.error,
                    timestamp,
                ],
            )?;

            // Keep only the newest `retention` rows for this webhook.
            tx.execute(
                "DELETE FROM webhook_logs
                 WHERE webhook_id = ?1 AND id NOT IN (
                     SELECT id FROM webhook_logs WHERE webhook_id = ?1
                     ORDER BY id DESC LIMIT ?2
                 )",
                params![webhook_id, retention as i64],
            )?;

            tx.execute(
                "UPDATE user_webhooks
                 SET trigger_count = trigger_count + 1,
                     last_triggered_at = ?1,
                     last_error = ?2
                 WHERE id = ?3",
                params![timestamp, record.error, webhook_id],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a webhook's delivery log, newest first.
pub async fn get_logs(db: &Database, webhook_id: &str) -> Result<Vec<WebhookLog>, OmnirouteError> {
    let webhook_id = webhook_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, webhook_id, event, payload, response_status, response_body,
                        error, created_at
                 FROM webhook_logs WHERE webhook_id = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt.query_map(params![webhook_id], |row| {
                Ok(WebhookLog {
                    id: row.get(0)?,
                    webhook_id: row.get(1)?,
                    event: row.get(2)?,
                    payload: row.get(3)?,
                    response_status: row.get(4)?,
                    response_body: row.get(5)?,
                    error: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;
            let mut logs = Vec::new();
            for row in rows {
                logs.push(row?);
            }
            Ok(logs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
