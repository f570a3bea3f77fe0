// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD and find-or-create operations.

use std::str::FromStr;

use omniroute_core::types::ConversationStatus;
use omniroute_core::OmnirouteError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Conversation;

const CONVERSATION_COLUMNS: &str = "id, user_id, channel_id, remote_identifier, lead_id, \
     status, unread_count, metadata, last_message_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, rusqlite::Error> {
    let status: String = row.get(5)?;
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        channel_id: row.get(2)?,
        remote_identifier: row.get(3)?,
        lead_id: row.get(4)?,
        status: ConversationStatus::from_str(&status).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("unknown conversation status `{status}`").into(),
            )
        })?,
        unread_count: row.get(6)?,
        metadata: row.get(7)?,
        last_message_at: row.get(8)?,
    })
}

/// Insert a new conversation.
pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), OmnirouteError> {
    let c = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, channel_id, remote_identifier, lead_id,
                                            status, unread_count, metadata, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    c.id,
                    c.user_id,
                    c.channel_id,
                    c.remote_identifier,
                    c.lead_id,
                    c.status.to_string(),
                    c.unread_count,
                    c.metadata,
                    c.last_message_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a conversation by ID, scoped to a user.
pub async fn get_conversation(
    db: &Database,
    user_id: &str,
    id: &str,
) -> Result<Option<Conversation>, OmnirouteError> {
    let user_id = user_id.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE user_id = ?1 AND id = ?2"
            ))?;
            let result = stmt.query_row(params![user_id, id], row_to_conversation);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a conversation by its provider-side identifier, scoped to a user.
///
/// The remote identifier is unique per `(user_id, channel_id)`, but lookups by
/// raw chat id arrive without a channel; the most recently active match wins.
pub async fn find_by_remote_identifier(
    db: &Database,
    user_id: &str,
    remote_identifier: &str,
) -> Result<Option<Conversation>, OmnirouteError> {
    let user_id = user_id.to_string();
    let remote_identifier = remote_identifier.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE user_id = ?1 AND remote_identifier = ?2
                 ORDER BY last_message_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![user_id, remote_identifier], row_to_conversation);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the conversation for `(user_id, channel_id, remote_identifier)` or
/// create it from the given template.
///
/// `INSERT OR IGNORE` against the unique key makes concurrent find-or-create
/// races converge on one row; the returned conversation is always the stored
/// one. The boolean reports whether this call created the row.
pub async fn find_or_create(
    db: &Database,
    template: &Conversation,
) -> Result<(Conversation, bool), OmnirouteError> {
    let t = template.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO conversations
                     (id, user_id, channel_id, remote_identifier, lead_id,
                      status, unread_count, metadata, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    t.id,
                    t.user_id,
                    t.channel_id,
                    t.remote_identifier,
                    t.lead_id,
                    t.status.to_string(),
                    t.unread_count,
                    t.metadata,
                    t.last_message_at,
                ],
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE user_id = ?1 AND channel_id = ?2 AND remote_identifier = ?3"
            ))?;
            let conversation = stmt.query_row(
                params![t.user_id, t.channel_id, t.remote_identifier],
                row_to_conversation,
            )?;
            Ok((conversation, inserted > 0))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace a conversation's contact metadata blob.
pub async fn update_metadata(
    db: &Database,
    id: &str,
    metadata: &str,
) -> Result<(), OmnirouteError> {
    let id = id.to_string();
    let metadata = metadata.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET metadata = ?1 WHERE id = ?2",
                params![metadata, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Stamp the conversation's last-message time.
pub async fn touch_last_message(
    db: &Database,
    id: &str,
    timestamp: &str,
) -> Result<(), OmnirouteError> {
    let id = id.to_string();
    let timestamp = timestamp.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET last_message_at = ?1 WHERE id = ?2",
                params![timestamp, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Increment the unread counter (inbound messages only).
pub async fn increment_unread(db: &Database, id: &str) -> Result<(), OmnirouteError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET unread_count = unread_count + 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
