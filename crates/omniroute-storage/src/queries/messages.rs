// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use std::str::FromStr;

use omniroute_core::types::{ChannelType, Direction, MessageStatus};
use omniroute_core::OmnirouteError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Message;

const MESSAGE_COLUMNS: &str = "id, conversation_id, direction, channel_type, content, \
     media_url, media_type, status, external_id, metadata, sent_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    let direction: String = row.get(2)?;
    let channel_type: String = row.get(3)?;
    let status: String = row.get(7)?;
    let bad_text = |idx: usize, detail: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            detail.into(),
        )
    };
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        direction: Direction::from_str(&direction)
            .map_err(|_| bad_text(2, format!("unknown direction `{direction}`")))?,
        channel_type: ChannelType::from_str(&channel_type)
            .map_err(|_| bad_text(3, format!("unknown channel type `{channel_type}`")))?,
        content: row.get(4)?,
        media_url: row.get(5)?,
        media_type: row.get(6)?,
        status: MessageStatus::from_str(&status)
            .map_err(|_| bad_text(7, format!("unknown status `{status}`")))?,
        external_id: row.get(8)?,
        metadata: row.get(9)?,
        sent_at: row.get(10)?,
    })
}

/// Insert a new message.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), OmnirouteError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, direction, channel_type, content,
                                       media_url, media_type, status, external_id, metadata, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.direction.to_string(),
                    msg.channel_type.to_string(),
                    msg.content,
                    msg.media_url,
                    msg.media_type,
                    msg.status.to_string(),
                    msg.external_id,
                    msg.metadata,
                    msg.sent_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get messages for a conversation in chronological order.
pub async fn get_messages_for_conversation(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, OmnirouteError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match limit {
                Some(lim) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                         ORDER BY sent_at ASC LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![conversation_id, lim], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1
                         ORDER BY sent_at ASC"
                    ))?;
                    let rows = stmt.query_map(params![conversation_id], row_to_message)?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a provider-driven status transition to a message.
pub async fn update_message_status(
    db: &Database,
    id: &str,
    status: MessageStatus,
) -> Result<(), OmnirouteError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
