// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel CRUD operations.

use std::str::FromStr;

use omniroute_core::types::ChannelType;
use omniroute_core::OmnirouteError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Channel;

fn row_to_channel(row: &rusqlite::Row<'_>) -> Result<Channel, rusqlite::Error> {
    let channel_type: String = row.get(2)?;
    Ok(Channel {
        id: row.get(0)?,
        user_id: row.get(1)?,
        channel_type: ChannelType::from_str(&channel_type).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown channel type `{channel_type}`").into(),
            )
        })?,
        name: row.get(3)?,
        status: row.get(4)?,
        credentials: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const CHANNEL_COLUMNS: &str =
    "id, user_id, channel_type, name, status, credentials, created_at";

/// Insert a new channel.
pub async fn create_channel(db: &Database, channel: &Channel) -> Result<(), OmnirouteError> {
    let channel = channel.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channels (id, user_id, channel_type, name, status, credentials, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    channel.id,
                    channel.user_id,
                    channel.channel_type.to_string(),
                    channel.name,
                    channel.status,
                    channel.credentials,
                    channel.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a channel by ID.
pub async fn get_channel(db: &Database, id: &str) -> Result<Option<Channel>, OmnirouteError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_channel);
            match result {
                Ok(channel) => Ok(Some(channel)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a user's oldest connected channel among the given types.
///
/// Used as the default channel when a phone number or lead resolves without
/// an existing conversation.
pub async fn find_first_by_types(
    db: &Database,
    user_id: &str,
    types: &[ChannelType],
) -> Result<Option<Channel>, OmnirouteError> {
    let user_id = user_id.to_string();
    let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels
                 WHERE user_id = ?1 AND status = 'connected'
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_channel)?;
            for row in rows {
                let channel = row?;
                if types.contains(&channel.channel_type.to_string()) {
                    return Ok(Some(channel));
                }
            }
            Ok(None)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite a channel's credential blob.
///
/// Used to persist a lazily discovered `page_id` so subsequent sends skip
/// the discovery round-trip.
pub async fn update_channel_credentials(
    db: &Database,
    id: &str,
    credentials: &str,
) -> Result<(), OmnirouteError> {
    let id = id.to_string();
    let credentials = credentials.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE channels SET credentials = ?1 WHERE id = ?2",
                params![credentials, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::now_iso;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_channel(id: &str, channel_type: ChannelType, credentials: &str) -> Channel {
        Channel {
            id: id.to_string(),
            user_id: "u-1".to_string(),
            channel_type,
            name: "Main line".to_string(),
            status: "connected".to_string(),
            credentials: credentials.to_string(),
            created_at: now_iso(),
        }
    }

    #[tokio::test]
    async fn create_and_get_channel() {
        let (db, _dir) = setup_db().await;

        let channel = make_channel("ch-1", ChannelType::Telegram, r#"{"bot_token":"123:abc"}"#);
        create_channel(&db, &channel).await.unwrap();

        let loaded = get_channel(&db, "ch-1").await.unwrap().unwrap();
        assert_eq!(loaded.channel_type, ChannelType::Telegram);
        assert_eq!(loaded.credentials, r#"{"bot_token":"123:abc"}"#);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_channel_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_channel(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_first_by_types_prefers_oldest_connected() {
        let (db, _dir) = setup_db().await;

        let mut telegram = make_channel("ch-tg", ChannelType::Telegram, r#"{"bot_token":"t"}"#);
        telegram.created_at = "2026-01-01T00:00:00.000Z".to_string();
        create_channel(&db, &telegram).await.unwrap();

        let mut wa = make_channel("ch-wa", ChannelType::Whatsapp, r#"{"instance_id":"i"}"#);
        wa.created_at = "2026-01-02T00:00:00.000Z".to_string();
        create_channel(&db, &wa).await.unwrap();

        let mut disconnected =
            make_channel("ch-wa-off", ChannelType::Whatsapp, r#"{"instance_id":"j"}"#);
        disconnected.status = "disconnected".to_string();
        disconnected.created_at = "2026-01-01T00:00:00.000Z".to_string();
        create_channel(&db, &disconnected).await.unwrap();

        let found = find_first_by_types(
            &db,
            "u-1",
            &[ChannelType::Whatsapp, ChannelType::WhatsappCloud],
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(found.id, "ch-wa");

        let none = find_first_by_types(&db, "u-1", &[ChannelType::Instagram])
            .await
            .unwrap();
        assert!(none.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_credentials_persists_discovered_page_id() {
        let (db, _dir) = setup_db().await;

        let channel = make_channel("ch-ig", ChannelType::Instagram, r#"{"access_token":"EAAB"}"#);
        create_channel(&db, &channel).await.unwrap();

        update_channel_credentials(&db, "ch-ig", r#"{"access_token":"EAAB","page_id":"991"}"#)
            .await
            .unwrap();

        let loaded = get_channel(&db, "ch-ig").await.unwrap().unwrap();
        assert!(loaded.credentials.contains("\"page_id\":\"991\""));

        db.close().await.unwrap();
    }
}
