// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead lookups for the dispatch path.
//!
//! Leads are owned by the CRM store; the dispatch engine only reads them
//! during identifier resolution and stamps `last_contact_at` after a send.

use omniroute_core::OmnirouteError;
use rusqlite::params;

use crate::database::Database;
use crate::models::Lead;

fn row_to_lead(row: &rusqlite::Row<'_>) -> Result<Lead, rusqlite::Error> {
    Ok(Lead {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        last_contact_at: row.get(4)?,
    })
}

/// Insert a lead (test seeding and CRM sync).
pub async fn create_lead(db: &Database, lead: &Lead) -> Result<(), OmnirouteError> {
    let lead = lead.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO leads (id, user_id, name, phone, last_contact_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![lead.id, lead.user_id, lead.name, lead.phone, lead.last_contact_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a lead by ID, scoped to a user.
pub async fn get_lead(
    db: &Database,
    user_id: &str,
    id: &str,
) -> Result<Option<Lead>, OmnirouteError> {
    let user_id = user_id.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, name, phone, last_contact_at
                 FROM leads WHERE user_id = ?1 AND id = ?2",
            )?;
            let result = stmt.query_row(params![user_id, id], row_to_lead);
            match result {
                Ok(lead) => Ok(Some(lead)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Stamp the lead's last outbound contact time.
pub async fn touch_last_contact(
    db: &Database,
    id: &str,
    timestamp: &str,
) -> Result<(), OmnirouteError> {
    let id = id.to_string();
    let timestamp = timestamp.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE leads SET last_contact_at = ?1 WHERE id = ?2",
                params![timestamp, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
