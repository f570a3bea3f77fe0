// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use omniroute_core::OmnirouteError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite database.
///
/// Wraps a single `tokio_rusqlite::Connection`; all query modules accept
/// `&Database` and go through [`Database::connection`], which serializes
/// every closure on one background thread and eliminates SQLITE_BUSY under
/// concurrent access.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, OmnirouteError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(OmnirouteError::storage)?;
        }

        // Refinery needs a plain rusqlite connection; migrate before handing
        // the file to the async single-writer.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), OmnirouteError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(OmnirouteError::storage)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| OmnirouteError::Internal(format!("migration task panicked: {e}")))??;

        let conn = Connection::open(path).await.map_err(OmnirouteError::storage)?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection (the single writer).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), OmnirouteError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        debug!("database closed");
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(err: tokio_rusqlite::Error) -> OmnirouteError {
    OmnirouteError::Storage {
        source: Box::new(err),
    }
}

/// Current UTC time in the ISO 8601 format used for all stored timestamps.
pub fn now_iso() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
