// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Omniroute messaging gateway.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed CRUD operations for
//! channels, conversations, leads, messages, and user webhooks.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{now_iso, Database};
pub use models::*;
