// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Omniroute dispatch engine.
//!
//! Exposes the send and inbound-record operations over a small axum API
//! with bearer-token auth; everything else (CRUD routes, UI, provider
//! webhook verification) lives in the surrounding CRM.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{build_router, start_server, GatewayState};
