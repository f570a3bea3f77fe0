// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation routing and dispatch engine.
//!
//! Ties the three resolution stages together: [`identity`] classifies and
//! resolves opaque recipient identifiers, [`credentials`] decodes channel
//! credentials (with lazy Meta page discovery), and [`dispatcher`]
//! orchestrates adapter selection, delivery, persistence, and webhook
//! events.

pub mod credentials;
pub mod dispatcher;
pub mod identity;

pub use credentials::CredentialResolver;
pub use dispatcher::{InboundContent, MessageDispatcher};
pub use identity::{classify, extract_phone, normalize_to_jid, IdentityResolver, Resolution};
