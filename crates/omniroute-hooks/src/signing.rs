// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC signing of webhook payloads.
//!
//! Receivers verify `X-Webhook-Signature` by recomputing the HMAC-SHA256 of
//! the exact request body with the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the signature header value for `body`: `sha256=<hmac-hex>`.
pub fn signature_header(secret: &str, body: &str) -> String {
    format!("sha256={}", sign_payload(secret, body))
}

/// HMAC-SHA256 of `body` keyed by `secret`, hex-encoded.
pub fn sign_payload(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
