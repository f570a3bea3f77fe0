// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.

pub mod channels;
pub mod conversations;
pub mod leads;
pub mod messages;
pub mod webhooks;
