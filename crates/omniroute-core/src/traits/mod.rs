// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions shared across the workspace.

pub mod channel;

pub use channel::ChannelAdapter;
