// SPDX-FileCopyrightText: 2026 Omniroute Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Omniroute integration tests.
//!
//! Provides a temp-database store harness and entity fixtures for fast,
//! deterministic, CI-runnable tests without external services.

pub mod harness;

pub use harness::{fixtures, TestStore};
