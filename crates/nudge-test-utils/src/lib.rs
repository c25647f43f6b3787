// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Nudge integration tests.
//!
//! Provides fakes for every collaborator of the engagement engine so job
//! behavior can be tested deterministically without SQLite or a bridge.
//!
//! # Components
//!
//! - [`InMemoryStore`] - engagement, activity, profile and queue store with failure injection
//! - [`MockTransport`] - transport that captures sends and can be disconnected or made to fail
//! - [`temp_storage`] - migrated SQLite storage in a temporary directory

pub mod harness;
pub mod memory_store;
pub mod mock_transport;

pub use harness::temp_storage;
pub use memory_store::InMemoryStore;
pub use mock_transport::{MockTransport, SentMessage};
