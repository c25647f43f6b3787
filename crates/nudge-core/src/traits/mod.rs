// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the engagement engine's collaborators.
//!
//! Every component receives its data access through these traits, so a job
//! run can be wired against SQLite in production and an in-memory fake in
//! tests. All async traits use `#[async_trait]` for dynamic dispatch.

pub mod activity;
pub mod adapter;
pub mod engagement;
pub mod localizer;
pub mod profile;
pub mod queue;
pub mod storage;
pub mod transport;

pub use activity::ActivityLog;
pub use adapter::PluginAdapter;
pub use engagement::EngagementStore;
pub use localizer::Localizer;
pub use profile::ProfileStore;
pub use queue::QueueStore;
pub use storage::StorageAdapter;
pub use transport::Transport;
