// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database` and runs on the
//! single tokio-rusqlite connection thread.

pub mod activity;
pub mod engagement;
pub mod profiles;
pub mod queue;
