// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Localization lookup for queued message keys.

use crate::types::Params;

/// Resolves a message key and its parameters to user-facing text.
pub trait Localizer: Send + Sync {
    /// Renders `key` for `locale`.
    ///
    /// Must never fail: unknown keys render as a visibly marked placeholder.
    fn resolve(&self, key: &str, params: &Params, locale: &str) -> String;
}
