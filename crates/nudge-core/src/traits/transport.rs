// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound chat transport trait (WhatsApp bridge, etc.).

use async_trait::async_trait;

use crate::error::NudgeError;
use crate::traits::adapter::PluginAdapter;

/// Delivers rendered text to a transport address (JID).
#[async_trait]
pub trait Transport: PluginAdapter {
    /// Whether the transport can currently deliver messages.
    async fn is_connected(&self) -> bool;

    /// Sends `text` to `jid`. Any error means the message was not delivered.
    async fn send(&self, jid: &str, text: &str) -> Result<(), NudgeError>;
}
