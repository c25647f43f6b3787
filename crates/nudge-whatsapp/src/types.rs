// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge wire types.

use serde::{Deserialize, Serialize};

/// Body of `GET /status`.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeStatus {
    pub connected: bool,
}

/// Body of `POST /send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendRequest<'a> {
    pub jid: &'a str,
    pub text: &'a str,
}

/// Error body returned by the bridge on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeError {
    pub error: String,
}
