// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Nudge engagement engine.

use thiserror::Error;

/// The primary error type used across all Nudge adapter traits and core operations.
///
/// Invalid state machine transitions are *not* represented here: they are an
/// expected outcome and travel as a value inside the transition result.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Outbound transport errors (disconnected socket, rejected delivery).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A record the operation depends on does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A message cannot be addressed to the user.
    #[error("no delivery route for {user_id}: {reason}")]
    Undeliverable { user_id: String, reason: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NudgeError {
    /// Shorthand for a storage error built from a plain message.
    pub fn storage(message: impl Into<String>) -> Self {
        NudgeError::Storage {
            source: message.into().into(),
        }
    }

    /// Shorthand for a transport error without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        NudgeError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for the not-found variant, which callers treat as a skip.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NudgeError::NotFound { .. })
    }
}
