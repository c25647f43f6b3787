// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enqueue side of the outbound message queue.
//!
//! Every message carries an idempotency key of the form
//! `{user_id}:{scope}:{YYYY-MM-DD}`; the store ignores inserts whose key
//! already exists, so re-running a job on the same day queues nothing new.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use nudge_core::types::{Destination, MessageType, NewQueuedMessage, Params, QueueStats};
use nudge_core::{NudgeError, ProfileStore, QueueStore};

use crate::metrics;

/// Deterministic idempotency key for a user, a scope and the UTC date of `at`.
pub fn idempotency_key(user_id: &str, scope: &str, at: DateTime<Utc>) -> String {
    format!("{user_id}:{scope}:{}", at.format("%Y-%m-%d"))
}

/// A message to enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub user_id: String,
    pub message_type: MessageType,
    pub message_key: String,
    pub message_params: Params,
    pub destination: Destination,
    pub destination_jid: String,
    pub scheduled_for: DateTime<Utc>,
    /// Explicit key; defaults to `{user_id}:{message_type}:{date}`.
    pub idempotency_key: Option<String>,
}

/// Idempotent producer for the outbound queue.
#[derive(Clone)]
pub struct MessageQueue {
    store: Arc<dyn QueueStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl MessageQueue {
    pub fn new(store: Arc<dyn QueueStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { store, profiles }
    }

    /// Insert a message unless one with the same idempotency key exists.
    ///
    /// Returns `true` whether the row was new or already present, and
    /// `false` only when persistence failed. Failures are logged here.
    pub async fn queue_message(&self, request: QueueRequest) -> bool {
        let user_id = request.user_id.clone();
        let message_type = request.message_type;
        match self.enqueue(request).await {
            Ok(()) => true,
            Err(e) => {
                error!(user_id = %user_id, %message_type, error = %e, "failed to queue message");
                false
            }
        }
    }

    /// Like [`queue_message`](Self::queue_message), but surfaces the
    /// persistence error to the caller.
    pub async fn enqueue(&self, request: QueueRequest) -> Result<(), NudgeError> {
        let key = request.idempotency_key.clone().unwrap_or_else(|| {
            idempotency_key(
                &request.user_id,
                request.message_type.as_ref(),
                request.scheduled_for,
            )
        });
        let message = NewQueuedMessage {
            user_id: request.user_id,
            message_type: request.message_type,
            message_key: request.message_key,
            message_params: request.message_params,
            destination: request.destination,
            destination_jid: request.destination_jid,
            scheduled_for: request.scheduled_for,
            idempotency_key: key,
        };

        if self.store.insert_message(&message).await? {
            debug!(
                user_id = %message.user_id,
                message_type = %message.message_type,
                idempotency_key = %message.idempotency_key,
                "message queued"
            );
            metrics::message_queued(message.message_type);
        } else {
            debug!(
                idempotency_key = %message.idempotency_key,
                "message already queued, skipping"
            );
        }
        Ok(())
    }

    /// Queue a message addressed through the user's profile.
    ///
    /// The JID stored with the row is the preferred one, falling back to the
    /// individual chat. Returns `false` when no JID is known or the insert
    /// failed; both are logged.
    pub async fn queue_for_user(
        &self,
        user_id: &str,
        message_type: MessageType,
        message_key: &str,
        message_params: Params,
        scope: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match self
            .enqueue_for_user(user_id, message_type, message_key, message_params, scope, now)
            .await
        {
            Ok(()) => true,
            Err(e @ NudgeError::Undeliverable { .. }) => {
                warn!(user_id, %message_type, error = %e, "message not queued");
                false
            }
            Err(e) => {
                error!(user_id, %message_type, error = %e, "failed to queue message");
                false
            }
        }
    }

    /// Queue a message addressed through the user's profile.
    ///
    /// Fails with [`NudgeError::Undeliverable`] when the user has no profile
    /// or no JID, and with the store's error when the lookup or insert fails.
    pub async fn enqueue_for_user(
        &self,
        user_id: &str,
        message_type: MessageType,
        message_key: &str,
        message_params: Params,
        scope: &str,
        now: DateTime<Utc>,
    ) -> Result<(), NudgeError> {
        let Some(profile) = self.profiles.get_profile(user_id).await? else {
            return Err(NudgeError::Undeliverable {
                user_id: user_id.to_string(),
                reason: "no profile".to_string(),
            });
        };
        let target = profile
            .preferred_jid()
            .map(|jid| (profile.preferred_destination, jid.to_string()))
            .or_else(|| {
                profile
                    .individual_jid
                    .clone()
                    .map(|jid| (Destination::Individual, jid))
            });
        let Some((destination, destination_jid)) = target else {
            return Err(NudgeError::Undeliverable {
                user_id: user_id.to_string(),
                reason: "no JID on profile".to_string(),
            });
        };

        self.enqueue(QueueRequest {
            user_id: user_id.to_string(),
            message_type,
            message_key: message_key.to_string(),
            message_params,
            destination,
            destination_jid,
            scheduled_for: now,
            idempotency_key: Some(idempotency_key(user_id, scope, now)),
        })
        .await
    }

    /// Message counts per status.
    pub async fn stats(&self) -> Result<QueueStats, NudgeError> {
        self.store.queue_stats().await
    }
}
