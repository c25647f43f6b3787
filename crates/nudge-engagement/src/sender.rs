// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drain side of the outbound queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use nudge_core::types::{QueueStatus, QueuedMessage};
use nudge_core::{Localizer, NudgeError, ProfileStore, QueueStore, Transport};

use crate::destination::DestinationResolver;
use crate::metrics;
use crate::settings::EngagementSettings;

/// Aggregate counts of one queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessResult {
    pub processed: usize,
    pub succeeded: usize,
    /// Messages that exhausted their retries in this run.
    pub failed: usize,
    /// Messages that failed but stay pending for another attempt.
    pub retry_scheduled: usize,
    pub errors: Vec<String>,
}

/// Sends due messages one at a time through a [`Transport`].
pub struct QueueProcessor {
    queue: Arc<dyn QueueStore>,
    profiles: Arc<dyn ProfileStore>,
    transport: Arc<dyn Transport>,
    localizer: Arc<dyn Localizer>,
    resolver: DestinationResolver,
    settings: EngagementSettings,
}

impl QueueProcessor {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        profiles: Arc<dyn ProfileStore>,
        transport: Arc<dyn Transport>,
        localizer: Arc<dyn Localizer>,
        settings: EngagementSettings,
    ) -> Self {
        Self {
            resolver: DestinationResolver::new(Arc::clone(&profiles)),
            queue,
            profiles,
            transport,
            localizer,
            settings,
        }
    }

    /// Deliver pending messages scheduled at or before `now`.
    ///
    /// Returns all-zero counts when the transport is disconnected. Only a
    /// failure to fetch the batch is an error; per-message failures are
    /// recorded against the message and counted. Each message is claimed
    /// before sending, and messages another processor claimed first are
    /// left alone.
    pub async fn process_message_queue(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ProcessResult, NudgeError> {
        if !self.transport.is_connected().await {
            warn!("transport not connected, skipping queue processing");
            return Ok(ProcessResult::default());
        }

        let batch = self.queue.fetch_due(now, self.settings.batch_size).await?;
        let mut result = ProcessResult::default();

        let lease_until = now + self.settings.claim_lease;
        let mut attempted = false;
        for message in &batch {
            match self.queue.claim_message(message.id, now, lease_until).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(message_id = message.id, "message claimed elsewhere, skipped");
                    continue;
                }
                Err(e) => {
                    error!(message_id = message.id, error = %e, "message claim failed");
                    result
                        .errors
                        .push(format!("message {}: claim: {e}", message.id));
                    continue;
                }
            }
            if attempted && !self.settings.send_delay.is_zero() {
                tokio::time::sleep(self.settings.send_delay).await;
            }
            attempted = true;
            result.processed += 1;
            match self.deliver(message).await {
                Ok(()) => {
                    result.succeeded += 1;
                    metrics::delivery(message.message_type, "sent");
                    if let Err(e) = self.queue.mark_sent(message.id, now).await {
                        error!(message_id = message.id, error = %e, "sent message could not be marked");
                        result
                            .errors
                            .push(format!("message {}: mark sent: {e}", message.id));
                    }
                }
                Err(e) => self.handle_failure(message, &e, &mut result).await,
            }
        }

        if result.processed > 0 {
            info!(
                processed = result.processed,
                succeeded = result.succeeded,
                failed = result.failed,
                retry_scheduled = result.retry_scheduled,
                "queue processed"
            );
        }
        Ok(result)
    }

    async fn deliver(&self, message: &QueuedMessage) -> Result<(), NudgeError> {
        let target = self.resolver.resolve(message).await?;
        let locale = match self.profiles.get_locale(&message.user_id).await {
            Ok(Some(locale)) => locale,
            Ok(None) => self.settings.default_locale.clone(),
            Err(e) => {
                debug!(user_id = %message.user_id, error = %e, "locale lookup failed, using default");
                self.settings.default_locale.clone()
            }
        };
        let text = self
            .localizer
            .resolve(&message.message_key, &message.message_params, &locale);

        self.transport.send(&target.jid, &text).await?;
        debug!(
            message_id = message.id,
            user_id = %message.user_id,
            destination = %target.destination,
            fallback_used = target.fallback_used,
            "message sent"
        );
        Ok(())
    }

    async fn handle_failure(
        &self,
        message: &QueuedMessage,
        cause: &NudgeError,
        result: &mut ProcessResult,
    ) {
        let reason = cause.to_string();
        match self
            .queue
            .record_failure(message.id, &reason, self.settings.max_retries)
            .await
        {
            Ok(QueueStatus::Failed) => {
                error!(
                    message_id = message.id,
                    user_id = %message.user_id,
                    error = %reason,
                    "message delivery failed permanently"
                );
                metrics::delivery(message.message_type, "failed");
                result.failed += 1;
                result
                    .errors
                    .push(format!("message {} ({}): {reason}", message.id, message.user_id));
            }
            Ok(_) => {
                warn!(
                    message_id = message.id,
                    user_id = %message.user_id,
                    attempt = message.retry_count + 1,
                    error = %reason,
                    "message delivery failed, will retry"
                );
                metrics::delivery(message.message_type, "retry");
                result.retry_scheduled += 1;
            }
            Err(e) => {
                error!(message_id = message.id, error = %e, "failed to record delivery failure");
                result.failed += 1;
                result
                    .errors
                    .push(format!("message {}: record failure: {e}", message.id));
            }
        }
    }
}
