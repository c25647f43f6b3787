// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Onboarding tier completion handler.
//!
//! Tier tips are governed by `onboarding_tips_enabled` only; the
//! re-engagement opt-out does not silence them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use nudge_core::ProfileStore;
use nudge_core::types::{MessageType, Params, TierUpdate};

use crate::queue::MessageQueue;

/// What the handler did with a tier update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOutcome {
    /// No tier completed, or no unlock requested.
    Ignored,
    TipsDisabled,
    Queued { tier: u8 },
    /// The unlock message could not be queued.
    NotQueued { tier: u8 },
    /// The tips preference could not be read.
    Failed(String),
}

pub struct TierCompletionHandler {
    profiles: Arc<dyn ProfileStore>,
    queue: MessageQueue,
}

impl TierCompletionHandler {
    pub fn new(profiles: Arc<dyn ProfileStore>, queue: MessageQueue) -> Self {
        Self { profiles, queue }
    }

    /// Queue a `tier_unlock` message for a completed tier. Never fails.
    pub async fn handle_tier_completion(
        &self,
        user_id: &str,
        update: &TierUpdate,
        now: DateTime<Utc>,
    ) -> TierOutcome {
        let Some(tier) = update.unlocked_tier() else {
            return TierOutcome::Ignored;
        };

        match self.profiles.get_onboarding_tips_enabled(user_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(user_id, tier, "onboarding tips disabled, tier unlock not sent");
                return TierOutcome::TipsDisabled;
            }
            Err(e) => {
                error!(user_id, tier, error = %e, "tips preference lookup failed");
                return TierOutcome::Failed(e.to_string());
            }
        }

        let params = Params::from([
            ("tier".to_string(), tier.to_string()),
            ("action".to_string(), update.action.clone()),
        ]);
        let queued = self
            .queue
            .queue_for_user(
                user_id,
                MessageType::TierUnlock,
                &format!("engagement.tier_{tier}_complete"),
                params,
                &format!("tier_{tier}_unlock"),
                now,
            )
            .await;
        if queued {
            info!(user_id, tier, "tier unlock queued");
            TierOutcome::Queued { tier }
        } else {
            TierOutcome::NotQueued { tier }
        }
    }
}

/// Handle a tier update on a detached task.
pub fn spawn_tier_completion(
    handler: Arc<TierCompletionHandler>,
    user_id: String,
    update: TierUpdate,
    now: DateTime<Utc>,
) -> JoinHandle<TierOutcome> {
    tokio::spawn(async move { handler.handle_tier_completion(&user_id, &update, now).await })
}
