// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send-time destination resolution.
//!
//! A queued message records the JID known at enqueue time, but the user may
//! have switched between individual and group delivery since. The resolver
//! walks an ordered chain of steps; the first hit wins and each miss is
//! logged with its reason.

use std::sync::Arc;

use strum::{AsRefStr, Display};
use tracing::{debug, warn};

use nudge_core::types::{Destination, QueuedMessage};
use nudge_core::{NudgeError, ProfileStore};

/// One link of the resolver chain, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ResolverStep {
    /// The user's current preference from the profile store.
    PreferredDestination,
    /// The individual chat JID on the profile.
    ProfileIndividual,
    /// The JID stored on the queue row.
    QueuedJid,
}

const CHAIN: [ResolverStep; 3] = [
    ResolverStep::PreferredDestination,
    ResolverStep::ProfileIndividual,
    ResolverStep::QueuedJid,
];

/// Where a message will actually be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    pub destination: Destination,
    pub jid: String,
    pub step: ResolverStep,
    /// `true` when the preferred destination could not be used.
    pub fallback_used: bool,
}

pub struct DestinationResolver {
    profiles: Arc<dyn ProfileStore>,
}

impl DestinationResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// Resolve the delivery target for `message`.
    ///
    /// Fails with `NotFound` only when every step misses.
    pub async fn resolve(&self, message: &QueuedMessage) -> Result<ResolvedDestination, NudgeError> {
        for step in CHAIN {
            match self.try_step(step, message).await {
                Ok((destination, jid)) => {
                    let fallback_used = step != ResolverStep::PreferredDestination;
                    debug!(
                        message_id = message.id,
                        user_id = %message.user_id,
                        %step,
                        %destination,
                        fallback_used,
                        "destination resolved"
                    );
                    return Ok(ResolvedDestination {
                        destination,
                        jid,
                        step,
                        fallback_used,
                    });
                }
                Err(reason) => {
                    warn!(
                        message_id = message.id,
                        user_id = %message.user_id,
                        %step,
                        reason = %reason,
                        "destination step missed"
                    );
                }
            }
        }
        Err(NudgeError::NotFound {
            entity: "destination",
            id: message.user_id.clone(),
        })
    }

    async fn try_step(
        &self,
        step: ResolverStep,
        message: &QueuedMessage,
    ) -> Result<(Destination, String), String> {
        match step {
            ResolverStep::PreferredDestination => {
                let preferred = self
                    .profiles
                    .get_preferred_destination(&message.user_id)
                    .await
                    .map_err(|e| format!("preference lookup failed: {e}"))?
                    .ok_or("no profile")?;
                let jid = non_empty(preferred.jid)
                    .ok_or_else(|| format!("no jid for {} delivery", preferred.destination))?;
                Ok((preferred.destination, jid))
            }
            ResolverStep::ProfileIndividual => {
                let profile = self
                    .profiles
                    .get_profile(&message.user_id)
                    .await
                    .map_err(|e| format!("profile lookup failed: {e}"))?
                    .ok_or("no profile")?;
                let jid = non_empty(profile.individual_jid).ok_or("no individual jid")?;
                Ok((Destination::Individual, jid))
            }
            ResolverStep::QueuedJid => {
                let jid = non_empty(Some(message.destination_jid.clone()))
                    .ok_or("queued jid is empty")?;
                Ok((message.destination, jid))
            }
        }
    }
}

fn non_empty(jid: Option<String>) -> Option<String> {
    jid.filter(|j| !j.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nudge_core::types::{MessageType, Params, QueueStatus, UserProfile};
    use nudge_test_utils::InMemoryStore;

    fn message(user_id: &str, queued_jid: &str) -> QueuedMessage {
        let at = Utc.with_ymd_and_hms(2026, 3, 20, 10, 0, 0).unwrap();
        QueuedMessage {
            id: 1,
            user_id: user_id.into(),
            message_type: MessageType::WeeklyReview,
            message_key: "engagement.weekly_review".into(),
            message_params: Params::new(),
            destination: Destination::Individual,
            destination_jid: queued_jid.into(),
            scheduled_for: at,
            status: QueueStatus::Pending,
            retry_count: 0,
            idempotency_key: format!("{user_id}:weekly_review:2026-03-20"),
            sent_at: None,
            error_message: None,
            created_at: at,
        }
    }

    fn profile(preferred: Destination, individual: Option<&str>, group: Option<&str>) -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            locale: "pt-BR".into(),
            preferred_destination: preferred,
            individual_jid: individual.map(str::to_string),
            group_jid: group.map(str::to_string),
            reengagement_opt_out: false,
            onboarding_tips_enabled: true,
        }
    }

    fn resolver(store: &InMemoryStore) -> DestinationResolver {
        DestinationResolver::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn current_group_preference_wins_over_queued_jid() {
        let store = InMemoryStore::new();
        store
            .seed_profile(profile(Destination::Group, Some("u1@s.whatsapp.net"), Some("fam@g.us")))
            .await;

        let resolved = resolver(&store)
            .resolve(&message("u1", "u1@s.whatsapp.net"))
            .await
            .unwrap();
        assert_eq!(resolved.destination, Destination::Group);
        assert_eq!(resolved.jid, "fam@g.us");
        assert_eq!(resolved.step, ResolverStep::PreferredDestination);
        assert!(!resolved.fallback_used);
    }

    #[tokio::test]
    async fn missing_group_jid_falls_back_to_individual() {
        let store = InMemoryStore::new();
        store
            .seed_profile(profile(Destination::Group, Some("u1@s.whatsapp.net"), None))
            .await;

        let resolved = resolver(&store).resolve(&message("u1", "old@s.whatsapp.net")).await.unwrap();
        assert_eq!(resolved.step, ResolverStep::ProfileIndividual);
        assert_eq!(resolved.jid, "u1@s.whatsapp.net");
        assert!(resolved.fallback_used);
    }

    #[tokio::test]
    async fn no_profile_uses_queued_jid() {
        let store = InMemoryStore::new();
        let resolved = resolver(&store).resolve(&message("u1", "u1@s.whatsapp.net")).await.unwrap();
        assert_eq!(resolved.step, ResolverStep::QueuedJid);
        assert!(resolved.fallback_used);
    }

    #[tokio::test]
    async fn every_step_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = resolver(&store).resolve(&message("u1", " ")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
