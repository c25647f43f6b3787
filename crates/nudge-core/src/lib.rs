// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Nudge engagement engine.
//!
//! Provides the error type, the domain types of the engagement lifecycle,
//! and the adapter traits every collaborator (storage, transport,
//! localization) implements.

pub mod error;
pub mod traits;
pub mod types;

pub use error::NudgeError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    ActivityLog, EngagementStore, Localizer, PluginAdapter, ProfileStore, QueueStore,
    StorageAdapter, Transport,
};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;
    use strum::IntoEnumIterator;

    use super::types::*;

    #[test]
    fn trigger_names_match_audit_log_format() {
        assert_eq!(Trigger::Inactivity14d.to_string(), "inactivity_14d");
        assert_eq!(Trigger::GoodbyeResponse2.to_string(), "goodbye_response_2");
        assert_eq!(
            Trigger::from_str("goodbye_timeout").unwrap(),
            Trigger::GoodbyeTimeout
        );
        assert_eq!(
            serde_json::to_string(&Trigger::UserMessage).unwrap(),
            "\"user_message\""
        );
    }

    #[test]
    fn lifecycle_state_names_are_snake_case() {
        let names: Vec<String> = LifecycleState::iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["active", "goodbye_sent", "remind_later", "dormant"]);
    }

    #[test]
    fn message_type_and_status_parse() {
        assert_eq!(MessageType::TierUnlock.as_ref(), "tier_unlock");
        assert_eq!(
            MessageType::from_str("weekly_review").unwrap(),
            MessageType::WeeklyReview
        );
        assert_eq!(QueueStatus::from_str("failed").unwrap(), QueueStatus::Failed);
        assert!(Destination::from_str("broadcast").is_err());
    }

    #[test]
    fn tier_update_unlocks_only_when_flagged() {
        let update = TierUpdate {
            action: "add_category".into(),
            tier_completed: Some(2),
            should_send_unlock: true,
        };
        assert_eq!(update.unlocked_tier(), Some(2));
        let quiet = TierUpdate {
            should_send_unlock: false,
            ..update.clone()
        };
        assert_eq!(quiet.unlocked_tier(), None);
        let partial = TierUpdate {
            tier_completed: None,
            ..update
        };
        assert_eq!(partial.unlocked_tier(), None);
    }

    #[test]
    fn preferred_jid_follows_preference() {
        let mut profile = UserProfile {
            user_id: "u1".into(),
            locale: "en".into(),
            preferred_destination: Destination::Individual,
            individual_jid: Some("5511@s.whatsapp.net".into()),
            group_jid: None,
            reengagement_opt_out: false,
            onboarding_tips_enabled: true,
        };
        assert_eq!(profile.preferred_jid(), Some("5511@s.whatsapp.net"));
        profile.preferred_destination = Destination::Group;
        assert_eq!(profile.preferred_jid(), None);
    }

    fn any_state() -> impl Strategy<Value = LifecycleState> {
        prop::sample::select(LifecycleState::iter().collect::<Vec<_>>())
    }

    proptest! {
        #[test]
        fn fresh_records_are_consistent(user in "[a-z0-9]{1,12}", secs in 0i64..4_000_000_000) {
            let at = chrono::DateTime::from_timestamp(secs, 0).unwrap();
            let state = EngagementState::new_active(user, at);
            prop_assert!(state.is_consistent());
        }

        #[test]
        fn remind_at_outside_remind_later_is_inconsistent(
            state in any_state().prop_filter("remind_later owns remind_at", |s| *s != LifecycleState::RemindLater)
        ) {
            let now = chrono::Utc::now();
            let mut record = EngagementState::new_active("u", now);
            record.state = state;
            record.remind_at = Some(now);
            prop_assert_eq!(record.is_consistent(), false);
        }
    }
}
