// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and the engagement engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// --- Lifecycle constants ---

/// Days without activity before a user is sent a goodbye message.
pub const INACTIVITY_THRESHOLD_DAYS: u32 = 14;

/// Hours a user has to answer a goodbye message before going dormant.
pub const GOODBYE_WINDOW_HOURS: u32 = 48;

/// Days a "remind me later" answer postpones the follow-up.
pub const REMIND_LATER_DAYS: u32 = 14;

/// Rolling window used to decide who gets a weekly review.
pub const ACTIVE_WINDOW_DAYS: u32 = 7;

/// Delivery attempts before a queued message is marked failed.
pub const MAX_SEND_RETRIES: u32 = 3;

/// Maximum queue entries drained in a single processor run.
pub const QUEUE_BATCH_SIZE: usize = 100;

/// Pause between two consecutive sends, in milliseconds.
pub const SEND_DELAY_MS: u64 = 500;

/// How long a queue processor holds a message it claimed for sending.
pub const SEND_CLAIM_LEASE_SECS: i64 = 600;

/// Free-form string parameters (transition metadata, localization params).
pub type Params = BTreeMap<String, String>;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
    Observability,
}

/// Engagement lifecycle state of a single user.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    GoodbyeSent,
    RemindLater,
    Dormant,
}

/// Event that asks the state machine to move a user to another state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum Trigger {
    #[strum(serialize = "inactivity_14d")]
    #[serde(rename = "inactivity_14d")]
    Inactivity14d,
    #[strum(serialize = "goodbye_timeout")]
    #[serde(rename = "goodbye_timeout")]
    GoodbyeTimeout,
    #[strum(serialize = "reminder_due")]
    #[serde(rename = "reminder_due")]
    ReminderDue,
    /// "I'm confused, help me" answer to the goodbye message.
    #[strum(serialize = "goodbye_response_1")]
    #[serde(rename = "goodbye_response_1")]
    GoodbyeResponse1,
    /// "I'm busy, remind me later" answer to the goodbye message.
    #[strum(serialize = "goodbye_response_2")]
    #[serde(rename = "goodbye_response_2")]
    GoodbyeResponse2,
    /// "All good, no thanks" answer to the goodbye message.
    #[strum(serialize = "goodbye_response_3")]
    #[serde(rename = "goodbye_response_3")]
    GoodbyeResponse3,
    /// The user wrote to the bot on their own.
    #[strum(serialize = "user_message")]
    #[serde(rename = "user_message")]
    UserMessage,
    /// Operator-initiated reactivation.
    #[strum(serialize = "manual")]
    #[serde(rename = "manual")]
    Manual,
}

/// Kind of outbound message held in the queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Goodbye,
    TierUnlock,
    WeeklyReview,
    Reminder,
}

/// Where a user wants bot messages delivered.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    #[default]
    Individual,
    Group,
}

/// Delivery status of a queued message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Sent,
    Failed,
}

/// Persisted engagement record, one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementState {
    pub user_id: String,
    pub state: LifecycleState,
    pub last_activity_at: DateTime<Utc>,
    pub goodbye_sent_at: Option<DateTime<Utc>>,
    pub goodbye_expires_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl EngagementState {
    /// A fresh `active` record for a user seen for the first time.
    pub fn new_active(user_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            state: LifecycleState::Active,
            last_activity_at: at,
            goodbye_sent_at: None,
            goodbye_expires_at: None,
            remind_at: None,
            updated_at: at,
        }
    }

    /// Checks that expiration fields match the current state.
    pub fn is_consistent(&self) -> bool {
        match self.state {
            LifecycleState::GoodbyeSent => {
                self.goodbye_expires_at.is_some()
                    && self.goodbye_sent_at.is_some()
                    && self.remind_at.is_none()
            }
            LifecycleState::RemindLater => {
                self.remind_at.is_some()
                    && self.goodbye_expires_at.is_none()
                    && self.goodbye_sent_at.is_none()
            }
            LifecycleState::Active | LifecycleState::Dormant => {
                self.goodbye_expires_at.is_none()
                    && self.goodbye_sent_at.is_none()
                    && self.remind_at.is_none()
            }
        }
    }
}

/// Append-only audit entry written for every applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionRecord {
    pub id: String,
    pub user_id: String,
    pub trigger: Trigger,
    pub previous_state: LifecycleState,
    pub new_state: LifecycleState,
    pub metadata: Params,
    pub created_at: DateTime<Utc>,
}

/// Everything a store needs to apply one transition atomically.
///
/// The update only takes effect while the row is still in `expected_state`;
/// expiration fields are written verbatim (`None` clears them) and
/// `last_activity_at` is only touched when `Some`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub user_id: String,
    pub expected_state: LifecycleState,
    pub new_state: LifecycleState,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub goodbye_sent_at: Option<DateTime<Utc>>,
    pub goodbye_expires_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub record: StateTransitionRecord,
}

/// Per-user profile data owned by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub locale: String,
    pub preferred_destination: Destination,
    pub individual_jid: Option<String>,
    pub group_jid: Option<String>,
    pub reengagement_opt_out: bool,
    pub onboarding_tips_enabled: bool,
}

impl UserProfile {
    /// The JID matching the user's current preference, if one is known.
    pub fn preferred_jid(&self) -> Option<&str> {
        match self.preferred_destination {
            Destination::Individual => self.individual_jid.as_deref(),
            Destination::Group => self.group_jid.as_deref(),
        }
    }
}

/// Preferred delivery target as reported by the profile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredDestination {
    pub destination: Destination,
    pub jid: Option<String>,
}

/// A user whose last recorded activity is older than the inactivity threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct InactiveUser {
    pub user_id: String,
    pub last_activity_at: DateTime<Utc>,
}

/// Number of transactions a user created within a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionActivity {
    pub user_id: String,
    pub transaction_count: u64,
}

/// Denormalized row used by the weekly review job.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUserSummary {
    pub user_id: String,
    pub transaction_count: u64,
    pub destination: Destination,
    pub destination_jid: Option<String>,
    pub locale: Option<String>,
    pub last_activity_at: DateTime<Utc>,
}

/// A message waiting to be inserted into the outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueuedMessage {
    pub user_id: String,
    pub message_type: MessageType,
    pub message_key: String,
    pub message_params: Params,
    pub destination: Destination,
    pub destination_jid: String,
    pub scheduled_for: DateTime<Utc>,
    pub idempotency_key: String,
}

/// A persisted outbound queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub id: i64,
    pub user_id: String,
    pub message_type: MessageType,
    pub message_key: String,
    pub message_params: Params,
    pub destination: Destination,
    pub destination_jid: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: QueueStatus,
    pub retry_count: u32,
    pub idempotency_key: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Queue entry counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Progress event emitted by the onboarding tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierUpdate {
    /// Tracker action that produced the event (e.g. `add_expense`).
    pub action: String,
    /// Tier that this action completed, if any.
    pub tier_completed: Option<u8>,
    pub should_send_unlock: bool,
}

impl TierUpdate {
    /// The completed tier when an unlock message is warranted.
    pub fn unlocked_tier(&self) -> Option<u8> {
        self.tier_completed.filter(|_| self.should_send_unlock)
    }
}
