// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement lifecycle state machine.
//!
//! [`plan_transition`] is the pure transition function. [`StateMachine`]
//! loads the current state, applies the plan through a guarded store update
//! that also appends the audit record, and then runs side effects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use nudge_core::types::{
    EngagementState, LifecycleState, MessageType, Params, StateChange, StateTransitionRecord,
    Trigger,
};
use nudge_core::{EngagementStore, NudgeError};

use crate::metrics;
use crate::queue::MessageQueue;
use crate::settings::EngagementSettings;

/// Localization key of the goodbye message.
pub const GOODBYE_MESSAGE_KEY: &str = "engagement.goodbye.self_select";

/// Idempotency scope of goodbye messages.
const GOODBYE_SCOPE: &str = "goodbye_sent";

/// A `(state, trigger)` pair outside the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition: {from} + {trigger} is not a valid transition")]
pub struct InvalidTransition {
    pub from: LifecycleState,
    pub trigger: Trigger,
}

/// Observable consequence of an applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    /// Goodbye window opened until `expires_at`.
    OpenGoodbyeWindow { expires_at: DateTime<Utc> },
    CloseGoodbyeWindow,
    /// Goodbye message handed to the queue.
    QueueGoodbye,
    ScheduleReminder { remind_at: DateTime<Utc> },
    ClearReminder,
    ResetActivity,
}

/// Result of [`plan_transition`]: the target state and the fields to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub trigger: Trigger,
    pub goodbye_sent_at: Option<DateTime<Utc>>,
    pub goodbye_expires_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub side_effects: Vec<SideEffect>,
}

/// Compute the transition for `trigger` from `from` at `now`.
pub fn plan_transition(
    from: LifecycleState,
    trigger: Trigger,
    now: DateTime<Utc>,
    settings: &EngagementSettings,
) -> Result<TransitionPlan, InvalidTransition> {
    use LifecycleState::*;
    use Trigger::*;

    let to = match (from, trigger) {
        (Active, Inactivity14d) => GoodbyeSent,
        (GoodbyeSent, GoodbyeTimeout) => Dormant,
        (GoodbyeSent, GoodbyeResponse1) => Active,
        (GoodbyeSent, GoodbyeResponse2) => RemindLater,
        (GoodbyeSent, GoodbyeResponse3) => Dormant,
        (RemindLater, ReminderDue) => Dormant,
        (GoodbyeSent | RemindLater | Dormant, UserMessage | Manual) => Active,
        _ => return Err(InvalidTransition { from, trigger }),
    };

    let mut plan = TransitionPlan {
        from,
        to,
        trigger,
        goodbye_sent_at: None,
        goodbye_expires_at: None,
        remind_at: None,
        last_activity_at: None,
        side_effects: Vec::new(),
    };

    match from {
        GoodbyeSent => plan.side_effects.push(SideEffect::CloseGoodbyeWindow),
        RemindLater => plan.side_effects.push(SideEffect::ClearReminder),
        Active | Dormant => {}
    }
    match to {
        GoodbyeSent => {
            let expires_at = now + settings.goodbye_window;
            plan.goodbye_sent_at = Some(now);
            plan.goodbye_expires_at = Some(expires_at);
            plan.side_effects
                .push(SideEffect::OpenGoodbyeWindow { expires_at });
            plan.side_effects.push(SideEffect::QueueGoodbye);
        }
        RemindLater => {
            let remind_at = now + settings.remind_later;
            plan.remind_at = Some(remind_at);
            plan.side_effects
                .push(SideEffect::ScheduleReminder { remind_at });
        }
        Active => {
            // Every way back to active is the user (or an operator) acting.
            plan.last_activity_at = Some(now);
            plan.side_effects.push(SideEffect::ResetActivity);
        }
        Dormant => {}
    }

    Ok(plan)
}

/// An applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionResult {
    pub user_id: String,
    pub trigger: Trigger,
    pub previous_state: LifecycleState,
    pub new_state: LifecycleState,
    pub side_effects: Vec<SideEffect>,
}

/// Outcome of [`StateMachine::transition_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(TransitionResult),
    /// The pair is not in the transition table. Nothing was written.
    Rejected(InvalidTransition),
    /// The row changed between read and guarded update. Nothing was written.
    Superseded,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// A numbered answer to the goodbye message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoodbyeResponse {
    /// "1": confused, wants help.
    NeedHelp,
    /// "2": busy, remind later.
    RemindLater,
    /// "3": all good, no thanks.
    NoThanks,
}

impl GoodbyeResponse {
    /// Parse a chat reply. Surrounding whitespace and a trailing `.` or `)`
    /// are tolerated; anything else is not an answer.
    pub fn parse(reply: &str) -> Option<Self> {
        match reply.trim().trim_end_matches(['.', ')']) {
            "1" => Some(Self::NeedHelp),
            "2" => Some(Self::RemindLater),
            "3" => Some(Self::NoThanks),
            _ => None,
        }
    }

    pub fn trigger(self) -> Trigger {
        match self {
            Self::NeedHelp => Trigger::GoodbyeResponse1,
            Self::RemindLater => Trigger::GoodbyeResponse2,
            Self::NoThanks => Trigger::GoodbyeResponse3,
        }
    }
}

/// Applies lifecycle transitions against an [`EngagementStore`].
pub struct StateMachine {
    store: Arc<dyn EngagementStore>,
    queue: MessageQueue,
    settings: EngagementSettings,
}

impl StateMachine {
    pub fn new(
        store: Arc<dyn EngagementStore>,
        queue: MessageQueue,
        settings: EngagementSettings,
    ) -> Self {
        Self {
            store,
            queue,
            settings,
        }
    }

    /// Apply `trigger` to a user's current state.
    ///
    /// A missing engagement record is a `NotFound` error. An invalid pair and
    /// a lost race are both non-error outcomes that leave storage untouched.
    /// The goodbye is queued before the state is written; if it cannot be
    /// queued the user stays where they are and the error is returned.
    pub async fn transition_state(
        &self,
        user_id: &str,
        trigger: Trigger,
        metadata: Params,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, NudgeError> {
        let current = self
            .store
            .get_state(user_id)
            .await?
            .ok_or_else(|| NudgeError::NotFound {
                entity: "engagement state",
                id: user_id.to_string(),
            })?;

        let plan = match plan_transition(current.state, trigger, now, &self.settings) {
            Ok(plan) => plan,
            Err(invalid) => {
                warn!(user_id, %trigger, state = %current.state, "{invalid}");
                metrics::transition_noop(trigger);
                return Ok(TransitionOutcome::Rejected(invalid));
            }
        };

        if plan.side_effects.contains(&SideEffect::QueueGoodbye) {
            // The goodbye window only opens once its message is in the queue.
            if let Err(e) = self.queue_goodbye(user_id, now).await {
                warn!(user_id, %trigger, error = %e, "goodbye not queued, transition not applied");
                return Err(e);
            }
        }

        let change = StateChange {
            user_id: user_id.to_string(),
            expected_state: plan.from,
            new_state: plan.to,
            last_activity_at: plan.last_activity_at,
            goodbye_sent_at: plan.goodbye_sent_at,
            goodbye_expires_at: plan.goodbye_expires_at,
            remind_at: plan.remind_at,
            record: StateTransitionRecord {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                trigger,
                previous_state: plan.from,
                new_state: plan.to,
                metadata,
                created_at: now,
            },
        };

        if !self.store.apply_transition(&change).await? {
            info!(
                user_id,
                %trigger,
                expected = %plan.from,
                "state changed concurrently, transition skipped"
            );
            metrics::transition_noop(trigger);
            return Ok(TransitionOutcome::Superseded);
        }

        info!(user_id, %trigger, from = %plan.from, to = %plan.to, "state transition applied");
        metrics::transition(trigger, plan.from, plan.to);

        Ok(TransitionOutcome::Applied(TransitionResult {
            user_id: user_id.to_string(),
            trigger,
            previous_state: plan.from,
            new_state: plan.to,
            side_effects: plan.side_effects,
        }))
    }

    async fn queue_goodbye(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), NudgeError> {
        self.queue
            .enqueue_for_user(
                user_id,
                MessageType::Goodbye,
                GOODBYE_MESSAGE_KEY,
                Params::new(),
                GOODBYE_SCOPE,
                now,
            )
            .await
    }

    /// Record user-initiated activity.
    ///
    /// Creates the engagement record on first sight. A user outside `active`
    /// is re-engaged through the `user_message` trigger; an active user only
    /// has `last_activity_at` moved forward.
    pub async fn record_activity(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<TransitionOutcome>, NudgeError> {
        let Some(current) = self.store.get_state(user_id).await? else {
            self.store.create_state(user_id, at).await?;
            debug!(user_id, "engagement state created");
            return Ok(None);
        };

        if current.state == LifecycleState::Active {
            self.store.touch_activity(user_id, at).await?;
            return Ok(None);
        }

        let metadata = Params::from([("source".to_string(), "activity".to_string())]);
        self.transition_state(user_id, Trigger::UserMessage, metadata, at)
            .await
            .map(Some)
    }

    /// Apply a chat reply to the goodbye message.
    ///
    /// Returns `None` when the reply is not one of the numbered options.
    pub async fn handle_goodbye_response(
        &self,
        user_id: &str,
        reply: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<TransitionOutcome>, NudgeError> {
        let Some(response) = GoodbyeResponse::parse(reply) else {
            return Ok(None);
        };
        let metadata = Params::from([("reply".to_string(), reply.trim().to_string())]);
        self.transition_state(user_id, response.trigger(), metadata, now)
            .await
            .map(Some)
    }

    /// Users in `goodbye_sent` whose window closed strictly before `now`.
    pub async fn get_expired_goodbyes(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError> {
        self.store.list_expired_goodbyes(now).await
    }

    /// Users in `remind_later` whose reminder is strictly before `now`.
    pub async fn get_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError> {
        self.store.list_due_reminders(now).await
    }

    /// A user's transition history, oldest first.
    pub async fn list_transitions(
        &self,
        user_id: &str,
    ) -> Result<Vec<StateTransitionRecord>, NudgeError> {
        self.store.list_transitions(user_id).await
    }
}
