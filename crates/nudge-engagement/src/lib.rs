// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement lifecycle engine for Nudge.
//!
//! Tracks per-user activity, moves users through the engagement state
//! machine (active, goodbye_sent, remind_later, dormant) and drives an
//! idempotent, retrying outbound message queue. Every component receives
//! its collaborators by constructor injection.

pub mod activity;
pub mod destination;
pub mod i18n;
pub mod jobs;
mod metrics;
pub mod queue;
pub mod sender;
pub mod settings;
pub mod state_machine;

use std::sync::Arc;

use nudge_core::{ActivityLog, EngagementStore, Localizer, ProfileStore, QueueStore, Transport};

pub use activity::{ActivityDetector, OptOutFilter};
pub use destination::{DestinationResolver, ResolvedDestination, ResolverStep};
pub use i18n::Catalog;
pub use jobs::{
    DailyEngagementJob, JobResult, TierCompletionHandler, TierOutcome, WeeklyReviewJob,
    spawn_tier_completion,
};
pub use queue::{MessageQueue, QueueRequest, idempotency_key};
pub use sender::{ProcessResult, QueueProcessor};
pub use settings::EngagementSettings;
pub use state_machine::{
    GoodbyeResponse, InvalidTransition, SideEffect, StateMachine, TransitionOutcome,
    TransitionResult, plan_transition,
};

/// Data-access handles the engine is built from.
#[derive(Clone)]
pub struct Stores {
    pub engagement: Arc<dyn EngagementStore>,
    pub activity: Arc<dyn ActivityLog>,
    pub profiles: Arc<dyn ProfileStore>,
    pub queue: Arc<dyn QueueStore>,
}

impl Stores {
    /// Use one backend for every store.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: EngagementStore + ActivityLog + ProfileStore + QueueStore + 'static,
    {
        Self {
            engagement: store.clone(),
            activity: store.clone(),
            profiles: store.clone(),
            queue: store,
        }
    }
}

/// The wired engagement components.
pub struct EngagementEngine {
    pub state_machine: Arc<StateMachine>,
    pub detector: Arc<ActivityDetector>,
    pub queue: MessageQueue,
    pub processor: Arc<QueueProcessor>,
    profiles: Arc<dyn ProfileStore>,
}

impl EngagementEngine {
    pub fn new(
        stores: Stores,
        transport: Arc<dyn Transport>,
        localizer: Arc<dyn Localizer>,
        settings: EngagementSettings,
    ) -> Self {
        let queue = MessageQueue::new(stores.queue.clone(), stores.profiles.clone());
        let state_machine = Arc::new(StateMachine::new(
            stores.engagement.clone(),
            queue.clone(),
            settings.clone(),
        ));
        let detector = Arc::new(ActivityDetector::new(
            stores.activity,
            stores.engagement,
            stores.profiles.clone(),
            settings.clone(),
        ));
        let processor = Arc::new(QueueProcessor::new(
            stores.queue,
            stores.profiles.clone(),
            transport,
            localizer,
            settings,
        ));
        Self {
            state_machine,
            detector,
            queue,
            processor,
            profiles: stores.profiles,
        }
    }

    pub fn daily_job(&self) -> DailyEngagementJob {
        DailyEngagementJob::new(
            self.detector.clone(),
            self.state_machine.clone(),
            self.processor.clone(),
        )
    }

    pub fn weekly_job(&self) -> WeeklyReviewJob {
        WeeklyReviewJob::new(self.detector.clone(), self.queue.clone())
    }

    pub fn tier_handler(&self) -> TierCompletionHandler {
        TierCompletionHandler::new(self.profiles.clone(), self.queue.clone())
    }
}
