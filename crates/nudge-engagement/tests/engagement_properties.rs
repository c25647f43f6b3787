// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle guarantees of the engagement engine, exercised end to end on
//! the in-memory store and mock transport.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use nudge_core::types::{
    Destination, EngagementState, LifecycleState, MessageType, QueueStatus, TierUpdate,
    UserProfile,
};
use nudge_core::{EngagementStore, QueueStore};
use nudge_engagement::{
    Catalog, EngagementEngine, EngagementSettings, QueueRequest, Stores, TierOutcome,
    spawn_tier_completion,
};
use nudge_test_utils::{InMemoryStore, MockTransport};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 20, 10, 0, 0).unwrap()
}

fn engine(store: &InMemoryStore, transport: Arc<MockTransport>) -> EngagementEngine {
    EngagementEngine::new(
        Stores::from_shared(Arc::new(store.clone())),
        transport,
        Arc::new(Catalog::builtin("pt-BR")),
        EngagementSettings::default().without_send_delay(),
    )
}

fn profile(user_id: &str) -> UserProfile {
    UserProfile {
        user_id: user_id.into(),
        locale: "pt-BR".into(),
        preferred_destination: Destination::Individual,
        individual_jid: Some(format!("{user_id}@s.whatsapp.net")),
        group_jid: None,
        reengagement_opt_out: false,
        onboarding_tips_enabled: true,
    }
}

async fn seed_inactive(store: &InMemoryStore, user_id: &str, idle_days: i64) {
    store
        .seed_state(EngagementState::new_active(
            user_id,
            now() - TimeDelta::days(idle_days),
        ))
        .await;
    store.seed_profile(profile(user_id)).await;
}

#[tokio::test]
async fn daily_job_rerun_is_a_noop() {
    let store = InMemoryStore::new();
    seed_inactive(&store, "u1", 20).await;
    let mut expired = EngagementState::new_active("u2", now() - TimeDelta::days(30));
    expired.state = LifecycleState::GoodbyeSent;
    expired.goodbye_sent_at = Some(now() - TimeDelta::hours(49));
    expired.goodbye_expires_at = Some(now() - TimeDelta::hours(1));
    store.seed_state(expired).await;
    let transport = Arc::new(MockTransport::new());
    let job = engine(&store, transport.clone()).daily_job();

    let first = job.run_at(now()).await;
    assert_eq!(first.processed, 2);
    assert_eq!(first.succeeded, 2);
    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert_eq!(first.queue.as_ref().map(|q| q.succeeded), Some(1));

    let second = job.run_at(now() + TimeDelta::hours(1)).await;
    assert_eq!(second.processed, 0);
    assert_eq!(second.succeeded, 0);

    assert_eq!(store.transitions().await.len(), 2);
    assert_eq!(store.messages().await.len(), 1);
    assert_eq!(transport.sent_count().await, 1);

    let u1 = store.get_state("u1").await.unwrap().unwrap();
    assert_eq!(u1.state, LifecycleState::GoodbyeSent);
    let u2 = store.get_state("u2").await.unwrap().unwrap();
    assert_eq!(u2.state, LifecycleState::Dormant);
    assert!(u2.is_consistent());
}

#[tokio::test]
async fn one_failing_user_does_not_stop_the_others() {
    let store = InMemoryStore::new();
    seed_inactive(&store, "u1", 30).await;
    seed_inactive(&store, "u2", 20).await;
    seed_inactive(&store, "u3", 15).await;
    store.fail_user("u2").await;

    let result = engine(&store, Arc::new(MockTransport::new()))
        .daily_job()
        .run_at(now())
        .await;

    assert_eq!(result.processed, 3);
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("u2:"));
    assert_eq!(store.state_reads("u3").await, 1, "third user still invoked");
}

#[tokio::test]
async fn opted_out_users_are_skipped() {
    let store = InMemoryStore::new();
    for (i, user_id) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
        seed_inactive(&store, user_id, 15 + i as i64).await;
    }
    for user_id in ["b", "d"] {
        let mut opted = profile(user_id);
        opted.reengagement_opt_out = true;
        store.seed_profile(opted).await;
    }

    let result = engine(&store, Arc::new(MockTransport::new()))
        .daily_job()
        .run_at(now())
        .await;

    assert_eq!(result.skipped, 2);
    assert_eq!(result.processed, 3);
    assert_eq!(result.succeeded, 3);
    assert_eq!(store.state_reads("b").await, 0);
    assert_eq!(
        store.get_state("d").await.unwrap().unwrap().state,
        LifecycleState::Active
    );
}

#[tokio::test]
async fn queue_failure_does_not_fail_the_daily_job() {
    let store = InMemoryStore::new();
    seed_inactive(&store, "u1", 20).await;
    store.set_fail_queue_fetch(true).await;

    let result = engine(&store, Arc::new(MockTransport::new()))
        .daily_job()
        .run_at(now())
        .await;

    assert_eq!(result.succeeded, 1);
    assert!(result.queue.is_none());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("queue processing"));
}

#[tokio::test]
async fn user_without_profile_never_enters_goodbye_window() {
    let store = InMemoryStore::new();
    store
        .seed_state(EngagementState::new_active("u1", now() - TimeDelta::days(15)))
        .await;
    let job = engine(&store, Arc::new(MockTransport::new())).daily_job();

    for day in [0, 3] {
        let result = job.run_at(now() + TimeDelta::days(day)).await;
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("u1:"), "{:?}", result.errors);
        assert!(result.errors[0].contains("no delivery route"));
    }

    let state = store.get_state("u1").await.unwrap().unwrap();
    assert_eq!(state.state, LifecycleState::Active);
    assert!(store.transitions().await.is_empty());
    assert!(store.messages().await.is_empty());
}

#[tokio::test]
async fn due_reminder_goes_dormant_silently() {
    let store = InMemoryStore::new();
    let mut reminded = EngagementState::new_active("u1", now() - TimeDelta::days(30));
    reminded.state = LifecycleState::RemindLater;
    reminded.remind_at = Some(now() - TimeDelta::minutes(1));
    store.seed_state(reminded).await;
    store.seed_profile(profile("u1")).await;

    let result = engine(&store, Arc::new(MockTransport::new()))
        .daily_job()
        .run_at(now())
        .await;
    assert_eq!(result.succeeded, 1);

    let state = store.get_state("u1").await.unwrap().unwrap();
    assert_eq!(state.state, LifecycleState::Dormant);
    assert_eq!(state.remind_at, None);
    assert!(store.messages().await.is_empty());
}

#[tokio::test]
async fn tier_tips_ignore_reengagement_opt_out() {
    let store = InMemoryStore::new();
    let mut opted_out = profile("opted");
    opted_out.reengagement_opt_out = true;
    store.seed_profile(opted_out).await;
    let mut no_tips = profile("quiet");
    no_tips.onboarding_tips_enabled = false;
    store.seed_profile(no_tips).await;
    let mut opted_out_no_tips = profile("silent");
    opted_out_no_tips.reengagement_opt_out = true;
    opted_out_no_tips.onboarding_tips_enabled = false;
    store.seed_profile(opted_out_no_tips).await;

    let handler = engine(&store, Arc::new(MockTransport::new())).tier_handler();
    let update = TierUpdate {
        action: "add_expense".into(),
        tier_completed: Some(1),
        should_send_unlock: true,
    };

    assert_eq!(
        handler.handle_tier_completion("opted", &update, now()).await,
        TierOutcome::Queued { tier: 1 }
    );
    assert_eq!(
        handler.handle_tier_completion("quiet", &update, now()).await,
        TierOutcome::TipsDisabled
    );
    assert_eq!(
        handler.handle_tier_completion("silent", &update, now()).await,
        TierOutcome::TipsDisabled
    );
    let no_unlock = TierUpdate {
        should_send_unlock: false,
        ..update
    };
    assert_eq!(
        handler.handle_tier_completion("opted", &no_unlock, now()).await,
        TierOutcome::Ignored
    );

    let messages = store.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_type, MessageType::TierUnlock);
    assert_eq!(messages[0].message_key, "engagement.tier_1_complete");
    assert_eq!(messages[0].idempotency_key, "opted:tier_1_unlock:2026-03-20");
}

#[tokio::test]
async fn detached_tier_completion_runs_to_completion() {
    let store = InMemoryStore::new();
    store.seed_profile(profile("u1")).await;
    let handler = Arc::new(engine(&store, Arc::new(MockTransport::new())).tier_handler());

    let outcome = spawn_tier_completion(
        handler,
        "u1".into(),
        TierUpdate {
            action: "set_budget".into(),
            tier_completed: Some(3),
            should_send_unlock: true,
        },
        now(),
    )
    .await
    .unwrap();
    assert_eq!(outcome, TierOutcome::Queued { tier: 3 });
}

#[tokio::test]
async fn destination_is_resolved_at_send_time() {
    let store = InMemoryStore::new();
    let mut user = profile("u1");
    user.group_jid = Some("family@g.us".into());
    store.seed_profile(user).await;
    store
        .seed_state(EngagementState::new_active("u1", now() - TimeDelta::days(1)))
        .await;
    let transport = Arc::new(MockTransport::new());
    let engine = engine(&store, transport.clone());

    let weekly = engine.weekly_job().run_at(now()).await.unwrap();
    assert_eq!(weekly.succeeded, 1);
    assert_eq!(
        store.messages().await[0].destination_jid,
        "u1@s.whatsapp.net"
    );

    store
        .set_preferred_destination("u1", Destination::Group)
        .await;
    let result = engine.processor.process_message_queue(now()).await.unwrap();
    assert_eq!(result.succeeded, 1);
    assert_eq!(transport.sent_messages().await[0].jid, "family@g.us");
}

#[tokio::test]
async fn weekly_query_failure_propagates() {
    let store = InMemoryStore::new();
    store.set_fail_activity_queries(true).await;
    let result = engine(&store, Arc::new(MockTransport::new()))
        .weekly_job()
        .run_at(now())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn weekly_job_is_idempotent_per_day() {
    let store = InMemoryStore::new();
    for user_id in ["a", "b"] {
        store.seed_profile(profile(user_id)).await;
        store
            .seed_state(EngagementState::new_active(user_id, now() - TimeDelta::days(3)))
            .await;
    }
    store.seed_transaction("a", now() - TimeDelta::days(1)).await;
    let job = engine(&store, Arc::new(MockTransport::new())).weekly_job();

    let first = job.run_at(now()).await.unwrap();
    let second = job.run_at(now() + TimeDelta::hours(2)).await.unwrap();
    assert_eq!(first.succeeded, 2);
    assert_eq!(second.succeeded, 2);

    let messages = store.messages().await;
    assert_eq!(messages.len(), 2);
    let a = messages.iter().find(|m| m.user_id == "a").unwrap();
    assert_eq!(a.message_params["transaction_count"], "1");
    assert_eq!(a.idempotency_key, "a:weekly_review:2026-03-20");
}

#[tokio::test]
async fn retries_then_fails_permanently() {
    let store = InMemoryStore::new();
    let transport = Arc::new(MockTransport::new());
    transport.set_fail_all(true);
    let engine = engine(&store, transport.clone());
    assert!(
        engine
            .queue
            .queue_message(QueueRequest {
                user_id: "u1".into(),
                message_type: MessageType::Goodbye,
                message_key: "engagement.goodbye.self_select".into(),
                message_params: Default::default(),
                destination: Destination::Individual,
                destination_jid: "u1@s.whatsapp.net".into(),
                scheduled_for: now(),
                idempotency_key: None,
            })
            .await
    );
    let id = store.messages().await[0].id;

    for (attempt, expected) in [
        (1, QueueStatus::Pending),
        (2, QueueStatus::Pending),
        (3, QueueStatus::Failed),
    ] {
        let result = engine.processor.process_message_queue(now()).await.unwrap();
        assert_eq!(result.processed, 1);
        let message = store.get_message(id).await.unwrap().unwrap();
        assert_eq!(message.retry_count, attempt);
        assert_eq!(message.status, expected);
        if expected == QueueStatus::Failed {
            assert_eq!(result.failed, 1);
            assert_eq!(result.errors.len(), 1);
        } else {
            assert_eq!(result.retry_scheduled, 1);
        }
    }

    let after = engine.processor.process_message_queue(now()).await.unwrap();
    assert_eq!(after.processed, 0);
    assert_eq!(transport.attempts().await.len(), 3);
    assert!(
        store.get_message(id).await.unwrap().unwrap().error_message.is_some()
    );
}
