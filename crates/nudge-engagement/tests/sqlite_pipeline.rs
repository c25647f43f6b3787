// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full lifecycle on the SQLite backend.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use nudge_core::types::{Destination, LifecycleState, QueueStatus, Trigger, UserProfile};
use nudge_core::{EngagementStore, QueueStore};
use nudge_engagement::{Catalog, EngagementEngine, EngagementSettings, Stores, TransitionOutcome};
use nudge_storage::SqliteStorage;
use nudge_storage::queries::{activity, profiles};
use nudge_test_utils::{MockTransport, temp_storage};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn build(storage: Arc<SqliteStorage>, transport: Arc<MockTransport>) -> EngagementEngine {
    EngagementEngine::new(
        Stores::from_shared(storage),
        transport,
        Arc::new(Catalog::builtin("pt-BR")),
        EngagementSettings::default().without_send_delay(),
    )
}

async fn seed_profile(storage: &SqliteStorage, user_id: &str, locale: &str) {
    profiles::upsert_profile(
        storage.database().unwrap(),
        &UserProfile {
            user_id: user_id.into(),
            locale: locale.into(),
            preferred_destination: Destination::Individual,
            individual_jid: Some(format!("{user_id}@s.whatsapp.net")),
            group_jid: None,
            reengagement_opt_out: false,
            onboarding_tips_enabled: true,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn goodbye_remind_later_and_return() {
    let (storage, _dir) = temp_storage().await.unwrap();
    let storage = Arc::new(storage);
    seed_profile(&storage, "ana", "en").await;
    seed_profile(&storage, "bia", "pt-BR").await;
    let transport = Arc::new(MockTransport::new());
    let engine = build(storage.clone(), transport.clone());

    engine.state_machine.record_activity("ana", start()).await.unwrap();
    engine.state_machine.record_activity("bia", start()).await.unwrap();
    // bia keeps logging expenses, so only ana goes quiet.
    let day_15 = start() + TimeDelta::days(15);
    activity::record_transaction(storage.database().unwrap(), "bia", day_15 - TimeDelta::days(1))
        .await
        .unwrap();

    let daily = engine.daily_job().run_at(day_15).await;
    assert_eq!(daily.succeeded, 1, "{:?}", daily.errors);
    let sent = transport.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].jid, "ana@s.whatsapp.net");
    assert!(sent[0].text.starts_with("Hi! We haven't seen you"));

    let reply = engine
        .state_machine
        .handle_goodbye_response("ana", "2", day_15 + TimeDelta::hours(1))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.is_applied());
    let state = storage.get_state("ana").await.unwrap().unwrap();
    assert_eq!(state.state, LifecycleState::RemindLater);
    assert!(state.is_consistent());

    let day_30 = day_15 + TimeDelta::days(15);
    let daily = engine.daily_job().run_at(day_30).await;
    assert!(daily.errors.is_empty(), "{:?}", daily.errors);
    assert_eq!(
        storage.get_state("ana").await.unwrap().unwrap().state,
        LifecycleState::Dormant
    );

    let back = engine
        .state_machine
        .record_activity("ana", day_30 + TimeDelta::days(2))
        .await
        .unwrap();
    assert!(matches!(back, Some(TransitionOutcome::Applied(_))));

    let history = engine.state_machine.list_transitions("ana").await.unwrap();
    let triggers: Vec<_> = history.iter().map(|t| t.trigger).collect();
    assert_eq!(
        triggers,
        [
            Trigger::Inactivity14d,
            Trigger::GoodbyeResponse2,
            Trigger::ReminderDue,
            Trigger::UserMessage,
        ]
    );
    let state = storage.get_state("ana").await.unwrap().unwrap();
    assert_eq!(state.state, LifecycleState::Active);
    assert_eq!(state.last_activity_at, day_30 + TimeDelta::days(2));
}

#[tokio::test]
async fn overlapping_daily_runs_apply_once() {
    let (storage, _dir) = temp_storage().await.unwrap();
    let storage = Arc::new(storage);
    seed_profile(&storage, "ana", "pt-BR").await;
    let transport = Arc::new(MockTransport::new());
    let first = build(storage.clone(), transport.clone());
    let second = build(storage.clone(), transport.clone());
    first.state_machine.record_activity("ana", start()).await.unwrap();

    let at = start() + TimeDelta::days(20);
    let first_job = first.daily_job();
    let second_job = second.daily_job();
    let (a, b) = tokio::join!(first_job.run_at(at), second_job.run_at(at));

    assert_eq!(a.succeeded + b.succeeded, 1);
    assert_eq!(a.failed + b.failed, 0);
    assert_eq!(storage.list_transitions("ana").await.unwrap().len(), 1);
    let stats = storage.queue_stats().await.unwrap();
    assert_eq!(stats.pending + stats.sent, 1);
    assert_eq!(transport.sent_count().await, 1);
}

#[tokio::test]
async fn overlapping_queue_drains_send_once() {
    let (storage, _dir) = temp_storage().await.unwrap();
    let storage = Arc::new(storage);
    seed_profile(&storage, "ana", "pt-BR").await;
    let transport = Arc::new(MockTransport::new());
    let first = build(storage.clone(), transport.clone());
    let second = build(storage.clone(), transport.clone());
    first.state_machine.record_activity("ana", start()).await.unwrap();

    let at = start() + TimeDelta::days(20);
    let outcome = first
        .state_machine
        .transition_state("ana", Trigger::Inactivity14d, Default::default(), at)
        .await
        .unwrap();
    assert!(outcome.is_applied());

    let (a, b) = tokio::join!(
        first.processor.process_message_queue(at),
        second.processor.process_message_queue(at)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.processed + b.processed, 1);
    assert_eq!(a.succeeded + b.succeeded, 1);
    assert_eq!(transport.sent_count().await, 1);
    assert_eq!(storage.queue_stats().await.unwrap().sent, 1);
}

#[tokio::test]
async fn exhausted_message_is_reported_once() {
    let (storage, _dir) = temp_storage().await.unwrap();
    let storage = Arc::new(storage);
    seed_profile(&storage, "ana", "pt-BR").await;
    let transport = Arc::new(MockTransport::new());
    transport.set_fail_all(true);
    let engine = build(storage.clone(), transport.clone());
    engine.state_machine.record_activity("ana", start()).await.unwrap();

    let at = start() + TimeDelta::days(20);
    engine.daily_job().run_at(at).await;
    engine.processor.process_message_queue(at).await.unwrap();
    let last = engine.processor.process_message_queue(at).await.unwrap();
    assert_eq!(last.failed, 1);

    let stats = storage.queue_stats().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 0);
    assert!(storage.fetch_due(at, 10).await.unwrap().is_empty());
    assert_eq!(transport.attempts().await.len(), 3);
    let failed = storage.get_message(1).await.unwrap().unwrap();
    assert_eq!(failed.status, QueueStatus::Failed);
}
