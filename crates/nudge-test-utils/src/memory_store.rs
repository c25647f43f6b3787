// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store for deterministic engagement tests.
//!
//! `InMemoryStore` implements every store trait with the same semantics as
//! the SQLite backend and adds failure injection plus call counters, so tests
//! can assert per-user isolation and fault handling.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use nudge_core::types::{
    ActiveUserSummary, Destination, EngagementState, InactiveUser, LifecycleState,
    NewQueuedMessage, QueueStats, QueueStatus, QueuedMessage, StateChange, StateTransitionRecord,
    TransactionActivity, UserProfile,
};
use nudge_core::{ActivityLog, EngagementStore, NudgeError, ProfileStore, QueueStore};

#[derive(Default)]
struct Inner {
    states: BTreeMap<String, EngagementState>,
    transitions: Vec<StateTransitionRecord>,
    profiles: HashMap<String, UserProfile>,
    transactions: Vec<(String, DateTime<Utc>)>,
    messages: Vec<QueuedMessage>,
    leases: HashMap<i64, DateTime<Utc>>,
    state_reads: HashMap<String, usize>,
    failing_users: HashSet<String>,
    fail_queue_fetch: bool,
    fail_queue_insert: bool,
    fail_activity_queries: bool,
}

/// Shared in-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Seeding ---

    /// Insert or replace an engagement state.
    pub async fn seed_state(&self, state: EngagementState) {
        self.inner
            .lock()
            .await
            .states
            .insert(state.user_id.clone(), state);
    }

    /// Insert or replace a user profile.
    pub async fn seed_profile(&self, profile: UserProfile) {
        self.inner
            .lock()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile);
    }

    /// Record a transaction for a user.
    pub async fn seed_transaction(&self, user_id: &str, at: DateTime<Utc>) {
        self.inner
            .lock()
            .await
            .transactions
            .push((user_id.to_string(), at));
    }

    // --- Failure injection ---

    /// Make every state read and transition for `user_id` fail.
    pub async fn fail_user(&self, user_id: &str) {
        self.inner
            .lock()
            .await
            .failing_users
            .insert(user_id.to_string());
    }

    /// Make [`QueueStore::fetch_due`] fail.
    pub async fn set_fail_queue_fetch(&self, fail: bool) {
        self.inner.lock().await.fail_queue_fetch = fail;
    }

    /// Make [`QueueStore::insert_message`] fail.
    pub async fn set_fail_queue_insert(&self, fail: bool) {
        self.inner.lock().await.fail_queue_insert = fail;
    }

    /// Make every [`ActivityLog`] query fail.
    pub async fn set_fail_activity_queries(&self, fail: bool) {
        self.inner.lock().await.fail_activity_queries = fail;
    }

    // --- Inspection ---

    /// How many times `get_state` was called for a user.
    pub async fn state_reads(&self, user_id: &str) -> usize {
        self.inner
            .lock()
            .await
            .state_reads
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }

    /// Every queued message, in insertion order.
    pub async fn messages(&self) -> Vec<QueuedMessage> {
        self.inner.lock().await.messages.clone()
    }

    /// Every transition record, in insertion order.
    pub async fn transitions(&self) -> Vec<StateTransitionRecord> {
        self.inner.lock().await.transitions.clone()
    }

    /// Overwrite a user's preferred destination.
    pub async fn set_preferred_destination(&self, user_id: &str, destination: Destination) {
        if let Some(profile) = self.inner.lock().await.profiles.get_mut(user_id) {
            profile.preferred_destination = destination;
        }
    }
}

fn injected(what: &str) -> NudgeError {
    NudgeError::storage(format!("injected failure: {what}"))
}

#[async_trait]
impl EngagementStore for InMemoryStore {
    async fn get_state(&self, user_id: &str) -> Result<Option<EngagementState>, NudgeError> {
        let mut inner = self.inner.lock().await;
        *inner.state_reads.entry(user_id.to_string()).or_default() += 1;
        if inner.failing_users.contains(user_id) {
            return Err(injected("get_state"));
        }
        Ok(inner.states.get(user_id).cloned())
    }

    async fn create_state(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<EngagementState, NudgeError> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .states
            .entry(user_id.to_string())
            .or_insert_with(|| EngagementState::new_active(user_id, at))
            .clone())
    }

    async fn touch_activity(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), NudgeError> {
        let mut inner = self.inner.lock().await;
        if let Some(state) = inner.states.get_mut(user_id)
            && state.last_activity_at < at
        {
            state.last_activity_at = at;
            state.updated_at = at;
        }
        Ok(())
    }

    async fn apply_transition(&self, change: &StateChange) -> Result<bool, NudgeError> {
        let mut inner = self.inner.lock().await;
        if inner.failing_users.contains(&change.user_id) {
            return Err(injected("apply_transition"));
        }
        let Some(state) = inner.states.get_mut(&change.user_id) else {
            return Ok(false);
        };
        if state.state != change.expected_state {
            return Ok(false);
        }
        state.state = change.new_state;
        if let Some(at) = change.last_activity_at {
            state.last_activity_at = at;
        }
        state.goodbye_sent_at = change.goodbye_sent_at;
        state.goodbye_expires_at = change.goodbye_expires_at;
        state.remind_at = change.remind_at;
        state.updated_at = change.record.created_at;
        inner.transitions.push(change.record.clone());
        Ok(true)
    }

    async fn list_expired_goodbyes(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .states
            .values()
            .filter(|s| {
                s.state == LifecycleState::GoodbyeSent && s.goodbye_expires_at.is_some_and(|e| e < now)
            })
            .cloned()
            .collect())
    }

    async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .states
            .values()
            .filter(|s| s.state == LifecycleState::RemindLater && s.remind_at.is_some_and(|r| r < now))
            .cloned()
            .collect())
    }

    async fn list_transitions(
        &self,
        user_id: &str,
    ) -> Result<Vec<StateTransitionRecord>, NudgeError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transitions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl Inner {
    fn transactions_since(&self, user_id: &str, since: DateTime<Utc>) -> u64 {
        self.transactions
            .iter()
            .filter(|(u, at)| u == user_id && *at >= since)
            .count() as u64
    }
}

#[async_trait]
impl ActivityLog for InMemoryStore {
    async fn list_users_inactive_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<InactiveUser>, NudgeError> {
        let inner = self.inner.lock().await;
        if inner.fail_activity_queries {
            return Err(injected("list_users_inactive_since"));
        }
        let mut users: Vec<InactiveUser> = inner
            .states
            .values()
            .filter(|s| {
                s.state == LifecycleState::Active
                    && s.last_activity_at < threshold
                    && inner.transactions_since(&s.user_id, threshold) == 0
            })
            .map(|s| InactiveUser {
                user_id: s.user_id.clone(),
                last_activity_at: s.last_activity_at,
            })
            .collect();
        users.sort_by(|a, b| {
            a.last_activity_at
                .cmp(&b.last_activity_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(users)
    }

    async fn list_transaction_activity_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionActivity>, NudgeError> {
        let inner = self.inner.lock().await;
        if inner.fail_activity_queries {
            return Err(injected("list_transaction_activity_since"));
        }
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for (user_id, at) in &inner.transactions {
            if *at >= since {
                *counts.entry(user_id.as_str()).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(user_id, transaction_count)| TransactionActivity {
                user_id: user_id.to_string(),
                transaction_count,
            })
            .collect())
    }

    async fn count_transactions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, NudgeError> {
        let inner = self.inner.lock().await;
        if inner.fail_activity_queries {
            return Err(injected("count_transactions_since"));
        }
        Ok(inner.transactions_since(user_id, since))
    }

    async fn list_active_users_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActiveUserSummary>, NudgeError> {
        let inner = self.inner.lock().await;
        if inner.fail_activity_queries {
            return Err(injected("list_active_users_since"));
        }
        Ok(inner
            .states
            .values()
            .filter(|s| s.state != LifecycleState::Dormant)
            .filter_map(|s| {
                let profile = inner.profiles.get(&s.user_id);
                if profile.is_some_and(|p| p.reengagement_opt_out) {
                    return None;
                }
                let transaction_count = inner.transactions_since(&s.user_id, since);
                if s.last_activity_at < since && transaction_count == 0 {
                    return None;
                }
                Some(ActiveUserSummary {
                    user_id: s.user_id.clone(),
                    transaction_count,
                    destination: profile.map(|p| p.preferred_destination).unwrap_or_default(),
                    destination_jid: profile.and_then(|p| p.preferred_jid().map(str::to_string)),
                    locale: profile.map(|p| p.locale.clone()),
                    last_activity_at: s.last_activity_at,
                })
            })
            .collect())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, NudgeError> {
        Ok(self.inner.lock().await.profiles.get(user_id).cloned())
    }

    async fn get_opt_out_flags(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, bool>, NudgeError> {
        let inner = self.inner.lock().await;
        Ok(user_ids
            .iter()
            .map(|id| {
                let opted_out = inner
                    .profiles
                    .get(id)
                    .is_some_and(|p| p.reengagement_opt_out);
                (id.clone(), opted_out)
            })
            .collect())
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn insert_message(&self, message: &NewQueuedMessage) -> Result<bool, NudgeError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_queue_insert {
            return Err(injected("insert_message"));
        }
        if inner
            .messages
            .iter()
            .any(|m| m.idempotency_key == message.idempotency_key)
        {
            return Ok(false);
        }
        let id = inner.messages.len() as i64 + 1;
        inner.messages.push(QueuedMessage {
            id,
            user_id: message.user_id.clone(),
            message_type: message.message_type,
            message_key: message.message_key.clone(),
            message_params: message.message_params.clone(),
            destination: message.destination,
            destination_jid: message.destination_jid.clone(),
            scheduled_for: message.scheduled_for,
            status: QueueStatus::Pending,
            retry_count: 0,
            idempotency_key: message.idempotency_key.clone(),
            sent_at: None,
            error_message: None,
            created_at: message.scheduled_for,
        });
        Ok(true)
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedMessage>, NudgeError> {
        let inner = self.inner.lock().await;
        if inner.fail_queue_fetch {
            return Err(injected("fetch_due"));
        }
        let mut due: Vec<QueuedMessage> = inner
            .messages
            .iter()
            .filter(|m| m.status == QueueStatus::Pending && m.scheduled_for <= now)
            .filter(|m| inner.leases.get(&m.id).is_none_or(|until| *until <= now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for).then(a.id.cmp(&b.id)));
        due.truncate(limit);
        Ok(due)
    }

    async fn claim_message(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool, NudgeError> {
        let mut inner = self.inner.lock().await;
        let pending = inner
            .messages
            .iter()
            .any(|m| m.id == id && m.status == QueueStatus::Pending);
        let free = inner.leases.get(&id).is_none_or(|until| *until <= now);
        if !(pending && free) {
            return Ok(false);
        }
        inner.leases.insert(id, lease_until);
        Ok(true)
    }

    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<(), NudgeError> {
        let mut inner = self.inner.lock().await;
        inner.leases.remove(&id);
        if let Some(message) = inner.messages.iter_mut().find(|m| m.id == id) {
            message.status = QueueStatus::Sent;
            message.sent_at = Some(at);
            message.error_message = None;
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: i64,
        error: &str,
        max_retries: u32,
    ) -> Result<QueueStatus, NudgeError> {
        let mut inner = self.inner.lock().await;
        inner.leases.remove(&id);
        let message = inner
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| NudgeError::NotFound {
                entity: "queued message",
                id: id.to_string(),
            })?;
        message.retry_count += 1;
        message.error_message = Some(error.to_string());
        if message.retry_count >= max_retries {
            message.status = QueueStatus::Failed;
        }
        Ok(message.status)
    }

    async fn get_message(&self, id: i64) -> Result<Option<QueuedMessage>, NudgeError> {
        let inner = self.inner.lock().await;
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn count_by_idempotency_key(&self, key: &str) -> Result<u64, NudgeError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.idempotency_key == key)
            .count() as u64)
    }

    async fn queue_stats(&self) -> Result<QueueStats, NudgeError> {
        let inner = self.inner.lock().await;
        let mut stats = QueueStats::default();
        for message in &inner.messages {
            match message.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Sent => stats.sent += 1,
                QueueStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
