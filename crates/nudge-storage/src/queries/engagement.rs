// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement state rows and the append-only transition log.

use chrono::{DateTime, Utc};
use nudge_core::NudgeError;
use nudge_core::types::{EngagementState, LifecycleState, StateChange, StateTransitionRecord};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{get_enum, get_opt_ts, get_params, get_ts, params_json, ts};

const STATE_COLUMNS: &str = "user_id, state, last_activity_at, goodbye_sent_at, \
                             goodbye_expires_at, remind_at, updated_at";

fn state_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EngagementState> {
    Ok(EngagementState {
        user_id: row.get(0)?,
        state: get_enum(row, 1)?,
        last_activity_at: get_ts(row, 2)?,
        goodbye_sent_at: get_opt_ts(row, 3)?,
        goodbye_expires_at: get_opt_ts(row, 4)?,
        remind_at: get_opt_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

/// Load a user's engagement state.
pub async fn get_state(db: &Database, user_id: &str) -> Result<Option<EngagementState>, NudgeError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {STATE_COLUMNS} FROM engagement_states WHERE user_id = ?1"),
                params![user_id],
                state_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert an `active` row if none exists and return the stored row.
pub async fn create_state(
    db: &Database,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<EngagementState, NudgeError> {
    let user_id = user_id.to_string();
    let at = ts(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO engagement_states (user_id, state, last_activity_at, updated_at) \
                 VALUES (?1, 'active', ?2, ?2) ON CONFLICT(user_id) DO NOTHING",
                params![user_id, at],
            )?;
            conn.query_row(
                &format!("SELECT {STATE_COLUMNS} FROM engagement_states WHERE user_id = ?1"),
                params![user_id],
                state_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Move `last_activity_at` forward. Older timestamps are ignored.
pub async fn touch_activity(db: &Database, user_id: &str, at: DateTime<Utc>) -> Result<(), NudgeError> {
    let user_id = user_id.to_string();
    let at = ts(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE engagement_states SET last_activity_at = ?2, updated_at = ?2 \
                 WHERE user_id = ?1 AND last_activity_at < ?2",
                params![user_id, at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a guarded state update and append its audit record in one transaction.
///
/// Returns `false` (and writes nothing) when the row left `expected_state`.
pub async fn apply_transition(db: &Database, change: &StateChange) -> Result<bool, NudgeError> {
    let change = change.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let updated_at = ts(&change.record.created_at);
            let updated = tx.execute(
                "UPDATE engagement_states SET state = ?3, \
                 last_activity_at = COALESCE(?4, last_activity_at), \
                 goodbye_sent_at = ?5, goodbye_expires_at = ?6, remind_at = ?7, updated_at = ?8 \
                 WHERE user_id = ?1 AND state = ?2",
                params![
                    change.user_id,
                    change.expected_state.as_ref(),
                    change.new_state.as_ref(),
                    change.last_activity_at.as_ref().map(ts),
                    change.goodbye_sent_at.as_ref().map(ts),
                    change.goodbye_expires_at.as_ref().map(ts),
                    change.remind_at.as_ref().map(ts),
                    updated_at,
                ],
            )?;
            if updated == 0 {
                tx.rollback()?;
                return Ok(false);
            }

            let record = &change.record;
            tx.execute(
                "INSERT INTO state_transitions \
                 (id, user_id, trigger_name, previous_state, new_state, metadata, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.user_id,
                    record.trigger.as_ref(),
                    record.previous_state.as_ref(),
                    record.new_state.as_ref(),
                    params_json(&record.metadata)?,
                    ts(&record.created_at),
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

async fn list_by_deadline(
    db: &Database,
    state: LifecycleState,
    deadline_column: &'static str,
    now: DateTime<Utc>,
) -> Result<Vec<EngagementState>, NudgeError> {
    let now = ts(&now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STATE_COLUMNS} FROM engagement_states \
                 WHERE state = ?1 AND {deadline_column} < ?2 \
                 ORDER BY {deadline_column} ASC, user_id ASC"
            ))?;
            let rows = stmt.query_map(params![state.as_ref(), now], state_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Users in `goodbye_sent` whose window closed before `now`.
pub async fn list_expired_goodbyes(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<EngagementState>, NudgeError> {
    list_by_deadline(db, LifecycleState::GoodbyeSent, "goodbye_expires_at", now).await
}

/// Users in `remind_later` whose reminder is due before `now`.
pub async fn list_due_reminders(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<EngagementState>, NudgeError> {
    list_by_deadline(db, LifecycleState::RemindLater, "remind_at", now).await
}

/// A user's transition history, oldest first.
pub async fn list_transitions(
    db: &Database,
    user_id: &str,
) -> Result<Vec<StateTransitionRecord>, NudgeError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, trigger_name, previous_state, new_state, metadata, created_at \
                 FROM state_transitions WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(StateTransitionRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    trigger: get_enum(row, 2)?,
                    previous_state: get_enum(row, 3)?,
                    new_state: get_enum(row, 4)?,
                    metadata: get_params(row, 5)?,
                    created_at: get_ts(row, 6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of users in each lifecycle state. States with no users are omitted.
pub async fn state_counts(db: &Database) -> Result<Vec<(LifecycleState, u64)>, NudgeError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT state, COUNT(*) FROM engagement_states GROUP BY state ORDER BY state",
            )?;
            let rows = stmt.query_map([], |row| Ok((get_enum(row, 0)?, row.get::<_, i64>(1)? as u64)))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
