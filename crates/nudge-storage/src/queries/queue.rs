// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message queue with idempotent inserts and bounded retries.

use chrono::{DateTime, Utc};
use nudge_core::NudgeError;
use nudge_core::types::{NewQueuedMessage, QueueStats, QueueStatus, QueuedMessage};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{get_enum, get_opt_ts, get_params, get_ts, params_json, ts};

const MESSAGE_COLUMNS: &str = "id, user_id, message_type, message_key, message_params, \
                               destination, destination_jid, scheduled_for, status, retry_count, \
                               idempotency_key, sent_at, error_message, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueuedMessage> {
    Ok(QueuedMessage {
        id: row.get(0)?,
        user_id: row.get(1)?,
        message_type: get_enum(row, 2)?,
        message_key: row.get(3)?,
        message_params: get_params(row, 4)?,
        destination: get_enum(row, 5)?,
        destination_jid: row.get(6)?,
        scheduled_for: get_ts(row, 7)?,
        status: get_enum(row, 8)?,
        retry_count: row.get(9)?,
        idempotency_key: row.get(10)?,
        sent_at: get_opt_ts(row, 11)?,
        error_message: row.get(12)?,
        created_at: get_ts(row, 13)?,
    })
}

/// Insert a message unless its idempotency key is already taken.
///
/// Returns `true` when a new row was written.
pub async fn insert_message(db: &Database, message: &NewQueuedMessage) -> Result<bool, NudgeError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO message_queue (user_id, message_type, message_key, message_params, \
                 destination, destination_jid, scheduled_for, idempotency_key) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(idempotency_key) DO NOTHING",
                params![
                    message.user_id,
                    message.message_type.as_ref(),
                    message.message_key,
                    params_json(&message.message_params)?,
                    message.destination.as_ref(),
                    message.destination_jid,
                    ts(&message.scheduled_for),
                    message.idempotency_key,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Pending, unclaimed messages scheduled at or before `now`, oldest first.
pub async fn fetch_due(
    db: &Database,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<QueuedMessage>, NudgeError> {
    let now = ts(&now);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM message_queue \
                 WHERE status = 'pending' AND scheduled_for <= ?1 \
                 AND (locked_until IS NULL OR locked_until <= ?1) \
                 ORDER BY scheduled_for ASC, id ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![now, limit], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Claim a pending message until `lease_until`.
///
/// The guarded update lets exactly one concurrent processor win the row.
pub async fn claim_message(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
) -> Result<bool, NudgeError> {
    let now = ts(&now);
    let lease_until = ts(&lease_until);
    db.connection()
        .call(move |conn| {
            let claimed = conn.execute(
                "UPDATE message_queue SET locked_until = ?3, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?1 AND status = 'pending' \
                 AND (locked_until IS NULL OR locked_until <= ?2)",
                params![id, now, lease_until],
            )?;
            Ok(claimed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a message as delivered.
pub async fn mark_sent(db: &Database, id: i64, at: DateTime<Utc>) -> Result<(), NudgeError> {
    let at = ts(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE message_queue SET status = 'sent', sent_at = ?2, error_message = NULL, \
                 locked_until = NULL, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?1",
                params![id, at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed delivery attempt.
///
/// Increments `retry_count`. The message stays pending while the count is
/// below `max_retries` and becomes `failed` once it reaches it.
pub async fn record_failure(
    db: &Database,
    id: i64,
    error: &str,
    max_retries: u32,
) -> Result<QueueStatus, NudgeError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let retry_count: u32 = tx.query_row(
                "SELECT retry_count FROM message_queue WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;

            let attempts = retry_count + 1;
            let status = if attempts >= max_retries {
                QueueStatus::Failed
            } else {
                QueueStatus::Pending
            };
            tx.execute(
                "UPDATE message_queue SET status = ?2, retry_count = ?3, error_message = ?4, \
                 locked_until = NULL, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?1",
                params![id, status.as_ref(), attempts, error],
            )?;
            tx.commit()?;
            Ok(status)
        })
        .await
        .map_err(map_tr_err)
}

/// Load a message by id.
pub async fn get_message(db: &Database, id: i64) -> Result<Option<QueuedMessage>, NudgeError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM message_queue WHERE id = ?1"),
                params![id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Rows with the given idempotency key (0 or 1).
pub async fn count_by_idempotency_key(db: &Database, key: &str) -> Result<u64, NudgeError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM message_queue WHERE idempotency_key = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// Message counts per status.
pub async fn queue_stats(db: &Database) -> Result<QueueStats, NudgeError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT \
                 COALESCE(SUM(status = 'pending'), 0), \
                 COALESCE(SUM(status = 'sent'), 0), \
                 COALESCE(SUM(status = 'failed'), 0) \
                 FROM message_queue",
                [],
                |row| {
                    Ok(QueueStats {
                        pending: row.get::<_, i64>(0)? as u64,
                        sent: row.get::<_, i64>(1)? as u64,
                        failed: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nudge_core::types::{Destination, MessageType};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 20, 10, 0, 0).unwrap()
    }

    fn message(user_id: &str, key: &str, scheduled_for: DateTime<Utc>) -> NewQueuedMessage {
        NewQueuedMessage {
            user_id: user_id.to_string(),
            message_type: MessageType::Goodbye,
            message_key: "engagement.goodbye.self_select".to_string(),
            message_params: [("name".to_string(), "Ana".to_string())].into(),
            destination: Destination::Individual,
            destination_jid: format!("{user_id}@s.whatsapp.net"),
            scheduled_for,
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_ignored() {
        let db = Database::open_in_memory().await.unwrap();
        let msg = message("u1", "u1:goodbye_sent:2026-03-20", now());
        assert!(insert_message(&db, &msg).await.unwrap());
        assert!(!insert_message(&db, &msg).await.unwrap());
        assert_eq!(
            count_by_idempotency_key(&db, "u1:goodbye_sent:2026-03-20")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn fetch_due_skips_future_and_orders_oldest_first() {
        let db = Database::open_in_memory().await.unwrap();
        insert_message(&db, &message("late", "k-late", now())).await.unwrap();
        insert_message(&db, &message("early", "k-early", now() - Duration::hours(2)))
            .await
            .unwrap();
        insert_message(&db, &message("future", "k-future", now() + Duration::hours(1)))
            .await
            .unwrap();

        let due = fetch_due(&db, now(), 100).await.unwrap();
        let users: Vec<_> = due.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(users, ["early", "late"]);
        assert_eq!(due[0].message_params["name"], "Ana");
        assert_eq!(due[0].status, QueueStatus::Pending);

        assert_eq!(fetch_due(&db, now(), 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failures_exhaust_after_max_retries() {
        let db = Database::open_in_memory().await.unwrap();
        insert_message(&db, &message("u1", "k1", now())).await.unwrap();
        let id = fetch_due(&db, now(), 10).await.unwrap()[0].id;

        assert_eq!(record_failure(&db, id, "timeout", 3).await.unwrap(), QueueStatus::Pending);
        assert_eq!(record_failure(&db, id, "timeout", 3).await.unwrap(), QueueStatus::Pending);
        assert_eq!(record_failure(&db, id, "bridge down", 3).await.unwrap(), QueueStatus::Failed);

        let stored = get_message(&db, id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 3);
        assert_eq!(stored.error_message.as_deref(), Some("bridge down"));
        assert!(fetch_due(&db, now(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claimed_message_is_held_until_attempt_recorded() {
        let db = Database::open_in_memory().await.unwrap();
        insert_message(&db, &message("u1", "k1", now())).await.unwrap();
        let id = fetch_due(&db, now(), 10).await.unwrap()[0].id;
        let lease = now() + Duration::minutes(10);

        assert!(claim_message(&db, id, now(), lease).await.unwrap());
        assert!(!claim_message(&db, id, now(), lease).await.unwrap());
        assert!(fetch_due(&db, now(), 10).await.unwrap().is_empty());

        // An abandoned claim frees up once the lease runs out.
        let later = lease + Duration::seconds(1);
        assert_eq!(fetch_due(&db, later, 10).await.unwrap().len(), 1);

        record_failure(&db, id, "timeout", 3).await.unwrap();
        assert_eq!(fetch_due(&db, now(), 10).await.unwrap().len(), 1);
        assert!(claim_message(&db, id, now(), lease).await.unwrap());
        mark_sent(&db, id, now()).await.unwrap();
        assert!(!claim_message(&db, id, later, later).await.unwrap());
    }

    #[tokio::test]
    async fn mark_sent_and_stats() {
        let db = Database::open_in_memory().await.unwrap();
        insert_message(&db, &message("a", "ka", now())).await.unwrap();
        insert_message(&db, &message("b", "kb", now())).await.unwrap();
        let due = fetch_due(&db, now(), 10).await.unwrap();
        mark_sent(&db, due[0].id, now()).await.unwrap();

        let sent = get_message(&db, due[0].id).await.unwrap().unwrap();
        assert_eq!(sent.status, QueueStatus::Sent);
        assert_eq!(sent.sent_at, Some(now()));

        let stats = queue_stats(&db).await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                pending: 1,
                sent: 1,
                failed: 0
            }
        );
    }
}
