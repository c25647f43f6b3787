// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Activity and transaction lookups over rolling windows.

use chrono::{DateTime, Utc};
use nudge_core::NudgeError;
use nudge_core::types::{ActiveUserSummary, Destination, InactiveUser, TransactionActivity};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{get_enum, get_ts, ts};

/// Record one transaction for a user. Returns the row id.
pub async fn record_transaction(
    db: &Database,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<i64, NudgeError> {
    let user_id = user_id.to_string();
    let at = ts(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO transactions (user_id, created_at) VALUES (?1, ?2)",
                params![user_id, at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// `active` users whose last activity is older than `threshold` and who
/// created no transaction since then.
pub async fn list_users_inactive_since(
    db: &Database,
    threshold: DateTime<Utc>,
) -> Result<Vec<InactiveUser>, NudgeError> {
    let threshold = ts(&threshold);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT e.user_id, e.last_activity_at FROM engagement_states e \
                 WHERE e.state = 'active' AND e.last_activity_at < ?1 \
                   AND NOT EXISTS (SELECT 1 FROM transactions t \
                                   WHERE t.user_id = e.user_id AND t.created_at >= ?1) \
                 ORDER BY e.last_activity_at ASC, e.user_id ASC",
            )?;
            let rows = stmt.query_map(params![threshold], |row| {
                Ok(InactiveUser {
                    user_id: row.get(0)?,
                    last_activity_at: get_ts(row, 1)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Per-user transaction counts since `since`.
pub async fn list_transaction_activity_since(
    db: &Database,
    since: DateTime<Utc>,
) -> Result<Vec<TransactionActivity>, NudgeError> {
    let since = ts(&since);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, COUNT(*) FROM transactions WHERE created_at >= ?1 \
                 GROUP BY user_id ORDER BY user_id",
            )?;
            let rows = stmt.query_map(params![since], |row| {
                Ok(TransactionActivity {
                    user_id: row.get(0)?,
                    transaction_count: row.get::<_, i64>(1)? as u64,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Transactions a single user created since `since`.
pub async fn count_transactions_since(
    db: &Database,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<u64, NudgeError> {
    let user_id = user_id.to_string();
    let since = ts(&since);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM transactions WHERE user_id = ?1 AND created_at >= ?2",
                params![user_id, since],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// Non-dormant, non-opted-out users with a transaction or bot activity
/// since `since`, joined with their delivery preferences.
///
/// Users without a profile default to individual delivery and no JID.
pub async fn list_active_users_since(
    db: &Database,
    since: DateTime<Utc>,
) -> Result<Vec<ActiveUserSummary>, NudgeError> {
    let since = ts(&since);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT e.user_id, COALESCE(t.cnt, 0), \
                        COALESCE(p.preferred_destination, 'individual'), \
                        p.individual_jid, p.group_jid, p.locale, e.last_activity_at \
                 FROM engagement_states e \
                 LEFT JOIN user_profiles p ON p.user_id = e.user_id \
                 LEFT JOIN (SELECT user_id, COUNT(*) AS cnt FROM transactions \
                            WHERE created_at >= ?1 GROUP BY user_id) t \
                        ON t.user_id = e.user_id \
                 WHERE e.state != 'dormant' \
                   AND COALESCE(p.reengagement_opt_out, 0) = 0 \
                   AND (e.last_activity_at >= ?1 OR COALESCE(t.cnt, 0) > 0) \
                 ORDER BY e.user_id",
            )?;
            let rows = stmt.query_map(params![since], |row| {
                let destination: Destination = get_enum(row, 2)?;
                let individual_jid: Option<String> = row.get(3)?;
                let group_jid: Option<String> = row.get(4)?;
                Ok(ActiveUserSummary {
                    user_id: row.get(0)?,
                    transaction_count: row.get::<_, i64>(1)? as u64,
                    destination,
                    destination_jid: match destination {
                        Destination::Individual => individual_jid,
                        Destination::Group => group_jid,
                    },
                    locale: row.get(5)?,
                    last_activity_at: get_ts(row, 6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::engagement::create_state;
    use crate::queries::profiles::upsert_profile;
    use chrono::{Duration, TimeZone};
    use nudge_core::types::UserProfile;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 20, 10, 0, 0).unwrap()
    }

    fn profile(user_id: &str, opt_out: bool, destination: Destination) -> UserProfile {
        UserProfile {
            user_id: user_id.to_string(),
            locale: "pt-BR".to_string(),
            preferred_destination: destination,
            individual_jid: Some(format!("{user_id}@s.whatsapp.net")),
            group_jid: Some(format!("{user_id}-group@g.us")),
            reengagement_opt_out: opt_out,
            onboarding_tips_enabled: true,
        }
    }

    #[tokio::test]
    async fn recent_transaction_keeps_user_off_inactive_list() {
        let db = Database::open_in_memory().await.unwrap();
        let old = now() - Duration::days(20);
        create_state(&db, "quiet", old).await.unwrap();
        create_state(&db, "spender", old).await.unwrap();
        create_state(&db, "fresh", now() - Duration::days(2)).await.unwrap();
        record_transaction(&db, "spender", now() - Duration::days(1))
            .await
            .unwrap();

        let inactive = list_users_inactive_since(&db, now() - Duration::days(14))
            .await
            .unwrap();
        let ids: Vec<_> = inactive.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, ["quiet"]);
    }

    #[tokio::test]
    async fn transaction_counts_respect_window() {
        let db = Database::open_in_memory().await.unwrap();
        for days_ago in [1, 3, 10] {
            record_transaction(&db, "u1", now() - Duration::days(days_ago))
                .await
                .unwrap();
        }
        let since = now() - Duration::days(7);
        assert_eq!(count_transactions_since(&db, "u1", since).await.unwrap(), 2);
        assert_eq!(count_transactions_since(&db, "u2", since).await.unwrap(), 0);

        let activity = list_transaction_activity_since(&db, since).await.unwrap();
        assert_eq!(
            activity,
            vec![TransactionActivity {
                user_id: "u1".to_string(),
                transaction_count: 2
            }]
        );
    }

    #[tokio::test]
    async fn weekly_candidates_exclude_opt_out_and_stale_users() {
        let db = Database::open_in_memory().await.unwrap();
        let since = now() - Duration::days(7);

        create_state(&db, "chatty", now() - Duration::days(1)).await.unwrap();
        create_state(&db, "buyer", now() - Duration::days(30)).await.unwrap();
        create_state(&db, "stale", now() - Duration::days(30)).await.unwrap();
        create_state(&db, "opted", now() - Duration::days(1)).await.unwrap();
        record_transaction(&db, "buyer", now() - Duration::days(2))
            .await
            .unwrap();
        upsert_profile(&db, &profile("buyer", false, Destination::Group))
            .await
            .unwrap();
        upsert_profile(&db, &profile("opted", true, Destination::Individual))
            .await
            .unwrap();

        let users = list_active_users_since(&db, since).await.unwrap();
        let ids: Vec<_> = users.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, ["buyer", "chatty"]);

        let buyer = &users[0];
        assert_eq!(buyer.transaction_count, 1);
        assert_eq!(buyer.destination, Destination::Group);
        assert_eq!(buyer.destination_jid.as_deref(), Some("buyer-group@g.us"));

        let chatty = &users[1];
        assert_eq!(chatty.destination, Destination::Individual);
        assert!(chatty.destination_jid.is_none());
        assert!(chatty.locale.is_none());
    }
}
