// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User profile reads (locale, delivery preference, opt-out flags).

use std::collections::HashMap;

use nudge_core::NudgeError;
use nudge_core::types::UserProfile;
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::models::get_enum;

/// Insert or replace a user's profile.
pub async fn upsert_profile(db: &Database, profile: &UserProfile) -> Result<(), NudgeError> {
    let profile = profile.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_profiles (user_id, locale, preferred_destination, \
                 individual_jid, group_jid, reengagement_opt_out, onboarding_tips_enabled) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                 locale = excluded.locale, \
                 preferred_destination = excluded.preferred_destination, \
                 individual_jid = excluded.individual_jid, \
                 group_jid = excluded.group_jid, \
                 reengagement_opt_out = excluded.reengagement_opt_out, \
                 onboarding_tips_enabled = excluded.onboarding_tips_enabled, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    profile.user_id,
                    profile.locale,
                    profile.preferred_destination.as_ref(),
                    profile.individual_jid,
                    profile.group_jid,
                    profile.reengagement_opt_out,
                    profile.onboarding_tips_enabled,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Load a user's profile.
pub async fn get_profile(db: &Database, user_id: &str) -> Result<Option<UserProfile>, NudgeError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, locale, preferred_destination, individual_jid, group_jid, \
                 reengagement_opt_out, onboarding_tips_enabled \
                 FROM user_profiles WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserProfile {
                        user_id: row.get(0)?,
                        locale: row.get(1)?,
                        preferred_destination: get_enum(row, 2)?,
                        individual_jid: row.get(3)?,
                        group_jid: row.get(4)?,
                        reengagement_opt_out: row.get(5)?,
                        onboarding_tips_enabled: row.get(6)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Opt-out flag per requested user; users without a profile map to `false`.
pub async fn get_opt_out_flags(
    db: &Database,
    user_ids: &[String],
) -> Result<HashMap<String, bool>, NudgeError> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let user_ids = user_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut flags: HashMap<String, bool> =
                user_ids.iter().map(|id| (id.clone(), false)).collect();
            // Stay well under SQLITE_MAX_VARIABLE_NUMBER.
            for chunk in user_ids.chunks(500) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT user_id, reengagement_opt_out FROM user_profiles \
                     WHERE user_id IN ({placeholders})"
                ))?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
                })?;
                for row in rows {
                    let (user_id, opted_out) = row?;
                    flags.insert(user_id, opted_out);
                }
            }
            Ok(flags)
        })
        .await
        .map_err(map_tr_err)
}
