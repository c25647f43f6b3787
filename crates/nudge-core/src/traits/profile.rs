// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read access to user profiles, opt-out flags, and delivery preferences.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::NudgeError;
use crate::types::{PreferredDestination, UserProfile};

/// Profile store owned by the surrounding application.
///
/// Only [`get_profile`](Self::get_profile) and
/// [`get_opt_out_flags`](Self::get_opt_out_flags) must be implemented; the
/// remaining lookups are derived from the profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Loads a user's profile.
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, NudgeError>;

    /// Re-engagement opt-out flag for each requested user. Users without a
    /// profile are reported as not opted out.
    async fn get_opt_out_flags(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, bool>, NudgeError>;

    /// Whether onboarding tips are enabled. Missing profiles count as disabled.
    async fn get_onboarding_tips_enabled(&self, user_id: &str) -> Result<bool, NudgeError> {
        Ok(self
            .get_profile(user_id)
            .await?
            .is_some_and(|p| p.onboarding_tips_enabled))
    }

    /// The user's locale, if a profile exists.
    async fn get_locale(&self, user_id: &str) -> Result<Option<String>, NudgeError> {
        Ok(self.get_profile(user_id).await?.map(|p| p.locale))
    }

    /// The user's preferred destination and the JID configured for it.
    async fn get_preferred_destination(
        &self,
        user_id: &str,
    ) -> Result<Option<PreferredDestination>, NudgeError> {
        Ok(self.get_profile(user_id).await?.map(|p| PreferredDestination {
            destination: p.preferred_destination,
            jid: p.preferred_jid().map(str::to_string),
        }))
    }
}
