// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as positive windows, parseable cron expressions, and locale tags.

use crate::diagnostic::ConfigError;
use crate::model::NudgeConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &NudgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.engine.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "engine.log_level `{}` must be one of {}",
            config.engine.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let engagement = &config.engagement;
    for (key, value) in [
        ("engagement.inactivity_days", engagement.inactivity_days),
        ("engagement.goodbye_window_hours", engagement.goodbye_window_hours),
        ("engagement.remind_later_days", engagement.remind_later_days),
        ("engagement.active_window_days", engagement.active_window_days),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be greater than 0"
            )));
        }
    }

    if !is_locale_tag(&engagement.default_locale) {
        errors.push(ConfigError::validation(format!(
            "engagement.default_locale `{}` is not a locale tag like `pt-BR` or `en`",
            engagement.default_locale
        )));
    }

    if let Some(path) = &engagement.catalog_path
        && path.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "engagement.catalog_path must not be empty when set",
        ));
    }

    if config.queue.batch_size == 0 {
        errors.push(ConfigError::validation(
            "queue.batch_size must be greater than 0",
        ));
    }

    if config.queue.max_retries == 0 {
        errors.push(ConfigError::validation(
            "queue.max_retries must be at least 1",
        ));
    }

    for (key, expression) in [
        ("schedule.daily_cron", &config.schedule.daily_cron),
        ("schedule.weekly_cron", &config.schedule.weekly_cron),
        ("schedule.queue_cron", &config.schedule.queue_cron),
    ] {
        if let Err(e) = expression.parse::<croner::Cron>() {
            errors.push(ConfigError::InvalidCron {
                key: key.to_string(),
                expression: expression.clone(),
                reason: e.to_string(),
            });
        }
    }

    let bridge = config.whatsapp.bridge_url.trim();
    if !(bridge.starts_with("http://") || bridge.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "whatsapp.bridge_url `{bridge}` must start with http:// or https://"
        )));
    }

    if config.whatsapp.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "whatsapp.timeout_secs must be greater than 0",
        ));
    }

    if config.prometheus.enabled
        && config
            .prometheus
            .listen_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ConfigError::validation(format!(
            "prometheus.listen_address `{}` is not a valid socket address",
            config.prometheus.listen_address
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `ll`, `lll`, or either followed by `-RR` (e.g. `en`, `pt-BR`).
fn is_locale_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let language = parts.next().unwrap_or_default();
    let region = parts.next();
    let language_ok =
        (2..=3).contains(&language.len()) && language.chars().all(|c| c.is_ascii_lowercase());
    let region_ok = region.is_none_or(|r| r.len() == 2 && r.chars().all(|c| c.is_ascii_uppercase()));
    language_ok && region_ok && parts.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = NudgeConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = NudgeConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("storage.database_path"));
    }

    #[test]
    fn zero_windows_are_all_reported() {
        let mut config = NudgeConfig::default();
        config.engagement.inactivity_days = 0;
        config.engagement.goodbye_window_hours = 0;
        config.queue.batch_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn bad_cron_expression_is_reported_with_key() {
        let mut config = NudgeConfig::default();
        config.schedule.weekly_cron = "every sunday".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ConfigError::InvalidCron { key, expression, .. } => {
                assert_eq!(key, "schedule.weekly_cron");
                assert_eq!(expression, "every sunday");
            }
            other => panic!("expected InvalidCron, got {other:?}"),
        }
    }

    #[test]
    fn locale_tags() {
        assert!(is_locale_tag("pt-BR"));
        assert!(is_locale_tag("en"));
        assert!(!is_locale_tag("pt_BR"));
        assert!(!is_locale_tag("PT-br"));
        assert!(!is_locale_tag(""));
        assert!(!is_locale_tag("en-US-x"));
    }

    #[test]
    fn listen_address_only_checked_when_enabled() {
        let mut config = NudgeConfig::default();
        config.prometheus.listen_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());
        config.prometheus.enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = NudgeConfig::default();
        config.engine.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }
}
