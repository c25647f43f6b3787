// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Nudge engagement engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Nudge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NudgeConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Lifecycle windows and localization.
    #[serde(default)]
    pub engagement: EngagementConfig,

    /// Outbound queue drain settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Built-in job scheduler.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// WhatsApp bridge transport.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("nudge").join("nudge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("nudge.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Engagement lifecycle windows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngagementConfig {
    /// Days without activity before a goodbye message is queued.
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: u32,

    /// Hours a user has to answer a goodbye message.
    #[serde(default = "default_goodbye_window_hours")]
    pub goodbye_window_hours: u32,

    /// Days a "remind me later" answer postpones the follow-up.
    #[serde(default = "default_remind_later_days")]
    pub remind_later_days: u32,

    /// Lookback window of the weekly review job.
    #[serde(default = "default_active_window_days")]
    pub active_window_days: u32,

    /// Locale used when a user has no profile or an unknown locale.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Optional TOML file overriding built-in message templates.
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            inactivity_days: default_inactivity_days(),
            goodbye_window_hours: default_goodbye_window_hours(),
            remind_later_days: default_remind_later_days(),
            active_window_days: default_active_window_days(),
            default_locale: default_locale(),
            catalog_path: None,
        }
    }
}

fn default_inactivity_days() -> u32 {
    14
}

fn default_goodbye_window_hours() -> u32 {
    48
}

fn default_remind_later_days() -> u32 {
    14
}

fn default_active_window_days() -> u32 {
    7
}

fn default_locale() -> String {
    "pt-BR".to_string()
}

/// Outbound queue drain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum messages processed per drain.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delivery attempts before a message is marked failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between consecutive sends, in milliseconds.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            send_delay_ms: default_send_delay_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_send_delay_ms() -> u64 {
    500
}

/// Built-in scheduler configuration. Expressions use the five-field cron format.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Run jobs from `nudge serve`. Disable when an external cron invokes `nudge run`.
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,

    /// Daily engagement job.
    #[serde(default = "default_daily_cron")]
    pub daily_cron: String,

    /// Weekly review job.
    #[serde(default = "default_weekly_cron")]
    pub weekly_cron: String,

    /// Standalone queue drain between daily runs.
    #[serde(default = "default_queue_cron")]
    pub queue_cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            daily_cron: default_daily_cron(),
            weekly_cron: default_weekly_cron(),
            queue_cron: default_queue_cron(),
        }
    }
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_daily_cron() -> String {
    "0 10 * * *".to_string()
}

fn default_weekly_cron() -> String {
    "0 10 * * 0".to_string()
}

fn default_queue_cron() -> String {
    "*/15 * * * *".to_string()
}

/// WhatsApp bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Base URL of the bridge HTTP API.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Bearer token sent to the bridge.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Prometheus metrics export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,

    /// Address of the scrape endpoint started by `nudge serve`.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: default_listen_address(),
        }
    }
}

fn default_listen_address() -> String {
    "127.0.0.1:9464".to_string()
}
