// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudge status` command implementation.
//!
//! Reports users per lifecycle state, queue counts and adapter health.

use std::io::IsTerminal;

use serde::Serialize;
use strum::IntoEnumIterator;

use nudge_config::model::NudgeConfig;
use nudge_core::types::{LifecycleState, QueueStats};
use nudge_core::{HealthStatus, NudgeError, PluginAdapter};

use crate::app::App;

#[derive(Debug, Serialize)]
pub struct StateCount {
    pub state: LifecycleState,
    pub users: u64,
}

#[derive(Debug, Serialize)]
pub struct AdapterHealth {
    pub name: String,
    pub healthy: bool,
    pub detail: String,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub states: Vec<StateCount>,
    pub queue: QueueStats,
    pub adapters: Vec<AdapterHealth>,
}

/// Every lifecycle state in declaration order, zero-filled.
fn fill_states(counts: &[(LifecycleState, u64)]) -> Vec<StateCount> {
    LifecycleState::iter()
        .map(|state| StateCount {
            state,
            users: counts
                .iter()
                .find(|(s, _)| *s == state)
                .map_or(0, |(_, n)| *n),
        })
        .collect()
}

async fn adapter_health(adapter: &dyn PluginAdapter) -> AdapterHealth {
    let (healthy, detail) = match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => (true, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (false, format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => (false, format!("unhealthy: {reason}")),
        Err(e) => (false, format!("error: {e}")),
    };
    AdapterHealth {
        name: adapter.name().to_string(),
        healthy,
        detail,
    }
}

async fn collect(app: &App) -> Result<StatusReport, NudgeError> {
    let counts =
        nudge_storage::queries::engagement::state_counts(app.storage.database()?).await?;
    let queue = app.engine.queue.stats().await?;
    let adapters = vec![
        adapter_health(app.storage.as_ref()).await,
        adapter_health(app.bridge.as_ref()).await,
    ];
    Ok(StatusReport {
        states: fill_states(&counts),
        queue,
        adapters,
    })
}

/// Run the `nudge status` command.
///
/// `--json` prints the report as JSON. `--plain`, or a non-TTY stdout,
/// disables colors.
pub async fn run_status(config: NudgeConfig, json: bool, plain: bool) -> Result<(), NudgeError> {
    let app = App::open(&config).await?;
    let report = collect(&app).await;
    app.shutdown().await;
    let report = report?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| NudgeError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{out}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(&report, use_color);
    }
    Ok(())
}

fn print_report(report: &StatusReport, use_color: bool) {
    println!();
    println!("  nudge status");
    println!("  {}", "-".repeat(35));

    println!("    Users:");
    for count in &report.states {
        println!("      {:<14}{}", count.state.as_ref(), count.users);
    }

    println!("    Queue:");
    println!("      {:<14}{}", "pending", report.queue.pending);
    println!("      {:<14}{}", "sent", report.queue.sent);
    println!("      {:<14}{}", "failed", report.queue.failed);

    println!("    Adapters:");
    for adapter in &report.adapters {
        println!("      {}", health_line(adapter, use_color));
    }
    println!();
}

fn health_line(adapter: &AdapterHealth, use_color: bool) -> String {
    if use_color {
        use colored::Colorize;
        if adapter.healthy {
            format!("{:<14}{} {}", adapter.name, "✓".green(), adapter.detail.green())
        } else {
            format!("{:<14}{} {}", adapter.name, "✗".red(), adapter.detail.red())
        }
    } else {
        let tag = if adapter.healthy { "[OK]" } else { "[FAIL]" };
        format!("{:<14}{tag} {}", adapter.name, adapter.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_states_are_zero_filled() {
        let states = fill_states(&[(LifecycleState::Dormant, 4), (LifecycleState::Active, 9)]);
        let pairs: Vec<_> = states.iter().map(|c| (c.state, c.users)).collect();
        assert_eq!(
            pairs,
            [
                (LifecycleState::Active, 9),
                (LifecycleState::GoodbyeSent, 0),
                (LifecycleState::RemindLater, 0),
                (LifecycleState::Dormant, 4),
            ]
        );
    }

    #[test]
    fn plain_health_line_uses_tags() {
        let ok = AdapterHealth {
            name: "sqlite".to_string(),
            healthy: true,
            detail: "healthy".to_string(),
        };
        let down = AdapterHealth {
            name: "whatsapp-bridge".to_string(),
            healthy: false,
            detail: "unhealthy: connection refused".to_string(),
        };
        assert!(health_line(&ok, false).contains("[OK] healthy"));
        assert!(health_line(&down, false).contains("[FAIL] unhealthy"));
    }

    #[test]
    fn report_serializes_state_names() {
        let report = StatusReport {
            states: fill_states(&[(LifecycleState::GoodbyeSent, 2)]),
            queue: QueueStats {
                pending: 1,
                sent: 5,
                failed: 0,
            },
            adapters: Vec::new(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"state\":\"goodbye_sent\",\"users\":2"));
        assert!(json.contains("\"pending\":1"));
    }

    #[tokio::test]
    async fn collect_reads_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NudgeConfig::default();
        config.storage.database_path = dir.path().join("status.db").to_string_lossy().into_owned();
        config.whatsapp.bridge_url = "http://127.0.0.1:9".to_string();
        let app = App::open(&config).await.unwrap();

        let report = collect(&app).await.unwrap();
        assert!(report.states.iter().all(|c| c.users == 0));
        assert_eq!(report.queue, QueueStats::default());
        assert!(report.adapters[0].healthy);
        assert!(!report.adapters[1].healthy);
        app.shutdown().await;
    }
}
