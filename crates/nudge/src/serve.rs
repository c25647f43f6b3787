// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudge serve` command implementation.
//!
//! Opens storage and the bridge client, starts the Prometheus listener and
//! the memory monitor, then runs the cron schedules until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use nudge_config::model::NudgeConfig;
use nudge_core::NudgeError;

use crate::app::App;
use crate::scheduler;
use crate::shutdown;

/// Crates whose logs follow the configured level.
const LOG_TARGETS: &[&str] = &[
    "nudge",
    "nudge_config",
    "nudge_engagement",
    "nudge_prometheus",
    "nudge_storage",
    "nudge_whatsapp",
];

/// Runs the `nudge serve` command.
pub async fn run_serve(config: NudgeConfig) -> Result<(), NudgeError> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting nudge");

    #[cfg(feature = "prometheus")]
    let _prometheus = start_prometheus(&config.prometheus);

    let cancel = shutdown::install_signal_handler();
    let app = Arc::new(App::open(&config).await?);

    let monitor = tokio::spawn(memory_monitor(cancel.clone()));

    if config.schedule.enabled {
        let schedules = scheduler::schedules(&config.schedule)?;
        for handle in scheduler::run_scheduler(app.clone(), schedules, cancel.clone()) {
            if let Err(e) = handle.await {
                error!(error = %e, "schedule task panicked");
            }
        }
    } else {
        info!("built-in scheduler disabled, waiting for shutdown signal");
        cancel.cancelled().await;
    }

    if let Err(e) = monitor.await {
        error!(error = %e, "memory monitor task panicked");
    }
    app.shutdown().await;
    info!("nudge stopped");
    Ok(())
}

#[cfg(feature = "prometheus")]
fn start_prometheus(
    config: &nudge_config::model::PrometheusConfig,
) -> Option<nudge_prometheus::PrometheusAdapter> {
    use tracing::warn;

    if !config.enabled {
        return None;
    }
    let addr = match config.listen_address.parse::<std::net::SocketAddr>() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(address = %config.listen_address, error = %e, "invalid prometheus listen address");
            return None;
        }
    };
    match nudge_prometheus::PrometheusAdapter::with_listener(addr) {
        Ok(adapter) => {
            info!(address = %addr, "prometheus exporter listening");
            Some(adapter)
        }
        Err(e) => {
            warn!(error = %e, "prometheus exporter not started");
            None
        }
    }
}

/// Periodically sample jemalloc stats into the memory gauges.
#[cfg(not(target_env = "msvc"))]
async fn memory_monitor(cancel: tokio_util::sync::CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let _ = tikv_jemalloc_ctl::epoch::advance();
                let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
                let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);

                #[cfg(feature = "prometheus")]
                {
                    nudge_prometheus::set_memory_heap(allocated as f64);
                    nudge_prometheus::set_memory_resident(resident as f64);
                }
                debug!(allocated, resident, "memory sampled");
            }
            _ = cancel.cancelled() => {
                debug!("memory monitor stopped");
                return;
            }
        }
    }
}

#[cfg(target_env = "msvc")]
async fn memory_monitor(cancel: tokio_util::sync::CancellationToken) {
    cancel.cancelled().await;
}

fn log_filter(log_level: &str) -> String {
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
