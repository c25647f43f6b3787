// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Nudge engagement engine.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text via [`PrometheusAdapter::render`], which
//! `nudge serve` exposes on the configured listen address.

pub mod recording;

use std::net::SocketAddr;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use nudge_core::types::{AdapterType, HealthStatus};
use nudge_core::{NudgeError, PluginAdapter};

pub use recording::{
    record_delivery, record_job, record_message_queued, record_transition,
    record_transition_noop, register_metrics, set_memory_heap, set_memory_resident,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, NudgeError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            NudgeError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Install the recorder and serve the scrape endpoint on `addr`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_listener(addr: SocketAddr) -> Result<Self, NudgeError> {
        let builder = PrometheusBuilder::new().with_http_listener(addr);
        let (recorder, exporter) = builder.build().map_err(|e| {
            NudgeError::Internal(format!("failed to build Prometheus exporter: {e}"))
        })?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| {
            NudgeError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "prometheus exporter stopped");
            }
        });

        recording::register_metrics();
        tracing::info!(%addr, "prometheus scrape endpoint listening");

        Ok(Self { handle })
    }

    /// Get a reference to the Prometheus handle for rendering.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Only one global recorder per process, so every assertion that needs
    // an installed recorder lives in this single test.
    #[tokio::test]
    async fn adapter_installs_recorder_and_renders() {
        let adapter = PrometheusAdapter::new().expect("recorder installs once");
        assert_eq!(adapter.name(), "prometheus");
        assert_eq!(adapter.adapter_type(), AdapterType::Observability);
        assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Healthy);

        record_transition("inactivity_14d", "active", "goodbye_sent");
        record_transition_noop("goodbye_timeout");
        record_message_queued("goodbye");
        record_delivery("goodbye", "sent");

        let output = adapter.render();
        assert!(output.contains("nudge_transitions_total"));
        assert!(output.contains("trigger=\"inactivity_14d\""));
        assert!(output.contains("nudge_transition_noops_total"));
        assert!(output.contains("nudge_messages_total"));

        assert!(PrometheusAdapter::new().is_err(), "second install must fail");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_job("daily", 0.25, 2);
        set_memory_heap(1024.0);
        set_memory_resident(2048.0);
    }
}
