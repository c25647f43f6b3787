// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp transport backed by an HTTP bridge.
//!
//! The bridge owns the WhatsApp session and exposes two endpoints:
//! `GET {bridge}/status` returning `{"connected": bool}` and
//! `POST {bridge}/send` accepting `{"jid", "text"}`. Requests carry a
//! bearer token when one is configured.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use nudge_config::model::WhatsAppConfig;
use nudge_core::types::{AdapterType, HealthStatus};
use nudge_core::{NudgeError, PluginAdapter, Transport};

use crate::types::{BridgeError, BridgeStatus, SendRequest};

/// HTTP client for the WhatsApp bridge.
#[derive(Debug, Clone)]
pub struct WhatsAppBridge {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl WhatsAppBridge {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, NudgeError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| NudgeError::Config(format!("invalid bridge token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| NudgeError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.bridge_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    fn request_error(&self, what: &str, e: reqwest::Error) -> NudgeError {
        if e.is_timeout() {
            NudgeError::Timeout {
                duration: self.timeout,
            }
        } else {
            NudgeError::Transport {
                message: format!("{what} request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }

    /// Query the bridge session status.
    pub async fn status(&self) -> Result<BridgeStatus, NudgeError> {
        let response = self
            .client
            .get(self.url("status"))
            .send()
            .await
            .map_err(|e| self.request_error("status", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NudgeError::transport(format!("bridge status returned {status}")));
        }
        response
            .json::<BridgeStatus>()
            .await
            .map_err(|e| NudgeError::Transport {
                message: format!("invalid bridge status body: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppBridge {
    fn name(&self) -> &str {
        "whatsapp-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        Ok(match self.status().await {
            Ok(BridgeStatus { connected: true }) => HealthStatus::Healthy,
            Ok(BridgeStatus { connected: false }) => {
                HealthStatus::Degraded("bridge up, WhatsApp session disconnected".to_string())
            }
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for WhatsAppBridge {
    async fn is_connected(&self) -> bool {
        match self.status().await {
            Ok(status) => status.connected,
            Err(e) => {
                warn!(error = %e, "bridge status check failed");
                false
            }
        }
    }

    async fn send(&self, jid: &str, text: &str) -> Result<(), NudgeError> {
        let response = self
            .client
            .post(self.url("send"))
            .json(&SendRequest { jid, text })
            .send()
            .await
            .map_err(|e| self.request_error("send", e))?;

        let status = response.status();
        debug!(status = %status, jid, "bridge send response received");
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<BridgeError>(&body) {
            Ok(err) => format!("bridge rejected message ({status}): {}", err.error),
            Err(_) => format!("bridge returned {status}: {body}"),
        };
        Err(NudgeError::transport(message))
    }
}
