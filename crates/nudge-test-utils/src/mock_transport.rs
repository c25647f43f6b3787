// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` implements `Transport`, capturing delivered messages and
//! counting attempts. It can be disconnected or told to reject sends.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use nudge_core::types::{AdapterType, HealthStatus};
use nudge_core::{NudgeError, PluginAdapter, Transport};

/// A message accepted by [`MockTransport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub jid: String,
    pub text: String,
}

/// A mock chat transport.
///
/// - **sent**: successful deliveries, retrievable via `sent_messages()`
/// - **attempts**: every JID passed to `send()`, successful or not
pub struct MockTransport {
    connected: AtomicBool,
    fail_all: AtomicBool,
    failing_jids: Arc<Mutex<HashSet<String>>>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create a connected transport that accepts every message.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            fail_all: AtomicBool::new(false),
            failing_jids: Arc::new(Mutex::new(HashSet::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a transport that reports itself as disconnected.
    pub fn disconnected() -> Self {
        let transport = Self::new();
        transport.set_connected(false);
        transport
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Reject every send with a transport error.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Reject sends addressed to `jid`.
    pub async fn fail_jid(&self, jid: &str) {
        self.failing_jids.lock().await.insert(jid.to_string());
    }

    /// Get all messages that were delivered.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the count of delivered messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// JIDs of every send attempt, in order.
    pub async fn attempts(&self) -> Vec<String> {
        self.attempts.lock().await.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy("disconnected".to_string()))
        }
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, jid: &str, text: &str) -> Result<(), NudgeError> {
        self.attempts.lock().await.push(jid.to_string());
        if self.fail_all.load(Ordering::SeqCst) || self.failing_jids.lock().await.contains(jid) {
            return Err(NudgeError::transport(format!("mock delivery to {jid} rejected")));
        }
        self.sent.lock().await.push(SentMessage {
            jid: jid.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
