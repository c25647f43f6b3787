// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of storage, transport, catalog and engine from configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use nudge_config::model::NudgeConfig;
use nudge_core::{NudgeError, PluginAdapter, StorageAdapter};
use nudge_engagement::{Catalog, EngagementEngine, EngagementSettings, JobResult, Stores};
use nudge_storage::SqliteStorage;
use nudge_whatsapp::WhatsAppBridge;

/// A job that can be run on demand or on a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    /// Inactivity detection, goodbye timeouts, due reminders, queue drain.
    Daily,
    /// Weekly review messages for recently active users.
    Weekly,
    /// Drain the outbound message queue.
    Queue,
}

/// The running application: opened storage, bridge client and engine.
pub struct App {
    pub storage: Arc<SqliteStorage>,
    pub bridge: Arc<WhatsAppBridge>,
    pub engine: EngagementEngine,
}

impl App {
    /// Open storage (running migrations) and build the engine.
    pub async fn open(config: &NudgeConfig) -> Result<Self, NudgeError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let bridge = Arc::new(WhatsAppBridge::new(&config.whatsapp)?);
        let catalog = Catalog::load(
            &config.engagement.default_locale,
            config.engagement.catalog_path.as_deref().map(Path::new),
        )?;
        let settings = EngagementSettings::from_config(config);

        let engine = EngagementEngine::new(
            Stores::from_shared(storage.clone()),
            bridge.clone(),
            Arc::new(catalog),
            settings,
        );
        info!(database = %config.storage.database_path, "engine ready");

        Ok(Self {
            storage,
            bridge,
            engine,
        })
    }

    /// Run one job at `now`.
    pub async fn run_job(&self, kind: JobKind, now: DateTime<Utc>) -> Result<JobResult, NudgeError> {
        match kind {
            JobKind::Daily => Ok(self.engine.daily_job().run_at(now).await),
            JobKind::Weekly => self.engine.weekly_job().run_at(now).await,
            JobKind::Queue => {
                let started = Instant::now();
                let processed = self.engine.processor.process_message_queue(now).await?;
                let mut result = JobResult::new("queue");
                result.processed = processed.processed;
                result.succeeded = processed.succeeded;
                result.failed = processed.failed;
                result.errors = processed.errors.clone();
                result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                result.queue = Some(processed);
                Ok(result)
            }
        }
    }

    /// Flush storage and release the bridge client.
    pub async fn shutdown(&self) {
        if let Err(e) = self.bridge.shutdown().await {
            warn!(error = %e, "bridge shutdown failed");
        }
        if let Err(e) = self.storage.close().await {
            warn!(error = %e, "storage close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_config::model::NudgeConfig;

    fn config(dir: &tempfile::TempDir) -> NudgeConfig {
        let mut config = NudgeConfig::default();
        config.storage.database_path = dir.path().join("app.db").to_string_lossy().into_owned();
        config.whatsapp.bridge_url = "http://127.0.0.1:9".to_string();
        config.queue.send_delay_ms = 0;
        config
    }

    #[test]
    fn job_kind_names() {
        assert_eq!(JobKind::Daily.to_string(), "daily");
        assert_eq!(JobKind::Queue.to_string(), "queue");
    }

    #[tokio::test]
    async fn queue_job_with_unreachable_bridge_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(&config(&dir)).await.unwrap();

        let result = app.run_job(JobKind::Queue, Utc::now()).await.unwrap();
        assert_eq!(result.job, "queue");
        assert_eq!(result.processed, 0);
        assert!(result.queue.is_some());
        app.shutdown().await;
    }

    #[tokio::test]
    async fn daily_job_on_empty_database_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(&config(&dir)).await.unwrap();

        let result = app.run_job(JobKind::Daily, Utc::now()).await.unwrap();
        assert_eq!(result.job, "daily");
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 0);
        app.shutdown().await;
    }
}
