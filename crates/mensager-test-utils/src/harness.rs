// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full ingestion stack over a temp SQLite
//! database: store, hub, recording publisher, pipeline, and the HTTP
//! router. `deliver()` drives one webhook body through the pipeline.

use std::sync::Arc;

use axum::Router;
use jsonwebtoken::{EncodingKey, Header, encode};
use mensager_bus::{Dispatcher, Hub, SessionConfig};
use mensager_config::model::{MensagerConfig, StorageConfig};
use mensager_core::{AccountId, Inbox, InboxId, InboxStore, MensagerError};
use mensager_gateway::{AuthState, Claims, GatewayState, build_router};
use mensager_ingest::{IngestOutcome, IngestionPipeline};
use mensager_storage::SqliteStorage;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::mock_media::MockMediaRehoster;
use crate::recording::RecordingPublisher;

/// Secret every harness router accepts; see [`TestHarness::token`].
pub const TEST_JWT_SECRET: &str = "mensager-test-secret";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    media: Option<Arc<MockMediaRehoster>>,
    outbox_capacity: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            media: None,
            outbox_capacity: 10,
        }
    }

    /// Route media through the given mock.
    pub fn with_media(mut self, media: MockMediaRehoster) -> Self {
        self.media = Some(Arc::new(media));
        self
    }

    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, MensagerError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| MensagerError::Storage { source: e.into() })?;
        let storage_config = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
            wal_mode: true,
        };
        let storage = SqliteStorage::new(storage_config.clone());
        storage.initialize().await?;
        let store = Arc::new(storage);

        let hub = Arc::new(Hub::new());
        let events = Arc::new(RecordingPublisher::new(hub.clone()));
        let dispatcher = Dispatcher::new(events.clone());
        let mut pipeline = IngestionPipeline::new(store.clone(), dispatcher.clone());
        if let Some(media) = &self.media {
            pipeline = pipeline.with_media(media.clone());
        }

        let mut config = MensagerConfig::default();
        config.storage = storage_config;
        config.realtime.outbox_capacity = self.outbox_capacity;
        config.auth.jwt_secret = Some(TEST_JWT_SECRET.to_string());
        config.media.storage_path = temp_dir.path().join("media").to_string_lossy().to_string();

        Ok(TestHarness {
            store,
            hub,
            events,
            dispatcher,
            pipeline,
            media: self.media,
            config,
            shutdown: CancellationToken::new(),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStorage>,
    pub hub: Arc<Hub>,
    /// Every event the dispatcher published, in order.
    pub events: Arc<RecordingPublisher>,
    pub dispatcher: Dispatcher,
    pub pipeline: IngestionPipeline,
    pub media: Option<Arc<MockMediaRehoster>>,
    pub config: MensagerConfig,
    /// Parent token for streaming sessions opened through [`Self::router`].
    pub shutdown: CancellationToken,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn create_inbox(&self, account_id: i64) -> Result<Inbox, MensagerError> {
        self.store
            .create_inbox(AccountId(account_id), "WhatsApp")
            .await
    }

    /// Runs a webhook body through the pipeline.
    pub async fn deliver(
        &self,
        inbox_id: InboxId,
        body: &Value,
    ) -> Result<IngestOutcome, MensagerError> {
        self.pipeline
            .handle_webhook(inbox_id, body.to_string().as_bytes())
            .await
    }

    /// The HTTP surface over the same store and publisher.
    pub fn router(&self) -> Router {
        let mut state = GatewayState::new(
            self.store.clone(),
            self.hub.clone(),
            self.pipeline.clone(),
            SessionConfig {
                outbox_capacity: self.config.realtime.outbox_capacity,
                ..SessionConfig::default()
            },
            self.shutdown.clone(),
        );
        state.dispatcher = self.dispatcher.clone();
        build_router(
            state,
            AuthState::from_secret(TEST_JWT_SECRET),
            std::path::Path::new(&self.config.media.storage_path),
        )
    }

    /// A token for `account_id` valid for ten minutes.
    pub fn token(&self, account_id: i64) -> String {
        let claims = Claims {
            sub: "1".to_string(),
            account_id,
            exp: Some((chrono::Utc::now().timestamp() + 600) as u64),
        };
        // Encoding HS256 with an in-memory key only fails on serializer bugs.
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .unwrap_or_default()
    }
}

/// An Evolution `Message` webhook carrying plain text.
pub fn webhook_message(external_id: &str, remote_jid: &str, from_me: bool, text: &str) -> Value {
    json!({
        "event": "Message",
        "instanceId": "test-instance",
        "instanceName": "test",
        "data": {
            "key": {"remoteJid": remote_jid, "fromMe": from_me, "id": external_id},
            "pushName": "Test Contact",
            "timestamp": chrono::Utc::now().timestamp(),
            "message": {"conversation": text}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_with_an_empty_database() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(
            harness
                .store
                .list_conversations(AccountId(1))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(harness.events.count(), 0);
        assert!(!harness.token(1).is_empty());
    }
}
