// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ingestion pipeline.
//!
//! For one canonical message:
//!
//! 1. skip if the external id is already stored,
//! 2. resolve the contact,
//! 3. resolve (or reopen) the conversation,
//! 4. re-host media, falling back to the remote URL,
//! 5. insert the message unless its external id is already stored,
//! 6. bump conversation activity and, for incoming messages, unread count,
//! 7. publish `message.new` and `conversation.updated`.
//!
//! The insert in step 5 is the dedupe authority; step 1 only saves work.
//! When a concurrent delivery got there first, the stored row is left as it
//! was, the pipeline reports a duplicate and publishes nothing.

use std::sync::Arc;

use chrono::Utc;
use mensager_bus::Dispatcher;
use mensager_core::{
    Conversation, Inbox, InboxId, InboxStore, InsertOutcome, MediaRehoster, MensagerError,
    Message, MessageType, NewMessage, SenderType,
};
use mensager_evolution::{CanonicalInboundMessage, IgnoreReason, Normalized, normalize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::resolve::{resolve_contact, resolve_conversation};

/// Result of handling one delivery.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Ingested {
        message: Message,
        conversation: Conversation,
    },
    /// The external id was already stored. Nothing changed.
    Duplicate { external_id: String },
    Ignored(IgnoreReason),
}

#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn InboxStore>,
    media: Option<Arc<dyn MediaRehoster>>,
    dispatcher: Dispatcher,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn InboxStore>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            media: None,
            dispatcher,
        }
    }

    /// Without a rehoster, media messages keep the gateway URL.
    pub fn with_media(mut self, media: Arc<dyn MediaRehoster>) -> Self {
        self.media = Some(media);
        self
    }

    /// Normalizes a raw webhook body addressed to `inbox_id` and ingests it.
    pub async fn handle_webhook(
        &self,
        inbox_id: InboxId,
        body: &[u8],
    ) -> Result<IngestOutcome, MensagerError> {
        match normalize(body)? {
            Normalized::Ignore(reason) => {
                debug!(%inbox_id, ?reason, "webhook ignored");
                Ok(IngestOutcome::Ignored(reason))
            }
            Normalized::Message(message) => self.ingest(inbox_id, *message).await,
        }
    }

    pub async fn ingest(
        &self,
        inbox_id: InboxId,
        message: CanonicalInboundMessage,
    ) -> Result<IngestOutcome, MensagerError> {
        if self
            .store
            .find_message_by_external_id(&message.external_id)
            .await?
            .is_some()
        {
            debug!(external_id = %message.external_id, "duplicate delivery skipped");
            return Ok(IngestOutcome::Duplicate {
                external_id: message.external_id,
            });
        }

        let inbox = self
            .store
            .find_inbox(inbox_id)
            .await?
            .ok_or_else(|| MensagerError::not_found("inbox", inbox_id))?;

        let contact = resolve_contact(
            self.store.as_ref(),
            inbox.account_id,
            &message.chat,
            message.sender_display_name.as_deref(),
            message.avatar_url.as_deref(),
        )
        .await?;
        let conversation =
            resolve_conversation(self.store.as_ref(), inbox.account_id, inbox.id, &contact)
                .await?;

        let (media_url, mime_type) = self.rehost(&message).await;
        let incoming = message.is_incoming();
        let (sender_type, sender_id) = if incoming {
            (SenderType::Contact, Some(contact.id.0))
        } else {
            // No user context reaches the gateway echo path.
            (SenderType::User, None)
        };
        let new_message = build_message(
            &inbox,
            &conversation,
            message,
            sender_type,
            sender_id,
            media_url,
            mime_type,
        );

        let stored = match self.store.insert_message_if_absent(new_message).await? {
            InsertOutcome::Inserted(m) => m,
            InsertOutcome::Existing(m) => {
                debug!(message_id = %m.id, "concurrent duplicate delivery lost the insert");
                return Ok(IngestOutcome::Duplicate {
                    external_id: m.fields.external_id.unwrap_or_default(),
                });
            }
        };

        let conversation = self
            .store
            .record_activity(conversation.id, Utc::now(), incoming)
            .await?;

        self.dispatcher.message_new(&stored);
        self.dispatcher.conversation_updated(&conversation);

        info!(
            message_id = %stored.id,
            conversation_id = %conversation.id,
            account_id = %conversation.account_id,
            direction = %stored.fields.message_type,
            "message ingested"
        );
        Ok(IngestOutcome::Ingested {
            message: stored,
            conversation,
        })
    }

    /// Returns `(media_url, mime_type)`. A failed download is logged and the
    /// gateway URL is kept so the message is never lost.
    async fn rehost(&self, message: &CanonicalInboundMessage) -> (Option<String>, Option<String>) {
        let Some(media) = &message.media else {
            return (None, None);
        };
        let Some(remote_url) = &media.remote_url else {
            return (None, media.mime_type.clone());
        };
        let Some(rehoster) = &self.media else {
            return (Some(remote_url.clone()), media.mime_type.clone());
        };

        match rehoster.rehost(remote_url, &message.external_id).await {
            Ok(hosted) => (
                Some(hosted.url),
                media.mime_type.clone().or(Some(hosted.mime_type)),
            ),
            Err(e) => {
                warn!(
                    external_id = %message.external_id,
                    error = %e,
                    "media re-hosting failed, keeping remote URL"
                );
                (Some(remote_url.clone()), media.mime_type.clone())
            }
        }
    }
}

fn build_message(
    inbox: &Inbox,
    conversation: &Conversation,
    message: CanonicalInboundMessage,
    sender_type: SenderType,
    sender_id: Option<i64>,
    media_url: Option<String>,
    mime_type: Option<String>,
) -> NewMessage {
    let mut metadata = message.metadata;
    if let (Some(tag), Value::Object(map)) = (&message.unsupported, &mut metadata) {
        map.insert("unsupported_type".to_string(), Value::String(tag.clone()));
    }
    let (file_name, file_size, caption) = match message.media {
        Some(m) => (m.file_name, m.file_size, m.caption),
        None => (None, None, None),
    };

    NewMessage {
        account_id: inbox.account_id,
        inbox_id: inbox.id,
        conversation_id: conversation.id,
        content: message.content,
        message_type: message.direction,
        content_type: message.content_type,
        status: message.status,
        private: false,
        sender_type,
        sender_id,
        external_id: Some(message.external_id),
        remote_jid: Some(message.chat.jid),
        push_name: message.sender_display_name,
        is_from_me: message.direction == MessageType::Outgoing,
        is_group: message.chat.is_group,
        timestamp: Some(message.timestamp),
        quoted_external_id: message.quoted_external_id,
        media_url,
        mime_type,
        file_name,
        file_size,
        caption,
        group_data: message.group_data,
        metadata: Some(metadata),
        revoked: message.revoked,
        edited: message.edited,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mensager_bus::{DeliveryReport, Event, EventKind, EventPublisher, Scope};
    use mensager_config::model::StorageConfig;
    use mensager_core::{
        AccountId, AdapterType, ConversationStatus, HealthStatus, PluginAdapter, RehostedMedia,
    };
    use mensager_storage::SqliteStorage;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<Event>>);

    impl Recording {
        fn kinds(&self) -> Vec<(EventKind, Scope)> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|e| (e.kind(), e.scope()))
                .collect()
        }
    }

    impl EventPublisher for Recording {
        fn publish(&self, event: Event) -> DeliveryReport {
            self.0.lock().unwrap().push(event);
            DeliveryReport::default()
        }
    }

    struct FailingMedia;

    #[async_trait]
    impl PluginAdapter for FailingMedia {
        fn name(&self) -> &str {
            "failing-media"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Media
        }
        async fn health_check(&self) -> Result<HealthStatus, MensagerError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), MensagerError> {
            Ok(())
        }
    }

    #[async_trait]
    impl MediaRehoster for FailingMedia {
        async fn rehost(&self, _: &str, _: &str) -> Result<RehostedMedia, MensagerError> {
            Err(MensagerError::Media {
                message: "connection refused".into(),
                source: None,
            })
        }
    }

    struct Fixture {
        pipeline: IngestionPipeline,
        store: Arc<SqliteStorage>,
        events: Arc<Recording>,
        inbox: Inbox,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("t.db").display().to_string(),
            wal_mode: true,
        });
        store.initialize().await.unwrap();
        let store = Arc::new(store);
        let inbox = store.create_inbox(AccountId(1), "WhatsApp").await.unwrap();
        let events = Arc::new(Recording::default());
        let pipeline = IngestionPipeline::new(store.clone(), Dispatcher::new(events.clone()));
        Fixture {
            pipeline,
            store,
            events,
            inbox,
            _dir: dir,
        }
    }

    fn webhook(id: &str, from_me: bool, text: &str) -> Vec<u8> {
        json!({
            "event": "Message",
            "instanceId": "inst",
            "instanceName": "main",
            "data": {
                "key": {"remoteJid": "5511999999999@s.whatsapp.net", "fromMe": from_me, "id": id},
                "pushName": "Maria",
                "message": {"conversation": text}
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn ingests_incoming_text_and_emits_two_events() {
        let f = fixture().await;
        let outcome = f
            .pipeline
            .handle_webhook(f.inbox.id, &webhook("ABC123", false, "hello"))
            .await
            .unwrap();

        let IngestOutcome::Ingested {
            message,
            conversation,
        } = outcome
        else {
            panic!("expected ingestion, got {outcome:?}");
        };
        assert_eq!(message.fields.content, "hello");
        assert_eq!(message.fields.message_type, MessageType::Incoming);
        assert_eq!(message.fields.sender_type, SenderType::Contact);
        assert_eq!(conversation.unread_count, 1);
        assert!(conversation.last_activity_at.is_some());

        assert_eq!(
            f.events.kinds(),
            vec![
                (EventKind::MessageNew, Scope::Conversation(conversation.id)),
                (EventKind::MessageNew, Scope::Account(AccountId(1))),
                (EventKind::ConversationUpdated, Scope::Account(AccountId(1))),
            ]
        );
    }

    #[tokio::test]
    async fn redelivery_is_a_silent_duplicate() {
        let f = fixture().await;
        f.pipeline
            .handle_webhook(f.inbox.id, &webhook("ABC123", false, "hello"))
            .await
            .unwrap();
        let published = f.events.kinds().len();

        // Same id, different content: still a redundant delivery.
        let again = f
            .pipeline
            .handle_webhook(f.inbox.id, &webhook("ABC123", false, "changed"))
            .await
            .unwrap();
        assert!(matches!(again, IngestOutcome::Duplicate { .. }));
        assert_eq!(f.events.kinds().len(), published);

        let conversations = f.store.list_conversations(AccountId(1)).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].unread_count, 1);
        let messages = f
            .store
            .list_messages(AccountId(1), conversations[0].id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].fields.content, "hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_duplicates_keep_the_announced_content() {
        let f = fixture().await;
        f.pipeline
            .handle_webhook(f.inbox.id, &webhook("WARM", false, "hi"))
            .await
            .unwrap();
        let before = f.events.kinds().len();

        let first = webhook("RACE1", false, "first");
        let second = webhook("RACE1", false, "second");
        let (a, b) = tokio::join!(
            f.pipeline.handle_webhook(f.inbox.id, &first),
            f.pipeline.handle_webhook(f.inbox.id, &second),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let announced: Vec<&Message> = outcomes
            .iter()
            .filter_map(|o| match o {
                IngestOutcome::Ingested { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(announced.len(), 1);
        assert!(
            outcomes
                .iter()
                .any(|o| matches!(o, IngestOutcome::Duplicate { .. }))
        );
        assert_eq!(f.events.kinds().len(), before + 3);

        let stored = f
            .store
            .find_message_by_external_id("RACE1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields.content, announced[0].fields.content);
        assert_eq!(stored.id, announced[0].id);
    }

    #[tokio::test]
    async fn outgoing_leaves_unread_unchanged() {
        let f = fixture().await;
        f.pipeline
            .handle_webhook(f.inbox.id, &webhook("IN1", false, "hi"))
            .await
            .unwrap();
        let outcome = f
            .pipeline
            .handle_webhook(f.inbox.id, &webhook("OUT1", true, "hello back"))
            .await
            .unwrap();

        let IngestOutcome::Ingested {
            message,
            conversation,
        } = outcome
        else {
            panic!("expected ingestion");
        };
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(message.fields.sender_type, SenderType::User);
        assert_eq!(message.fields.sender_id, None);
        assert!(message.fields.is_from_me);
    }

    #[tokio::test]
    async fn resolved_conversation_is_reopened() {
        let f = fixture().await;
        let IngestOutcome::Ingested { conversation, .. } = f
            .pipeline
            .handle_webhook(f.inbox.id, &webhook("M1", false, "first"))
            .await
            .unwrap()
        else {
            panic!("expected ingestion");
        };
        f.store
            .update_conversation_status(AccountId(1), conversation.id, ConversationStatus::Resolved)
            .await
            .unwrap();

        let IngestOutcome::Ingested {
            conversation: reopened,
            ..
        } = f
            .pipeline
            .handle_webhook(f.inbox.id, &webhook("M2", false, "again"))
            .await
            .unwrap()
        else {
            panic!("expected ingestion");
        };
        assert_eq!(reopened.id, conversation.id);
        assert_eq!(reopened.status, ConversationStatus::Open);
        assert_eq!(reopened.unread_count, 2);
    }

    #[tokio::test]
    async fn contact_name_follows_push_name() {
        let f = fixture().await;
        f.pipeline
            .handle_webhook(f.inbox.id, &webhook("M1", false, "hi"))
            .await
            .unwrap();

        let contact = f
            .store
            .find_contact_by_phone(AccountId(1), "5511999999999")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.name, "Maria");
        assert_eq!(contact.identifier, "5511999999999@s.whatsapp.net");
    }

    #[tokio::test]
    async fn media_failure_falls_back_to_remote_url() {
        let f = fixture().await;
        let pipeline = f.pipeline.clone().with_media(Arc::new(FailingMedia));
        let body = json!({
            "event": "Message",
            "data": {
                "key": {"remoteJid": "1@s.whatsapp.net", "id": "IMG1"},
                "mediaUrl": "https://cdn.example.com/a.jpg",
                "message": {"imageMessage": {"caption": "pic", "mimetype": "image/jpeg"}}
            }
        })
        .to_string();

        let IngestOutcome::Ingested { message, .. } =
            pipeline.handle_webhook(f.inbox.id, body.as_bytes()).await.unwrap()
        else {
            panic!("expected ingestion");
        };
        assert_eq!(
            message.fields.media_url.as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(message.fields.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(message.fields.content, "pic");
    }

    #[tokio::test]
    async fn unknown_inbox_is_not_found_and_writes_nothing() {
        let f = fixture().await;
        let err = f
            .pipeline
            .handle_webhook(InboxId(999), &webhook("X1", false, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, MensagerError::NotFound { entity: "inbox", .. }));
        assert!(f.store.find_message_by_external_id("X1").await.unwrap().is_none());
        assert!(f.events.kinds().is_empty());
    }

    #[tokio::test]
    async fn ignored_events_touch_nothing() {
        let f = fixture().await;
        let outcome = f
            .pipeline
            .handle_webhook(f.inbox.id, br#"{"event":"SendMessage","data":{}}"#)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Ignored(IgnoreReason::SendAcknowledgment)
        ));
        assert!(f.events.kinds().is_empty());
    }

    #[tokio::test]
    async fn unsupported_variant_is_stored_with_its_tag() {
        let f = fixture().await;
        let body = json!({
            "event": "Message",
            "data": {
                "key": {"remoteJid": "1@s.whatsapp.net", "id": "ST1"},
                "message": {"stickerMessage": {}}
            }
        })
        .to_string();
        let IngestOutcome::Ingested { message, .. } =
            f.pipeline.handle_webhook(f.inbox.id, body.as_bytes()).await.unwrap()
        else {
            panic!("expected ingestion");
        };
        assert_eq!(
            message.fields.metadata.unwrap()["unsupported_type"],
            "stickerMessage"
        );
    }
}
