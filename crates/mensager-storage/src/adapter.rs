// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `InboxStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use mensager_config::model::StorageConfig;
use mensager_core::{
    AccountId, AdapterType, Contact, ContactId, Conversation, ConversationId, ConversationStatus,
    HealthStatus, Inbox, InboxId, InboxStore, MensagerError, Message, MessageId, NewContact,
    NewMessage, PluginAdapter, InsertOutcome,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened lazily by [`SqliteStorage::initialize`]; every
/// other call fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Opens the database and runs migrations.
    pub async fn initialize(&self) -> Result<(), MensagerError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| MensagerError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, MensagerError> {
        self.db.get().ok_or_else(|| MensagerError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

fn conversation_or_not_found(
    found: Option<Conversation>,
    id: ConversationId,
) -> Result<Conversation, MensagerError> {
    found.ok_or_else(|| MensagerError::not_found("conversation", id))
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MensagerError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".to_string()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MensagerError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                })
                .await
                .map_err(map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl InboxStore for SqliteStorage {
    async fn get_inbox(
        &self,
        account_id: AccountId,
        id: InboxId,
    ) -> Result<Option<Inbox>, MensagerError> {
        queries::inboxes::get_inbox(self.db()?, account_id, id).await
    }

    async fn find_inbox(&self, id: InboxId) -> Result<Option<Inbox>, MensagerError> {
        queries::inboxes::find_inbox(self.db()?, id).await
    }

    async fn create_inbox(
        &self,
        account_id: AccountId,
        name: &str,
    ) -> Result<Inbox, MensagerError> {
        queries::inboxes::create_inbox(self.db()?, account_id, name).await
    }

    async fn find_message_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Message>, MensagerError> {
        queries::messages::find_by_external_id(self.db()?, external_id).await
    }

    async fn find_contact_by_phone(
        &self,
        account_id: AccountId,
        phone_number: &str,
    ) -> Result<Option<Contact>, MensagerError> {
        queries::contacts::find_by_phone(self.db()?, account_id, phone_number).await
    }

    async fn find_contact_by_identifier(
        &self,
        account_id: AccountId,
        identifier: &str,
    ) -> Result<Option<Contact>, MensagerError> {
        queries::contacts::find_by_identifier(self.db()?, account_id, identifier).await
    }

    async fn create_contact(&self, contact: NewContact) -> Result<Contact, MensagerError> {
        queries::contacts::create_contact(self.db()?, contact).await
    }

    async fn update_contact(&self, contact: &Contact) -> Result<Contact, MensagerError> {
        queries::contacts::update_contact(self.db()?, contact).await
    }

    async fn find_latest_conversation(
        &self,
        account_id: AccountId,
        inbox_id: InboxId,
        contact_id: ContactId,
    ) -> Result<Option<Conversation>, MensagerError> {
        queries::conversations::find_latest(self.db()?, account_id, inbox_id, contact_id).await
    }

    async fn create_conversation(
        &self,
        account_id: AccountId,
        inbox_id: InboxId,
        contact_id: ContactId,
    ) -> Result<Conversation, MensagerError> {
        queries::conversations::create(self.db()?, account_id, inbox_id, contact_id).await
    }

    async fn get_conversation(
        &self,
        account_id: AccountId,
        id: ConversationId,
    ) -> Result<Option<Conversation>, MensagerError> {
        queries::conversations::get(self.db()?, account_id, id).await
    }

    async fn update_conversation_status(
        &self,
        account_id: AccountId,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, MensagerError> {
        let found =
            queries::conversations::update_status(self.db()?, account_id, id, status).await?;
        conversation_or_not_found(found, id)
    }

    async fn record_activity(
        &self,
        id: ConversationId,
        at: DateTime<Utc>,
        increment_unread: bool,
    ) -> Result<Conversation, MensagerError> {
        let found =
            queries::conversations::record_activity(self.db()?, id, at, increment_unread).await?;
        conversation_or_not_found(found, id)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, MensagerError> {
        queries::messages::insert(self.db()?, message).await
    }

    async fn insert_message_if_absent(
        &self,
        message: NewMessage,
    ) -> Result<InsertOutcome, MensagerError> {
        queries::messages::insert_if_absent(self.db()?, message).await
    }

    async fn list_conversations(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Conversation>, MensagerError> {
        queries::conversations::list(self.db()?, account_id).await
    }

    async fn list_messages(
        &self,
        account_id: AccountId,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, MensagerError> {
        queries::messages::list_for_conversation(self.db()?, account_id, conversation_id).await
    }

    async fn mark_conversation_read(
        &self,
        account_id: AccountId,
        id: ConversationId,
    ) -> Result<Conversation, MensagerError> {
        let found = queries::conversations::mark_read(self.db()?, account_id, id).await?;
        conversation_or_not_found(found, id)
    }

    async fn mark_messages_read(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
    ) -> Result<Vec<Message>, MensagerError> {
        queries::messages::mark_read(self.db()?, account_id, ids).await
    }

    async fn delete_conversation(
        &self,
        account_id: AccountId,
        id: ConversationId,
    ) -> Result<(), MensagerError> {
        if queries::conversations::delete(self.db()?, account_id, id).await? {
            Ok(())
        } else {
            Err(MensagerError::not_found("conversation", id))
        }
    }

    async fn clear_inbox(
        &self,
        account_id: AccountId,
        inbox_id: InboxId,
    ) -> Result<u64, MensagerError> {
        queries::inboxes::clear_inbox(self.db()?, account_id, inbox_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mensager_core::{MessageType, SenderType};
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn reports_identity() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("t.db").to_str().unwrap(),
        ));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn calls_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("t.db").to_str().unwrap(),
        ));
        let err = storage.get_inbox(AccountId(1), InboxId(1)).await.unwrap_err();
        assert!(matches!(err, MensagerError::Storage { .. }));
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn double_initialize_is_an_error() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("t.db").to_str().unwrap(),
        ));
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn full_lifecycle_through_trait() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("t.db").to_str().unwrap(),
        ));
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);

        let account = AccountId(1);
        let inbox = storage.create_inbox(account, "wa").await.unwrap();
        let contact = storage
            .create_contact(NewContact {
                account_id: account,
                name: "5511".into(),
                phone_number: "5511".into(),
                identifier: "5511@s.whatsapp.net".into(),
            })
            .await
            .unwrap();
        let conv = storage
            .create_conversation(account, inbox.id, contact.id)
            .await
            .unwrap();

        storage
            .insert_message(NewMessage::text(
                account,
                inbox.id,
                conv.id,
                MessageType::Incoming,
                SenderType::Contact,
                "hi",
            ))
            .await
            .unwrap();
        storage.record_activity(conv.id, Utc::now(), true).await.unwrap();

        let read = storage.mark_conversation_read(account, conv.id).await.unwrap();
        assert_eq!(read.unread_count, 0);
        let messages = storage.list_messages(account, conv.id).await.unwrap();
        assert_eq!(messages[0].fields.status, mensager_core::MessageStatus::Read);

        let missing = storage
            .update_conversation_status(account, ConversationId(999), ConversationStatus::Open)
            .await
            .unwrap_err();
        assert!(matches!(missing, MensagerError::NotFound { .. }));

        assert_eq!(storage.clear_inbox(account, inbox.id).await.unwrap(), 1);
        assert!(storage.list_conversations(account).await.unwrap().is_empty());
        assert!(storage.list_messages(account, conv.id).await.unwrap().is_empty());

        let err = storage.delete_conversation(account, conv.id).await.unwrap_err();
        assert!(matches!(err, MensagerError::NotFound { .. }));

        storage.shutdown().await.unwrap();
    }
}
