// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository interface over inboxes, contacts, conversations, and messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MensagerError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AccountId, Contact, ContactId, Conversation, ConversationId, ConversationStatus, Inbox,
    InboxId, Message, MessageId, NewContact, NewMessage, InsertOutcome,
};

/// Persistence collaborator used by the ingestion pipeline and the producer
/// endpoints.
///
/// Every lookup is scoped by account; an entity belonging to another account
/// is reported as absent.
#[async_trait]
pub trait InboxStore: PluginAdapter {
    async fn get_inbox(
        &self,
        account_id: AccountId,
        id: InboxId,
    ) -> Result<Option<Inbox>, MensagerError>;

    /// Resolves a webhook target. The gateway addresses inboxes by id alone,
    /// so this is the one lookup that is not account scoped.
    async fn find_inbox(&self, id: InboxId) -> Result<Option<Inbox>, MensagerError>;

    async fn create_inbox(&self, account_id: AccountId, name: &str)
    -> Result<Inbox, MensagerError>;

    /// Fast-path dedupe lookup.
    async fn find_message_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Message>, MensagerError>;

    async fn find_contact_by_phone(
        &self,
        account_id: AccountId,
        phone_number: &str,
    ) -> Result<Option<Contact>, MensagerError>;

    async fn find_contact_by_identifier(
        &self,
        account_id: AccountId,
        identifier: &str,
    ) -> Result<Option<Contact>, MensagerError>;

    async fn create_contact(&self, contact: NewContact) -> Result<Contact, MensagerError>;

    /// Persists name, phone, identifier and avatar of an existing contact.
    async fn update_contact(&self, contact: &Contact) -> Result<Contact, MensagerError>;

    /// Most recently created conversation for the triple, if any.
    async fn find_latest_conversation(
        &self,
        account_id: AccountId,
        inbox_id: InboxId,
        contact_id: ContactId,
    ) -> Result<Option<Conversation>, MensagerError>;

    async fn create_conversation(
        &self,
        account_id: AccountId,
        inbox_id: InboxId,
        contact_id: ContactId,
    ) -> Result<Conversation, MensagerError>;

    async fn get_conversation(
        &self,
        account_id: AccountId,
        id: ConversationId,
    ) -> Result<Option<Conversation>, MensagerError>;

    async fn update_conversation_status(
        &self,
        account_id: AccountId,
        id: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, MensagerError>;

    /// Sets `last_activity_at` and, when asked, increments `unread_count`
    /// atomically in the store.
    async fn record_activity(
        &self,
        id: ConversationId,
        at: DateTime<Utc>,
        increment_unread: bool,
    ) -> Result<Conversation, MensagerError>;

    /// Pure insert. Used when the message has no external id.
    async fn insert_message(&self, message: NewMessage) -> Result<Message, MensagerError>;

    /// Insert keyed by `message.external_id`, which must be present. An
    /// existing row with that id is returned as is and never rewritten.
    async fn insert_message_if_absent(
        &self,
        message: NewMessage,
    ) -> Result<InsertOutcome, MensagerError>;

    async fn list_conversations(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Conversation>, MensagerError>;

    /// Messages of one conversation, oldest first.
    async fn list_messages(
        &self,
        account_id: AccountId,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, MensagerError>;

    /// Marks incoming messages read and resets the unread counter.
    async fn mark_conversation_read(
        &self,
        account_id: AccountId,
        id: ConversationId,
    ) -> Result<Conversation, MensagerError>;

    /// Marks the given messages read and recomputes unread counters of the
    /// conversations they belong to. Returns the updated messages.
    async fn mark_messages_read(
        &self,
        account_id: AccountId,
        ids: &[MessageId],
    ) -> Result<Vec<Message>, MensagerError>;

    /// Deletes a conversation and its messages.
    async fn delete_conversation(
        &self,
        account_id: AccountId,
        id: ConversationId,
    ) -> Result<(), MensagerError>;

    /// Deletes every conversation of an inbox, returning how many were removed.
    async fn clear_inbox(&self, account_id: AccountId, inbox_id: InboxId)
    -> Result<u64, MensagerError>;
}
