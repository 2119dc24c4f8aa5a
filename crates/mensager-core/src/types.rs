// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the store, the ingestion pipeline, and the
//! realtime bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Tenant identifier. Every other entity belongs to exactly one account.
    AccountId
);
id_type!(
    /// Identifier of a gateway-connected inbox.
    InboxId
);
id_type!(ContactId);
id_type!(ConversationId);
id_type!(MessageId);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    Storage,
    Media,
}

/// Lifecycle state of a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Open,
    Resolved,
    Pending,
}

/// Direction of a message relative to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageType {
    Incoming,
    Outgoing,
    Activity,
    Template,
}

/// What a message carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
}

/// Delivery state of a message.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum SenderType {
    Contact,
    User,
}

/// A gateway-connected inbox (one WhatsApp number behind Evolution API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbox {
    pub id: InboxId,
    pub account_id: AccountId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A person or group the account talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub account_id: AccountId,
    pub name: String,
    /// Bare chat identifier (the part of the jid before `@`).
    pub phone_number: String,
    /// Full gateway chat identity, e.g. `5511999999999@s.whatsapp.net`.
    pub identifier: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a contact.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContact {
    pub account_id: AccountId,
    pub name: String,
    pub phone_number: String,
    pub identifier: String,
}

/// A thread between the account and one contact inside one inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub account_id: AccountId,
    pub inbox_id: InboxId,
    pub contact_id: ContactId,
    pub status: ConversationStatus,
    pub unread_count: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message row ready to be written. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub account_id: AccountId,
    pub inbox_id: InboxId,
    pub conversation_id: ConversationId,
    pub content: String,
    pub message_type: MessageType,
    pub content_type: ContentType,
    pub status: MessageStatus,
    pub private: bool,
    pub sender_type: SenderType,
    pub sender_id: Option<i64>,
    /// Gateway-assigned message id, the dedupe key when present.
    pub external_id: Option<String>,
    pub remote_jid: Option<String>,
    pub push_name: Option<String>,
    pub is_from_me: bool,
    pub is_group: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub quoted_external_id: Option<String>,
    pub media_url: Option<String>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub caption: Option<String>,
    pub group_data: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub revoked: bool,
    pub edited: bool,
}

impl NewMessage {
    /// A plain text message with every optional field empty.
    pub fn text(
        account_id: AccountId,
        inbox_id: InboxId,
        conversation_id: ConversationId,
        message_type: MessageType,
        sender_type: SenderType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            inbox_id,
            conversation_id,
            content: content.into(),
            message_type,
            content_type: ContentType::Text,
            status: MessageStatus::Sent,
            private: false,
            sender_type,
            sender_id: None,
            external_id: None,
            remote_jid: None,
            push_name: None,
            is_from_me: message_type == MessageType::Outgoing,
            is_group: false,
            timestamp: None,
            quoted_external_id: None,
            media_url: None,
            mime_type: None,
            file_name: None,
            file_size: None,
            caption: None,
            group_data: None,
            metadata: None,
            revoked: false,
            edited: false,
        }
    }
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(flatten)]
    pub fields: NewMessage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn conversation_id(&self) -> ConversationId {
        self.fields.conversation_id
    }

    pub fn account_id(&self) -> AccountId {
        self.fields.account_id
    }
}

/// Result of an insert-if-absent keyed by external id.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// No row carried this external id; a new one was written.
    Inserted(Message),
    /// A row with this external id already existed. It is returned untouched.
    Existing(Message),
}

impl InsertOutcome {
    pub fn message(&self) -> &Message {
        match self {
            Self::Inserted(m) | Self::Existing(m) => m,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Self::Inserted(m) | Self::Existing(m) => m,
        }
    }
}
