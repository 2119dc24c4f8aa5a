// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Mensager.
//!
//! This crate provides the error type, domain entities, and the collaborator
//! traits (store, media) that the ingestion pipeline and the HTTP gateway are
//! written against.

pub mod error;
pub mod traits;
pub mod types;

pub use error::MensagerError;
pub use types::{
    AccountId, AdapterType, Contact, ContactId, ContentType, Conversation, ConversationId,
    ConversationStatus, HealthStatus, Inbox, InboxId, Message, MessageId, MessageStatus,
    MessageType, NewContact, NewMessage, SenderType, InsertOutcome,
};

pub use traits::{InboxStore, MediaRehoster, PluginAdapter, RehostedMedia};
