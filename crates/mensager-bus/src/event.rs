// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed event envelope shared by producers, the hub, and streaming sessions.

use std::str::FromStr;
use std::sync::Arc;

use mensager_core::{AccountId, ConversationId, MensagerError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The fixed set of event kinds a client can observe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum EventKind {
    #[strum(serialize = "message.new")]
    #[serde(rename = "message.new")]
    MessageNew,
    #[strum(serialize = "message.updated")]
    #[serde(rename = "message.updated")]
    MessageUpdated,
    #[strum(serialize = "conversation.new")]
    #[serde(rename = "conversation.new")]
    ConversationNew,
    #[strum(serialize = "conversation.updated")]
    #[serde(rename = "conversation.updated")]
    ConversationUpdated,
    #[strum(serialize = "conversation.deleted")]
    #[serde(rename = "conversation.deleted")]
    ConversationDeleted,
    #[strum(serialize = "inbox.cleared")]
    #[serde(rename = "inbox.cleared")]
    InboxCleared,
    #[strum(serialize = "connection.established")]
    #[serde(rename = "connection.established")]
    ConnectionEstablished,
    #[strum(serialize = "heartbeat")]
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

/// Who an event is addressed to. Never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Account(AccountId),
    /// Only subscribers that opened their stream for this conversation.
    Conversation(ConversationId),
}

/// An immutable event. Cloning is cheap: the payload is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    scope: Scope,
    payload: Arc<serde_json::Value>,
}

#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    payload: &'a serde_json::Value,
}

impl Event {
    /// Builds an event, serializing `payload` once up front.
    pub fn new<T: Serialize + ?Sized>(
        kind: EventKind,
        scope: Scope,
        payload: &T,
    ) -> Result<Self, MensagerError> {
        let payload = serde_json::to_value(payload).map_err(|e| {
            MensagerError::Internal(format!("failed to serialize {kind} payload: {e}"))
        })?;
        Ok(Self {
            kind,
            scope,
            payload: Arc::new(payload),
        })
    }

    /// Like [`Event::new`] for a kind given by name. Names outside the fixed
    /// set are rejected.
    pub fn from_kind_name<T: Serialize + ?Sized>(
        kind: &str,
        scope: Scope,
        payload: &T,
    ) -> Result<Self, MensagerError> {
        let kind = EventKind::from_str(kind)
            .map_err(|_| MensagerError::Internal(format!("unknown event kind `{kind}`")))?;
        Self::new(kind, scope, payload)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Same kind and payload, different addressing.
    pub fn with_scope(&self, scope: Scope) -> Self {
        Self {
            kind: self.kind,
            scope,
            payload: Arc::clone(&self.payload),
        }
    }

    /// `{"type": ..., "payload": ...}`, the body of one SSE `data:` frame.
    pub fn to_wire(&self) -> Result<String, MensagerError> {
        serde_json::to_string(&WireFrame {
            kind: self.kind,
            payload: &self.payload,
        })
        .map_err(|e| MensagerError::Internal(format!("failed to encode {} frame: {e}", self.kind)))
    }
}
