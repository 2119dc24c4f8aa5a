// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps domain mutations to scoped events.
//!
//! Scope policy lives here and nowhere else:
//!
//! | mutation | scopes |
//! |---|---|
//! | message new / updated | conversation, then account |
//! | conversation new / updated / deleted | account |
//! | inbox cleared | account |

use std::sync::Arc;

use mensager_core::{AccountId, Conversation, ConversationId, InboxId, Message};
use serde::Serialize;
use tracing::warn;

use crate::event::{Event, EventKind, Scope};
use crate::hub::{DeliveryReport, EventPublisher};

#[derive(Serialize)]
struct ConversationDeleted {
    id: ConversationId,
    account_id: AccountId,
}

#[derive(Serialize)]
struct InboxCleared {
    inbox_id: InboxId,
    count: u64,
    account_id: AccountId,
}

#[derive(Clone)]
pub struct Dispatcher {
    publisher: Arc<dyn EventPublisher>,
}

impl Dispatcher {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub fn message_new(&self, message: &Message) -> DeliveryReport {
        self.message_event(EventKind::MessageNew, message)
    }

    pub fn message_updated(&self, message: &Message) -> DeliveryReport {
        self.message_event(EventKind::MessageUpdated, message)
    }

    pub fn conversation_new(&self, conversation: &Conversation) -> DeliveryReport {
        self.emit(
            EventKind::ConversationNew,
            &[Scope::Account(conversation.account_id)],
            conversation,
        )
    }

    pub fn conversation_updated(&self, conversation: &Conversation) -> DeliveryReport {
        self.emit(
            EventKind::ConversationUpdated,
            &[Scope::Account(conversation.account_id)],
            conversation,
        )
    }

    /// The entity no longer exists, so only its id travels.
    pub fn conversation_deleted(&self, id: ConversationId, account_id: AccountId) -> DeliveryReport {
        self.emit(
            EventKind::ConversationDeleted,
            &[Scope::Account(account_id)],
            &ConversationDeleted { id, account_id },
        )
    }

    pub fn inbox_cleared(
        &self,
        inbox_id: InboxId,
        count: u64,
        account_id: AccountId,
    ) -> DeliveryReport {
        self.emit(
            EventKind::InboxCleared,
            &[Scope::Account(account_id)],
            &InboxCleared {
                inbox_id,
                count,
                account_id,
            },
        )
    }

    fn message_event(&self, kind: EventKind, message: &Message) -> DeliveryReport {
        self.emit(
            kind,
            &[
                Scope::Conversation(message.conversation_id()),
                Scope::Account(message.account_id()),
            ],
            message,
        )
    }

    /// Serializes once, publishes once per scope. A payload that cannot be
    /// serialized is logged and nothing is published.
    fn emit<T: Serialize + ?Sized>(
        &self,
        kind: EventKind,
        scopes: &[Scope],
        payload: &T,
    ) -> DeliveryReport {
        let Some((&first, rest)) = scopes.split_first() else {
            return DeliveryReport::default();
        };
        let event = match Event::new(kind, first, payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(%kind, error = %e, "dropping event that failed to serialize");
                return DeliveryReport::default();
            }
        };

        rest.iter().fold(
            self.publisher.publish(event.clone()),
            |report, &scope| report.merge(self.publisher.publish(event.with_scope(scope))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Hub, Subscriber};
    use chrono::Utc;
    use mensager_core::{
        ContactId, ConversationStatus, MessageId, MessageType, NewMessage, SenderType,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<Event>>);

    impl EventPublisher for Recording {
        fn publish(&self, event: Event) -> DeliveryReport {
            self.0.lock().unwrap().push(event);
            DeliveryReport {
                delivered: 1,
                dropped: 0,
            }
        }
    }

    fn conversation(id: i64, account: i64) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: ConversationId(id),
            account_id: AccountId(account),
            inbox_id: InboxId(1),
            contact_id: ContactId(1),
            status: ConversationStatus::Open,
            unread_count: 0,
            last_activity_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn message(conversation_id: i64, account: i64) -> Message {
        let now = Utc::now();
        Message {
            id: MessageId(1),
            fields: NewMessage::text(
                AccountId(account),
                InboxId(1),
                ConversationId(conversation_id),
                MessageType::Incoming,
                SenderType::Contact,
                "hello",
            ),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn message_new_goes_to_conversation_then_account() {
        let recording = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(recording.clone());

        let report = dispatcher.message_new(&message(42, 1));
        assert_eq!(report.delivered, 2);

        let events = recording.0.lock().unwrap();
        let scopes: Vec<Scope> = events.iter().map(Event::scope).collect();
        assert_eq!(
            scopes,
            vec![
                Scope::Conversation(ConversationId(42)),
                Scope::Account(AccountId(1))
            ]
        );
        assert!(events.iter().all(|e| e.kind() == EventKind::MessageNew));
        assert_eq!(events[0].payload()["content"], "hello");
    }

    #[test]
    fn conversation_events_are_account_scoped_only() {
        let recording = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(recording.clone());

        dispatcher.conversation_new(&conversation(5, 2));
        dispatcher.conversation_updated(&conversation(5, 2));

        let events = recording.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), EventKind::ConversationNew);
        assert_eq!(events[1].kind(), EventKind::ConversationUpdated);
        assert!(
            events
                .iter()
                .all(|e| e.scope() == Scope::Account(AccountId(2)))
        );
        assert_eq!(events[1].payload()["status"], "open");
    }

    #[test]
    fn deleted_and_cleared_payloads_carry_ids_only() {
        let recording = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(recording.clone());

        dispatcher.conversation_deleted(ConversationId(9), AccountId(3));
        dispatcher.inbox_cleared(InboxId(4), 12, AccountId(3));

        let events = recording.0.lock().unwrap();
        assert_eq!(
            events[0].payload(),
            &serde_json::json!({"id": 9, "account_id": 3})
        );
        assert_eq!(
            events[1].payload(),
            &serde_json::json!({"inbox_id": 4, "count": 12, "account_id": 3})
        );
    }

    #[test]
    fn conversation_copy_skips_viewers_of_other_conversations() {
        let hub = Arc::new(Hub::new());
        let dispatcher = Dispatcher::new(hub.clone());
        let (other, mut other_outbox) = Subscriber::new(AccountId(7), Some(ConversationId(2)), 8);
        let (wide, mut wide_outbox) = Subscriber::new(AccountId(7), None, 8);
        hub.register(other);
        hub.register(wide);

        dispatcher.message_new(&message(1, 7));

        // The conversation-2 viewer still sees the account-scoped copy, but
        // never the conversation-scoped one.
        let seen: Vec<_> = std::iter::from_fn(|| other_outbox.try_recv()).collect();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].scope(), Scope::Account(AccountId(7)));
        assert_eq!(std::iter::from_fn(|| wide_outbox.try_recv()).count(), 1);
    }
}
