// SPDX-FileCopyrightText: 2026 Mensager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber registry and scoped, non-blocking fan-out.
//!
//! Broadcasts iterate the registry under a shared lock and `try_send` into
//! each matching outbox. A full outbox loses the event being published (the
//! newest); what is already queued stays queued in publish order. Register
//! and unregister take the exclusive lock, so a subscriber can never vanish
//! halfway through an iteration.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use mensager_core::{AccountId, ConversationId};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::event::{Event, Scope};

/// Unique per connection: `{account_id}-{random}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn generate(account_id: AccountId) -> Self {
        Self(format!("{account_id}-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One live connection as the hub sees it.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    account_id: AccountId,
    conversation_id: Option<ConversationId>,
    outbox: mpsc::Sender<Event>,
}

/// Receiving half of a subscriber's bounded mailbox.
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Event>,
}

impl Outbox {
    /// Next event, or `None` once the subscriber has been unregistered and
    /// everything queued before that has been drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Subscriber {
    /// A subscriber with an outbox holding at most `capacity` events.
    ///
    /// `capacity` is clamped to at least one.
    pub fn new(
        account_id: AccountId,
        conversation_id: Option<ConversationId>,
        capacity: usize,
    ) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscriber = Self {
            id: SubscriberId::generate(account_id),
            account_id,
            conversation_id,
            outbox: tx,
        };
        (subscriber, Outbox { rx })
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id
    }

    fn matches(&self, scope: Scope) -> bool {
        match scope {
            Scope::All => true,
            Scope::Account(account_id) => self.account_id == account_id,
            Scope::Conversation(conversation_id) => self.conversation_id == Some(conversation_id),
        }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

impl DeliveryReport {
    pub fn merge(self, other: Self) -> Self {
        Self {
            delivered: self.delivered + other.delivered,
            dropped: self.dropped + other.dropped,
        }
    }
}

/// Anything that can route a scoped event to its audience.
///
/// Producers hold this rather than the concrete [`Hub`]; publishing never
/// blocks and never fails from the producer's point of view.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: Event) -> DeliveryReport;
}

/// The in-process subscriber registry.
#[derive(Default)]
pub struct Hub {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    dropped_total: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Subscriber) {
        debug!(
            subscriber = %subscriber.id,
            account_id = %subscriber.account_id,
            conversation_id = ?subscriber.conversation_id,
            "subscriber registered"
        );
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(subscriber.id.clone(), subscriber);
    }

    /// Removes the subscriber and closes its outbox. Returns whether it was
    /// registered; unknown ids are ignored.
    pub fn unregister(&self, id: &SubscriberId) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        if removed.is_some() {
            debug!(subscriber = %id, "subscriber unregistered");
        }
        removed.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Events dropped across all subscribers since startup.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn broadcast_all(&self, event: &Event) -> DeliveryReport {
        self.deliver(Scope::All, event)
    }

    /// Every subscriber of the account, whatever its conversation scope.
    pub fn broadcast_to_account(&self, account_id: AccountId, event: &Event) -> DeliveryReport {
        self.deliver(Scope::Account(account_id), event)
    }

    /// Only subscribers scoped to this conversation. Account-wide listeners
    /// are not included.
    pub fn broadcast_to_conversation(
        &self,
        conversation_id: ConversationId,
        event: &Event,
    ) -> DeliveryReport {
        self.deliver(Scope::Conversation(conversation_id), event)
    }

    fn deliver(&self, scope: Scope, event: &Event) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());

        for subscriber in subscribers.values().filter(|s| s.matches(scope)) {
            match subscriber.outbox.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(
                        subscriber = %subscriber.id,
                        kind = %event.kind(),
                        "outbox full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    // Session already gone, unregister is on its way.
                    report.dropped += 1;
                    debug!(subscriber = %subscriber.id, "outbox closed, event dropped");
                }
            }
        }

        if report.dropped > 0 {
            self.dropped_total
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
        }
        report
    }
}

impl EventPublisher for Hub {
    fn publish(&self, event: Event) -> DeliveryReport {
        self.deliver(event.scope(), &event)
    }
}
